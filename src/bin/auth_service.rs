//! Servicio de autenticación
//!
//! Registro, login con sesión única y logout. Emite los tokens HMAC
//! que validan los demás servicios; no toca el broker.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ride_hail_backend::config::EnvironmentConfig;
use ride_hail_backend::database::create_pool;
use ride_hail_backend::database::connection::mask_database_url;
use ride_hail_backend::middleware::cors::cors_middleware;
use ride_hail_backend::routes::auth_routes::create_auth_router;
use ride_hail_backend::state::AuthServiceState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🔐 Auth Service - autenticación de la plataforma");
    info!("================================================");

    let config = Arc::new(EnvironmentConfig::from_env());

    let pool = match create_pool(&config.database_url).await {
        Ok(pool) => {
            info!("✅ PostgreSQL conectado: {}", mask_database_url(&config.database_url));
            pool
        }
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(e);
        }
    };

    let state = AuthServiceState::new(pool, config.clone());
    let app = create_auth_router(state)
        .layer(TimeoutLayer::new(Duration::from_secs(5)))
        .layer(cors_middleware(&config.cors_origins));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.auth_service_port).parse()?;
    info!("🌐 auth-service escuchando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   POST /auth/register - Registrar usuario");
    info!("   POST /auth/login - Login (sesión única)");
    info!("   POST /auth/logout - Logout");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 auth-service detenido");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Ctrl+C recibido, apagando auth-service...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando auth-service...");
        },
    }
}
