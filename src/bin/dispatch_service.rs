//! Servicio de despacho de conductores
//!
//! HTTP en el puerto 3001 (configurable), canal WebSocket de
//! conductores y el motor de matching consumiendo `driver_matching`.

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
use ride_hail_backend::consumers::matching_consumer;
use ride_hail_backend::database::create_pool;
use ride_hail_backend::database::connection::mask_database_url;
use ride_hail_backend::middleware::cors::cors_middleware;
use ride_hail_backend::mq::{topology, Broker, Publisher};
use ride_hail_backend::routes::driver_routes::create_driver_router;
use ride_hail_backend::state::DispatchState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚗 Dispatch Service - despacho de conductores");
    info!("=============================================");

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

    let broker = Broker::new(config.amqp_url.clone());
    let connection = broker.connect().await?;
    let channel = connection.create_channel().await?;
    topology::declare_topology(&channel).await?;
    let publisher = Publisher::new(channel);
    info!("✅ Topología del broker declarada");

    let state = DispatchState::new(pool, config.clone(), publisher);

    tokio::spawn(matching_consumer::run(state.clone(), broker.clone()));

    let app = create_driver_router(state)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors_middleware(&config.cors_origins));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.dispatch_service_port).parse()?;
    info!("🌐 dispatch-service escuchando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   POST /drivers/:driver_id/register - Alta de perfil");
    info!("   POST /drivers/:driver_id/online - Pasar a online");
    info!("   POST /drivers/:driver_id/offline - Pasar a offline");
    info!("   POST /drivers/:driver_id/location - Reportar posición");
    info!("   POST /drivers/:driver_id/start - Iniciar viaje");
    info!("   POST /drivers/:driver_id/complete - Completar viaje");
    info!("   GET  /ws/drivers/:driver_id - Canal push del conductor");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 dispatch-service detenido");
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
            info!("🛑 Ctrl+C recibido, apagando dispatch-service...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando dispatch-service...");
        },
    }
}
