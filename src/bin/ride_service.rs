//! Servicio de viajes
//!
//! HTTP en el puerto 3000 (configurable), canal WebSocket de
//! pasajeros y los tres consumidores del broker que proyectan el
//! ciclo de vida del viaje.

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
use ride_hail_backend::consumers::{driver_response_consumer, location_consumer, status_consumer};
use ride_hail_backend::database::create_pool;
use ride_hail_backend::database::connection::mask_database_url;
use ride_hail_backend::middleware::cors::cors_middleware;
use ride_hail_backend::mq::{topology, Broker, Publisher};
use ride_hail_backend::routes::ride_routes::create_ride_router;
use ride_hail_backend::state::RideState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚕 Ride Service - plataforma de ride-hailing");
    info!("============================================");

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

    let state = RideState::new(pool, config.clone(), publisher);

    tokio::spawn(driver_response_consumer::run(state.clone(), broker.clone()));
    tokio::spawn(location_consumer::run(state.clone(), broker.clone()));
    tokio::spawn(status_consumer::run(state.clone(), broker.clone()));

    let app = create_ride_router(state)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors_middleware(&config.cors_origins));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.ride_service_port).parse()?;
    info!("🌐 ride-service escuchando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   POST /rides - Crear viaje");
    info!("   POST /rides/:ride_id/cancel - Cancelar viaje");
    info!("   GET  /rides/:ride_id - Consultar viaje");
    info!("   GET  /ws/passengers/:passenger_id - Canal push del pasajero");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 ride-service detenido");
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
            info!("🛑 Ctrl+C recibido, apagando ride-service...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando ride-service...");
        },
    }
}
