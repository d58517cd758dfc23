//! Shared application state
//!
//! Estados compartidos que cada binario pasa a su router de Axum.
//! Cada servicio arma el suyo con lo que realmente usa.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::EnvironmentConfig;
use crate::mq::Publisher;
use crate::services::driver_service::LocationRateLimiter;
use crate::services::matching_service::OfferRegistry;
use crate::services::watchdog::WatchdogRegistry;
use crate::ws::ConnectionRegistry;

/// Estado del servicio de viajes
#[derive(Clone)]
pub struct RideState {
    pub pool: PgPool,
    pub config: Arc<EnvironmentConfig>,
    pub publisher: Publisher,
    pub passengers: ConnectionRegistry,
    pub watchdogs: WatchdogRegistry,
}

impl RideState {
    pub fn new(pool: PgPool, config: Arc<EnvironmentConfig>, publisher: Publisher) -> Self {
        Self {
            pool,
            config,
            publisher,
            passengers: ConnectionRegistry::new(),
            watchdogs: WatchdogRegistry::new(),
        }
    }
}

/// Estado del servicio de despacho
#[derive(Clone)]
pub struct DispatchState {
    pub pool: PgPool,
    pub config: Arc<EnvironmentConfig>,
    pub publisher: Publisher,
    pub drivers: ConnectionRegistry,
    pub offers: OfferRegistry,
    pub limiter: LocationRateLimiter,
}

impl DispatchState {
    pub fn new(pool: PgPool, config: Arc<EnvironmentConfig>, publisher: Publisher) -> Self {
        Self {
            pool,
            config,
            publisher,
            drivers: ConnectionRegistry::new(),
            offers: OfferRegistry::new(),
            limiter: LocationRateLimiter::new(),
        }
    }
}

/// Estado del servicio de autenticación
#[derive(Clone)]
pub struct AuthServiceState {
    pub pool: PgPool,
    pub config: Arc<EnvironmentConfig>,
}

impl AuthServiceState {
    pub fn new(pool: PgPool, config: Arc<EnvironmentConfig>) -> Self {
        Self { pool, config }
    }
}
