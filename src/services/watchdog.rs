//! Watchdog de viajes en REQUESTED
//!
//! Timer cooperativo de un disparo por viaje: a los 120 s, si nadie
//! tomó el viaje, lo cancela con "No drivers available". La señal de
//! cancelación llega por un canal oneshot y libera el timer sin
//! esperar el vencimiento.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::ride::RideStatus;
use crate::mq::messages::RideStatusMessage;
use crate::mq::topology::EXCHANGE_RIDE_TOPIC;
use crate::repositories::ride_repository::RideRepository;
use crate::state::RideState;

/// Tiempo máximo que un viaje espera conductor antes de autocancelarse
pub const REQUESTED_TIMEOUT: Duration = Duration::from_secs(120);

pub const NO_DRIVERS_REASON: &str = "No drivers available";

/// Señales de cancelación de los watchdogs vivos, por viaje
#[derive(Clone, Default)]
pub struct WatchdogRegistry {
    inner: Arc<Mutex<HashMap<Uuid, oneshot::Sender<()>>>>,
}

impl WatchdogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, ride_id: Uuid, sender: oneshot::Sender<()>) {
        self.inner.lock().expect("watchdog registry poisoned").insert(ride_id, sender);
    }

    fn remove(&self, ride_id: Uuid) -> Option<oneshot::Sender<()>> {
        self.inner.lock().expect("watchdog registry poisoned").remove(&ride_id)
    }

    /// Apaga el watchdog de un viaje si sigue corriendo (el viaje se
    /// matcheó o canceló por otro camino)
    pub fn cancel(&self, ride_id: Uuid) {
        if let Some(sender) = self.remove(ride_id) {
            // El receptor pudo haber terminado justo antes; irrelevante
            let _ = sender.send(());
        }
    }
}

/// Lanza el watchdog de un viaje recién creado
pub fn spawn_requested_watchdog(state: RideState, ride_id: Uuid) {
    let (cancel_tx, cancel_rx) = oneshot::channel();
    state.watchdogs.insert(ride_id, cancel_tx);

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(REQUESTED_TIMEOUT) => {
                expire_ride(&state, ride_id).await;
                state.watchdogs.remove(ride_id);
            }
            _ = cancel_rx => {
                // Cancelación cooperativa: el timer se libera acá
            }
        }
    });
}

async fn expire_ride(state: &RideState, ride_id: Uuid) {
    let repo = RideRepository::new(state.pool.clone());

    match repo.cancel_requested(ride_id, NO_DRIVERS_REASON).await {
        Ok(Some(cancelled)) => {
            info!("viaje {} autocancelado: sin conductores en 120 s", ride_id);

            let message = RideStatusMessage {
                ride_id,
                driver_id: None,
                status: RideStatus::Cancelled,
                reason: Some(NO_DRIVERS_REASON.to_string()),
                final_fare: None,
                actual_distance_km: None,
                actual_duration_minutes: None,
                timestamp: chrono::Utc::now(),
            };
            if let Err(e) = state
                .publisher
                .publish(EXCHANGE_RIDE_TOPIC, &message.routing_key(), &message)
                .await
            {
                warn!("fallo publicando cancelación del viaje {}: {}", cancelled.ride_id, e);
            }
        }
        Ok(None) => {
            // El viaje avanzó o ya fue cancelado antes del vencimiento
        }
        Err(e) => warn!("watchdog del viaje {} fallo al cancelar: {}", ride_id, e),
    }
}
