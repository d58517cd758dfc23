//! Consumidores del broker
//!
//! Ack manual en todos: procesamiento exitoso ACKea, un fallo
//! transitorio NACKea con requeue y un mensaje veneno (JSON
//! malformado, viaje inexistente) NACKea sin requeue. Cada consumidor
//! corre en su propia task con su propio ciclo de reconexión.

pub mod driver_response_consumer;
pub mod location_consumer;
pub mod matching_consumer;
pub mod status_consumer;

use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::utils::errors::{AppError, AppResult};

/// Decodifica el cuerpo JSON de una entrega; un cuerpo malformado es
/// veneno y termina descartado (BadRequest no se reencola)
pub(crate) fn parse_delivery<T: DeserializeOwned>(delivery: &Delivery) -> AppResult<T> {
    serde_json::from_slice(&delivery.data)
        .map_err(|e| AppError::BadRequest(format!("malformed message payload: {}", e)))
}

/// Cierra la entrega según el resultado del handler
pub(crate) async fn finish_delivery(delivery: &Delivery, result: AppResult<()>) {
    match result {
        Ok(()) => {
            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                warn!("ack falló: {}", e);
            }
        }
        Err(e) => {
            let requeue = e.should_requeue();
            warn!(
                "handler falló ({}): {}",
                if requeue { "requeue" } else { "drop" },
                e
            );
            if let Err(nack_err) = delivery
                .nack(BasicNackOptions {
                    requeue,
                    ..Default::default()
                })
                .await
            {
                warn!("nack falló: {}", nack_err);
            }
        }
    }
}
