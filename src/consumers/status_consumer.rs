//! Consumidor de `ride_status`
//!
//! Transiciones que otro servicio ya materializó en la base: acá solo
//! se anota el evento (deduplicado contra la bitácora) y se empuja la
//! novedad al pasajero.

use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicConsumeOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::Connection;
use tracing::{info, warn};

use crate::consumers::{finish_delivery, parse_delivery};
use crate::mq::messages::RideStatusMessage;
use crate::mq::topology::{self, QUEUE_RIDE_STATUS};
use crate::mq::Broker;
use crate::services::ride_service::RideService;
use crate::state::RideState;
use crate::utils::errors::{AppError, AppResult};

pub async fn run(state: RideState, broker: Broker) {
    loop {
        let connection = broker.reconnect().await;
        if let Err(e) = consume(&state, &connection).await {
            warn!("consumidor ride_status cayó: {}; reconectando", e);
        }
    }
}

async fn consume(state: &RideState, connection: &Connection) -> AppResult<()> {
    let channel = connection
        .create_channel()
        .await
        .map_err(|e| AppError::Broker(format!("failed to open channel: {}", e)))?;

    topology::declare_topology(&channel).await?;

    channel
        .basic_qos(1, BasicQosOptions::default())
        .await
        .map_err(|e| AppError::Broker(format!("failed to set qos: {}", e)))?;

    let mut consumer = channel
        .basic_consume(
            QUEUE_RIDE_STATUS,
            "ride-service-status",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| AppError::Broker(format!("failed to register consumer: {}", e)))?;

    info!("consumidor ride_status iniciado");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery.map_err(|e| AppError::Broker(format!("delivery error: {}", e)))?;
        let result = handle(state, &delivery).await;
        finish_delivery(&delivery, result).await;
    }

    Ok(())
}

async fn handle(state: &RideState, delivery: &Delivery) -> AppResult<()> {
    let event: RideStatusMessage = parse_delivery(delivery)?;

    RideService::new(state.clone())
        .handle_status_event(event)
        .await
}
