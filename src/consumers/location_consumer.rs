//! Consumidor de `location_updates_ride`
//!
//! Proyecta las posiciones difundidas por el despacho sobre los viajes
//! activos: primera posición con ride id avanza MATCHED -> EN_ROUTE y
//! el pasajero recibe distancia al pickup y ETA recalculados.

use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicConsumeOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::Connection;
use tracing::{info, warn};

use crate::consumers::{finish_delivery, parse_delivery};
use crate::mq::messages::LocationBroadcast;
use crate::mq::topology::{self, QUEUE_LOCATION_UPDATES_RIDE};
use crate::mq::Broker;
use crate::services::ride_service::RideService;
use crate::state::RideState;
use crate::utils::errors::{AppError, AppResult};

pub async fn run(state: RideState, broker: Broker) {
    loop {
        let connection = broker.reconnect().await;
        if let Err(e) = consume(&state, &connection).await {
            warn!("consumidor location_updates_ride cayó: {}; reconectando", e);
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
            QUEUE_LOCATION_UPDATES_RIDE,
            "ride-service-locations",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| AppError::Broker(format!("failed to register consumer: {}", e)))?;

    info!("consumidor location_updates_ride iniciado");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery.map_err(|e| AppError::Broker(format!("delivery error: {}", e)))?;
        let result = handle(state, &delivery).await;
        finish_delivery(&delivery, result).await;
    }

    Ok(())
}

async fn handle(state: &RideState, delivery: &Delivery) -> AppResult<()> {
    let update: LocationBroadcast = parse_delivery(delivery)?;

    RideService::new(state.clone())
        .handle_location_update(update)
        .await
}
