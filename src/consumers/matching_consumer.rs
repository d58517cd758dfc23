//! Consumidor de `driver_matching`
//!
//! Un pedido de matching por mensaje. Cada pedido se procesa en su
//! propia task: las ofertas son secuenciales dentro de un viaje pero
//! viajes distintos se despachan en paralelo. Sin match, el mensaje se
//! ACKea igual y el watchdog del viaje hace la limpieza a los 120 s.

use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use lapin::Connection;
use tracing::{info, warn};

use crate::consumers::{finish_delivery, parse_delivery};
use crate::mq::messages::MatchRequestMessage;
use crate::mq::topology::{self, QUEUE_DRIVER_MATCHING};
use crate::mq::Broker;
use crate::repositories::driver_repository::DriverRepository;
use crate::services::matching_service::MatchEngine;
use crate::state::DispatchState;
use crate::utils::errors::{AppError, AppResult};

pub async fn run(state: DispatchState, broker: Broker) {
    loop {
        let connection = broker.reconnect().await;
        if let Err(e) = consume(&state, &connection).await {
            warn!("consumidor driver_matching cayó: {}; reconectando", e);
        }
    }
}

async fn consume(state: &DispatchState, connection: &Connection) -> AppResult<()> {
    let channel = connection
        .create_channel()
        .await
        .map_err(|e| AppError::Broker(format!("failed to open channel: {}", e)))?;

    topology::declare_topology(&channel).await?;

    let mut consumer = channel
        .basic_consume(
            QUEUE_DRIVER_MATCHING,
            "dispatch-service-matching",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| AppError::Broker(format!("failed to register consumer: {}", e)))?;

    info!("consumidor driver_matching iniciado");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery.map_err(|e| AppError::Broker(format!("delivery error: {}", e)))?;
        let state = state.clone();

        // El protocolo de ofertas puede esperar hasta 60 s por
        // candidato; cada viaje corre aparte
        tokio::spawn(async move {
            let result = handle(&state, &delivery).await;
            finish_delivery(&delivery, result).await;
        });
    }

    Ok(())
}

async fn handle(state: &DispatchState, delivery: &Delivery) -> AppResult<()> {
    let request: MatchRequestMessage = parse_delivery(delivery)?;

    info!(
        "procesando matching del viaje {} ({})",
        request.ride_id, request.ride_type
    );

    let engine = MatchEngine::new(
        DriverRepository::new(state.pool.clone()),
        state.publisher.clone(),
        state.drivers.clone(),
        state.offers.clone(),
    );

    let outcome = engine.process(&request).await?;
    info!("matching del viaje {}: {:?}", request.ride_id, outcome);

    Ok(())
}
