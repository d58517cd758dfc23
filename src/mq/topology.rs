//! Topología del broker
//!
//! Dos exchanges topic y un fanout; cuatro colas durables. Cada
//! servicio declara la topología completa al arrancar: las
//! declaraciones son idempotentes y así ningún servicio depende del
//! orden de arranque de los demás.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};

use crate::utils::errors::{AppError, AppResult};

pub const EXCHANGE_RIDE_TOPIC: &str = "ride_topic";
pub const EXCHANGE_DRIVER_TOPIC: &str = "driver_topic";
pub const EXCHANGE_LOCATION_FANOUT: &str = "location_fanout";

pub const QUEUE_DRIVER_MATCHING: &str = "driver_matching";
pub const QUEUE_DRIVER_RESPONSES: &str = "driver_responses";
pub const QUEUE_RIDE_STATUS: &str = "ride_status";
pub const QUEUE_LOCATION_UPDATES_RIDE: &str = "location_updates_ride";

fn durable() -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

fn durable_queue() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

/// Declara exchanges, colas y bindings
pub async fn declare_topology(channel: &Channel) -> AppResult<()> {
    let map_err = |e: lapin::Error| AppError::Broker(format!("topology declaration failed: {}", e));

    channel
        .exchange_declare(EXCHANGE_RIDE_TOPIC, ExchangeKind::Topic, durable(), FieldTable::default())
        .await
        .map_err(map_err)?;
    channel
        .exchange_declare(EXCHANGE_DRIVER_TOPIC, ExchangeKind::Topic, durable(), FieldTable::default())
        .await
        .map_err(map_err)?;
    channel
        .exchange_declare(
            EXCHANGE_LOCATION_FANOUT,
            ExchangeKind::Fanout,
            durable(),
            FieldTable::default(),
        )
        .await
        .map_err(map_err)?;

    for queue in [
        QUEUE_DRIVER_MATCHING,
        QUEUE_DRIVER_RESPONSES,
        QUEUE_RIDE_STATUS,
        QUEUE_LOCATION_UPDATES_RIDE,
    ] {
        channel
            .queue_declare(queue, durable_queue(), FieldTable::default())
            .await
            .map_err(map_err)?;
    }

    channel
        .queue_bind(
            QUEUE_DRIVER_MATCHING,
            EXCHANGE_RIDE_TOPIC,
            "ride.request.*",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(map_err)?;
    channel
        .queue_bind(
            QUEUE_RIDE_STATUS,
            EXCHANGE_RIDE_TOPIC,
            "ride.status.*",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(map_err)?;
    channel
        .queue_bind(
            QUEUE_DRIVER_RESPONSES,
            EXCHANGE_DRIVER_TOPIC,
            "driver.response.*",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(map_err)?;
    channel
        .queue_bind(
            QUEUE_LOCATION_UPDATES_RIDE,
            EXCHANGE_LOCATION_FANOUT,
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(map_err)?;

    Ok(())
}
