//! Publicador AMQP
//!
//! Entrega persistente, JSON UTF-8. Un fallo de publicación se
//! devuelve al llamador: el publicador nunca acumula mensajes en
//! memoria.

use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel};
use serde::Serialize;

use crate::utils::errors::{AppError, AppResult};

#[derive(Clone)]
pub struct Publisher {
    channel: Option<Channel>,
}

impl Publisher {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    /// Publicador sin canal: toda publicación falla con error de
    /// broker. Sirve para armar estados de servicio en tests de router
    /// que nunca llegan a publicar.
    pub fn disconnected() -> Self {
        Self { channel: None }
    }

    /// Publica `payload` como JSON en el exchange con la routing key dada.
    /// Para un fanout la routing key es la cadena vacía.
    pub async fn publish<T: Serialize>(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &T,
    ) -> AppResult<()> {
        let Some(channel) = &self.channel else {
            return Err(AppError::Broker("publisher is not connected".to_string()));
        };

        let body = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(format!("failed to serialize message: {}", e)))?;

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2);

        channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|e| AppError::Broker(format!("publish to '{}' failed: {}", exchange, e)))?
            .await
            .map_err(|e| AppError::Broker(format!("publish to '{}' not confirmed: {}", exchange, e)))?;

        Ok(())
    }
}
