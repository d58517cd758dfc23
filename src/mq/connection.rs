//! Conexión al broker AMQP
//!
//! El arranque intenta un número acotado de veces y aborta el proceso
//! si el broker no aparece; las reconexiones posteriores (pérdida de
//! canal de un consumidor) reintentan para siempre con backoff
//! exponencial de 5 s duplicándose hasta 60 s.

use std::time::Duration;

use lapin::{Connection, ConnectionProperties};
use tracing::{info, warn};

use crate::utils::errors::{AppError, AppResult};

const INITIAL_BACKOFF: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const STARTUP_ATTEMPTS: u32 = 10;

/// Handle del broker: conserva la URL para poder reconectar
#[derive(Debug, Clone)]
pub struct Broker {
    amqp_url: String,
}

impl Broker {
    pub fn new(amqp_url: String) -> Self {
        Self { amqp_url }
    }

    /// Conexión inicial, con reintentos acotados
    pub async fn connect(&self) -> AppResult<Connection> {
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 1..=STARTUP_ATTEMPTS {
            match Connection::connect(&self.amqp_url, ConnectionProperties::default()).await {
                Ok(conn) => {
                    info!("conectado al broker AMQP");
                    return Ok(conn);
                }
                Err(e) if attempt < STARTUP_ATTEMPTS => {
                    warn!(
                        "broker no disponible (intento {}/{}): {}; reintento en {:?}",
                        attempt, STARTUP_ATTEMPTS, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(e) => {
                    return Err(AppError::Broker(format!(
                        "failed to connect to AMQP broker: {}",
                        e
                    )));
                }
            }
        }

        unreachable!("loop returns on last attempt")
    }

    /// Reconexión tras perder un canal: insiste hasta lograrlo
    pub async fn reconnect(&self) -> Connection {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match Connection::connect(&self.amqp_url, ConnectionProperties::default()).await {
                Ok(conn) => {
                    info!("reconectado al broker AMQP");
                    return conn;
                }
                Err(e) => {
                    warn!("reconexión al broker fallida: {}; reintento en {:?}", e, backoff);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }
}
