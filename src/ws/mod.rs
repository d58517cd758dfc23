//! Canales push en tiempo real
//!
//! Un canal duplex autenticado por entidad. El registro mapea
//! entidad -> conexión; enviar a una entidad ausente es un no-op.

pub mod driver;
pub mod passenger;
pub mod registry;

pub use registry::ConnectionRegistry;

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::dto::ws::WsFrame;
use crate::models::user::UserRole;
use crate::utils::jwt::{self, JwtConfig};

/// Plazo para el frame `auth` tras abrir el canal
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Cadencia del ping del servidor
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Deadline de lectura; se extiende con cada frame entrante
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Espera el frame `auth` y valida el token: misma clave HMAC que el
/// HTTP, el sujeto debe coincidir con el id de la URL y el rol con el
/// tipo de endpoint.
pub(crate) async fn authenticate_socket(
    receiver: &mut SplitStream<WebSocket>,
    expected_id: Uuid,
    expected_role: UserRole,
    config: &JwtConfig,
) -> Result<(), String> {
    let auth_frame = tokio::time::timeout(AUTH_TIMEOUT, async {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Text(text) = message {
                if let Ok(WsFrame::Auth { token }) = serde_json::from_str::<WsFrame>(&text) {
                    return Some(token);
                }
            }
        }
        None
    })
    .await;

    let token = match auth_frame {
        Ok(Some(token)) => token,
        Ok(None) => return Err("connection closed before authentication".to_string()),
        Err(_) => return Err("authentication timeout".to_string()),
    };

    let bearer = jwt::extract_bearer_token(&token).map_err(|e| e.to_string())?;
    let claims = jwt::verify_token(bearer, config).map_err(|e| e.to_string())?;

    let subject = claims.subject_id().map_err(|e| e.to_string())?;
    if subject != expected_id {
        return Err("token subject does not match requested entity".to_string());
    }
    if claims.role != expected_role {
        return Err(format!("token role must be {}", expected_role));
    }

    Ok(())
}

/// Serializa y envía un frame por el lado de escritura del socket
pub(crate) async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &WsFrame,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).unwrap_or_else(|_| String::from("{}"));
    sender.send(Message::Text(text)).await
}
