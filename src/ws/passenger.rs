//! Canal WebSocket del pasajero
//!
//! Handshake de autenticación (un frame `auth` dentro de los 5 s),
//! ping del servidor cada 30 s y deadline de lectura de 60 s que se
//! extiende con cualquier tráfico entrante. El pasajero solo recibe:
//! sus frames entrantes se ignoran salvo el cierre.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::dto::ws::WsFrame;
use crate::models::user::UserRole;
use crate::state::RideState;
use crate::ws::{authenticate_socket, send_frame, HEARTBEAT_INTERVAL, READ_TIMEOUT};

pub async fn passenger_ws_handler(
    ws: WebSocketUpgrade,
    Path(passenger_id): Path<Uuid>,
    State(state): State<RideState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_passenger_socket(socket, passenger_id, state))
}

async fn handle_passenger_socket(socket: WebSocket, passenger_id: Uuid, state: RideState) {
    let (mut sender, mut receiver) = socket.split();

    if let Err(reason) = authenticate_socket(
        &mut receiver,
        passenger_id,
        UserRole::Passenger,
        &state.config.jwt(),
    )
    .await
    {
        debug!("handshake de pasajero {} rechazado: {}", passenger_id, reason);
        let _ = send_frame(&mut sender, &WsFrame::Error { message: reason }).await;
        return;
    }

    if send_frame(
        &mut sender,
        &WsFrame::AuthSuccess {
            message: "authenticated".to_string(),
        },
    )
    .await
    .is_err()
    {
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.passengers.register(passenger_id, tx.clone()).await;
    info!("pasajero {} conectado", passenger_id);

    let mut ping = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut deadline = tokio::time::Instant::now() + READ_TIMEOUT;

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if send_frame(&mut sender, &frame).await.is_err() {
                            break;
                        }
                    }
                    // Desplazado por una conexión más nueva
                    None => break,
                }
            }
            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {
                        deadline = tokio::time::Instant::now() + READ_TIMEOUT;
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                debug!("pasajero {} sin heartbeat; cerrando", passenger_id);
                break;
            }
        }
    }

    state.passengers.unregister_if(passenger_id, &tx).await;
    info!("pasajero {} desconectado", passenger_id);
}
