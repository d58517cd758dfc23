//! Canal WebSocket del conductor
//!
//! Mismo handshake y heartbeat que el del pasajero, pero el conductor
//! además habla: `ride_response` entra al canal de la oferta en vuelo
//! y `location_update` pasa por el rate limit y se difunde.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dto::driver_dto::LocationUpdateRequest;
use crate::dto::ws::WsFrame;
use crate::models::user::UserRole;
use crate::repositories::driver_repository::DriverRepository;
use crate::services::driver_service::DriverService;
use crate::services::matching_service::OfferResponse;
use crate::state::DispatchState;
use crate::utils::errors::AppError;
use crate::ws::{authenticate_socket, send_frame, HEARTBEAT_INTERVAL, READ_TIMEOUT};

pub async fn driver_ws_handler(
    ws: WebSocketUpgrade,
    Path(driver_id): Path<Uuid>,
    State(state): State<DispatchState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_driver_socket(socket, driver_id, state))
}

async fn handle_driver_socket(socket: WebSocket, driver_id: Uuid, state: DispatchState) {
    let (mut sender, mut receiver) = socket.split();

    if let Err(reason) = authenticate_socket(
        &mut receiver,
        driver_id,
        UserRole::Driver,
        &state.config.jwt(),
    )
    .await
    {
        debug!("handshake de conductor {} rechazado: {}", driver_id, reason);
        let _ = send_frame(&mut sender, &WsFrame::Error { message: reason }).await;
        return;
    }

    // El socket es de conductores con perfil dado de alta
    let repo = DriverRepository::new(state.pool.clone());
    match repo.find_account(driver_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let _ = send_frame(
                &mut sender,
                &WsFrame::Error {
                    message: "driver profile not found".to_string(),
                },
            )
            .await;
            return;
        }
        Err(e) => {
            warn!("no se pudo verificar el perfil del conductor {}: {}", driver_id, e);
            return;
        }
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
    state.drivers.register(driver_id, tx.clone()).await;
    info!("conductor {} conectado", driver_id);

    let service = DriverService::new(state.clone());
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
                    Some(Ok(Message::Text(text))) => {
                        deadline = tokio::time::Instant::now() + READ_TIMEOUT;
                        handle_inbound_frame(&state, &service, driver_id, &tx, &text).await;
                    }
                    Some(Ok(_)) => {
                        deadline = tokio::time::Instant::now() + READ_TIMEOUT;
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                debug!("conductor {} sin heartbeat; cerrando", driver_id);
                break;
            }
        }
    }

    state.drivers.unregister_if(driver_id, &tx).await;
    info!("conductor {} desconectado", driver_id);
}

async fn handle_inbound_frame(
    state: &DispatchState,
    service: &DriverService,
    driver_id: Uuid,
    tx: &mpsc::UnboundedSender<WsFrame>,
    text: &str,
) {
    let frame: WsFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("frame inválido del conductor {}: {}", driver_id, e);
            return;
        }
    };

    match frame {
        WsFrame::RideResponse {
            offer_id,
            ride_id,
            accepted,
            current_location,
        } => {
            info!(
                "respuesta del conductor {} al viaje {}: accepted={}",
                driver_id, ride_id, accepted
            );
            if let Err(e) = state.offers.resolve(
                offer_id,
                driver_id,
                OfferResponse {
                    accepted,
                    location: current_location,
                },
            ) {
                // Oferta vencida o ya resuelta: la respuesta se descarta
                debug!("respuesta a la oferta {} descartada: {}", offer_id, e);
            }
        }

        WsFrame::LocationUpdate {
            latitude,
            longitude,
            accuracy_meters,
            speed_kmh,
            heading_degrees,
        } => {
            let request = LocationUpdateRequest {
                latitude,
                longitude,
                accuracy_meters,
                speed_kmh,
                heading_degrees,
            };
            match service.update_location(driver_id, request).await {
                Ok(_) => {}
                Err(AppError::RateLimitExceeded) => {
                    let _ = tx.send(WsFrame::Error {
                        message: "Rate limit exceeded. Max 1 update per 3 seconds".to_string(),
                    });
                }
                Err(e) => {
                    warn!("posición del conductor {} falló: {}", driver_id, e);
                }
            }
        }

        other => {
            debug!("frame inesperado del conductor {}: {:?}", driver_id, other);
        }
    }
}
