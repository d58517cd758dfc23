//! Servicio de viajes
//!
//! Crea el viaje, publica el pedido de matching, arma el watchdog y
//! coordina el ciclo de vida aplicando los mensajes que llegan de los
//! consumidores (respuesta del conductor, posiciones, estados).

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::dto::common::{GeoPoint, LatLng};
use crate::dto::ride_dto::{
    CancelRideResponse, CreateRideRequest, CreateRideResponse, RideResponse,
};
use crate::dto::ws::WsFrame;
use crate::models::driver::DriverStatus;
use crate::models::ride::{Ride, RideEventType, RideStatus};
use crate::mq::messages::{
    LocationBroadcast, MatchRequestMessage, MatchResponseMessage, RideStatusMessage,
};
use crate::mq::topology::EXCHANGE_RIDE_TOPIC;
use crate::repositories::driver_repository::DriverRepository;
use crate::repositories::ride_repository::{NewRide, RideRepository};
use crate::services::watchdog::{self, REQUESTED_TIMEOUT};
use crate::state::RideState;
use crate::utils::errors::{not_found_error, AppError, AppResult};
use crate::utils::{fare, geo};

/// Correlativo NNN del número de viaje, por proceso
static RIDE_SEQ: AtomicU32 = AtomicU32::new(1);

/// Velocidad supuesta cuando el conductor va demasiado lento o parado
const FALLBACK_SPEED_KMH: f64 = 40.0;

pub struct RideService {
    state: RideState,
    repo: RideRepository,
}

impl RideService {
    pub fn new(state: RideState) -> Self {
        let repo = RideRepository::new(state.pool.clone());
        Self { state, repo }
    }

    /// Crea un viaje en REQUESTED, publica el pedido de matching y
    /// deja corriendo el watchdog de 120 s.
    pub async fn create_ride(
        &self,
        passenger_id: Uuid,
        request: CreateRideRequest,
    ) -> AppResult<CreateRideResponse> {
        request.validate()?;

        let distance_km = geo::haversine_km(
            request.pickup_latitude,
            request.pickup_longitude,
            request.destination_latitude,
            request.destination_longitude,
        );
        let (duration_minutes, estimated_fare) = fare::estimate(request.ride_type, distance_km);

        let ride_id = Uuid::new_v4();
        let seq = RIDE_SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
        let ride_number = format!("RIDE_{}_{:03}", Utc::now().format("%Y%m%d_%H%M%S"), seq);

        let ride = self
            .repo
            .create(NewRide {
                id: ride_id,
                ride_number,
                passenger_id,
                ride_type: request.ride_type,
                pickup_latitude: request.pickup_latitude,
                pickup_longitude: request.pickup_longitude,
                pickup_address: request.pickup_address.clone(),
                destination_latitude: request.destination_latitude,
                destination_longitude: request.destination_longitude,
                destination_address: request.destination_address.clone(),
                estimated_fare,
                estimated_distance_km: distance_km,
                estimated_duration_minutes: duration_minutes,
            })
            .await?;

        let match_request = MatchRequestMessage {
            ride_id: ride.id,
            ride_number: ride.ride_number.clone(),
            pickup_location: GeoPoint {
                latitude: request.pickup_latitude,
                longitude: request.pickup_longitude,
                address: request.pickup_address,
            },
            destination_location: GeoPoint {
                latitude: request.destination_latitude,
                longitude: request.destination_longitude,
                address: request.destination_address,
            },
            ride_type: request.ride_type,
            estimated_fare,
            timeout_seconds: REQUESTED_TIMEOUT.as_secs(),
            correlation_id: Uuid::new_v4(),
        };
        if let Err(e) = self
            .state
            .publisher
            .publish(EXCHANGE_RIDE_TOPIC, &match_request.routing_key(), &match_request)
            .await
        {
            // La fila ya está en REQUESTED; el watchdog la cancelará si
            // ningún despacho la toma
            warn!("fallo publicando match request del viaje {}: {}", ride.id, e);
        }

        watchdog::spawn_requested_watchdog(self.state.clone(), ride.id);

        info!("viaje {} creado ({})", ride.id, ride.ride_number);

        Ok(CreateRideResponse {
            ride_id: ride.id,
            ride_number: ride.ride_number,
            status: ride.status,
            estimated_fare,
            estimated_duration_minutes: duration_minutes,
            estimated_distance_km: distance_km,
        })
    }

    /// Cancelación del pasajero con política de reintegro: 100% en
    /// REQUESTED, 90% en MATCHED, rechazo en cualquier otro estado.
    pub async fn cancel_ride(
        &self,
        ride_id: Uuid,
        passenger_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<CancelRideResponse> {
        let ride = self
            .repo
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| not_found_error("ride", ride_id))?;

        if ride.passenger_id != passenger_id {
            return Err(AppError::Forbidden("you cannot cancel this ride".to_string()));
        }

        let refund_percent: u8 = match ride.status {
            RideStatus::Requested => 100,
            RideStatus::Matched => 90,
            other => {
                return Err(AppError::InvalidStatus(format!(
                    "ride cannot be cancelled from status '{}'",
                    other
                )))
            }
        };

        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "Cancelled by passenger".to_string());

        let cancelled = self
            .repo
            .cancel_by_passenger(ride_id, &reason)
            .await?
            .ok_or_else(|| {
                AppError::InvalidStatus("ride is no longer cancellable".to_string())
            })?;

        self.state.watchdogs.cancel(ride_id);

        let message = RideStatusMessage {
            ride_id,
            driver_id: cancelled.driver_id,
            status: RideStatus::Cancelled,
            reason: Some(reason),
            final_fare: None,
            actual_distance_km: None,
            actual_duration_minutes: None,
            timestamp: Utc::now(),
        };
        if let Err(e) = self
            .state
            .publisher
            .publish(EXCHANGE_RIDE_TOPIC, &message.routing_key(), &message)
            .await
        {
            warn!("fallo publicando cancelación del viaje {}: {}", ride_id, e);
        }

        // Si el conductor seguía asignado, vuelve a quedar disponible
        if let Some(driver_id) = cancelled.driver_id {
            let drivers = DriverRepository::new(self.state.pool.clone());
            if let Err(e) = drivers.update_status(driver_id, DriverStatus::Available).await {
                warn!("no se pudo liberar al conductor {}: {}", driver_id, e);
            }
        }

        Ok(CancelRideResponse {
            ride_id,
            status: RideStatus::Cancelled,
            refund_percent,
            message: "Ride cancelled successfully".to_string(),
        })
    }

    pub async fn get_ride(&self, ride_id: Uuid, passenger_id: Uuid) -> AppResult<RideResponse> {
        let ride = self
            .repo
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| not_found_error("ride", ride_id))?;

        if ride.passenger_id != passenger_id {
            return Err(AppError::Forbidden("you cannot access this ride".to_string()));
        }

        Ok(ride_response(ride))
    }

    /// Aplica la respuesta del motor de matching: REQUESTED -> MATCHED
    /// y notificación push al pasajero. Idempotente frente a
    /// reentregas: si el viaje ya no está en REQUESTED no pasa nada, y
    /// si además quedó terminal se libera al conductor (el despacho lo
    /// dejó EN_ROUTE antes de enterarse).
    pub async fn handle_driver_acceptance(&self, response: MatchResponseMessage) -> AppResult<()> {
        if !response.accepted {
            info!(
                "conductor {} rechazó el viaje {} (correlation {})",
                response.driver_id, response.ride_id, response.correlation_id
            );
            return Ok(());
        }

        let matched = self
            .repo
            .mark_matched(response.ride_id, response.driver_id)
            .await?;

        if !matched {
            let ride = self
                .repo
                .find_by_id(response.ride_id)
                .await?
                .ok_or_else(|| {
                    not_found_error("ride", response.ride_id)
                })?;

            if ride.status.is_terminal() {
                let drivers = DriverRepository::new(self.state.pool.clone());
                if let Err(e) = drivers
                    .update_status(response.driver_id, DriverStatus::Available)
                    .await
                {
                    warn!("no se pudo liberar al conductor {}: {}", response.driver_id, e);
                }
            }
            return Ok(());
        }

        self.state.watchdogs.cancel(response.ride_id);

        self.state
            .passengers
            .send(
                self.passenger_of(response.ride_id).await?,
                WsFrame::RideStatusUpdate {
                    ride_id: response.ride_id,
                    status: RideStatus::Matched,
                    message: Some("A driver has been matched to your ride".to_string()),
                    driver_info: Some(response.driver_info),
                    final_fare: None,
                },
            )
            .await;

        Ok(())
    }

    /// Posición del conductor durante un viaje activo: primera
    /// posición con ride id avanza MATCHED -> EN_ROUTE, y se
    /// recalculan distancia al pickup y ETA para el pasajero.
    pub async fn handle_location_update(&self, update: LocationBroadcast) -> AppResult<()> {
        let Some(ride_id) = update.ride_id else {
            // Conductor sin viaje activo: nada que proyectar
            return Ok(());
        };

        let details = self
            .repo
            .find_details(ride_id)
            .await?
            .ok_or_else(|| not_found_error("ride", ride_id))?;

        let mut status = details.status;
        if !matches!(
            status,
            RideStatus::Matched | RideStatus::EnRoute | RideStatus::Arrived
        ) {
            return Ok(());
        }

        if status == RideStatus::Matched && self.repo.mark_en_route(ride_id).await? {
            status = RideStatus::EnRoute;
        }

        let (estimated_arrival, distance_to_pickup_km) =
            if matches!(status, RideStatus::Matched | RideStatus::EnRoute) {
                let distance = geo::haversine_km(
                    update.location.lat,
                    update.location.lng,
                    details.pickup_latitude,
                    details.pickup_longitude,
                );
                (Some(eta_from(distance, update.speed_kmh)), Some(distance))
            } else {
                (None, None)
            };

        self.state
            .passengers
            .send(
                details.passenger_id,
                WsFrame::DriverLocationUpdate {
                    ride_id,
                    driver_location: LatLng {
                        lat: update.location.lat,
                        lng: update.location.lng,
                    },
                    speed_kmh: update.speed_kmh,
                    heading_degrees: update.heading_degrees,
                    estimated_arrival,
                    distance_to_pickup_km,
                },
            )
            .await;

        Ok(())
    }

    /// Aplica un evento de estado publicado por quien posee la
    /// transición. El registro en la bitácora se deduplica contra
    /// `ride_events`; el push al pasajero siempre sale.
    pub async fn handle_status_event(&self, event: RideStatusMessage) -> AppResult<()> {
        let ride = self
            .repo
            .find_by_id(event.ride_id)
            .await?
            .ok_or_else(|| not_found_error("ride", event.ride_id))?;

        if let Some(event_type) = event_type_for(event.status) {
            if !self.repo.has_event(event.ride_id, event_type).await? {
                self.repo
                    .record_event(
                        event.ride_id,
                        event_type,
                        serde_json::json!({
                            "status": event.status,
                            "driver_id": event.driver_id,
                            "reason": event.reason.clone(),
                            "final_fare": event.final_fare,
                            "actual_distance_km": event.actual_distance_km,
                            "actual_duration_minutes": event.actual_duration_minutes,
                            "timestamp": event.timestamp,
                        }),
                    )
                    .await?;
            }
        }

        let message = match event.status {
            RideStatus::InProgress => Some("Your ride has started".to_string()),
            RideStatus::Completed => Some("Your ride has been completed".to_string()),
            RideStatus::Cancelled => event.reason.clone().or_else(|| Some("Your ride was cancelled".to_string())),
            _ => None,
        };

        self.state
            .passengers
            .send(
                ride.passenger_id,
                WsFrame::RideStatusUpdate {
                    ride_id: event.ride_id,
                    status: event.status,
                    message,
                    driver_info: None,
                    final_fare: event.final_fare,
                },
            )
            .await;

        Ok(())
    }

    async fn passenger_of(&self, ride_id: Uuid) -> AppResult<Uuid> {
        let ride = self
            .repo
            .find_by_id(ride_id)
            .await?
            .ok_or_else(|| not_found_error("ride", ride_id))?;
        Ok(ride.passenger_id)
    }
}

/// ETA a partir de la distancia restante y la velocidad actual; por
/// debajo de 10 km/h se asume la velocidad de crucero de 40.
fn eta_from(distance_km: f64, speed_kmh: Option<f64>) -> chrono::DateTime<Utc> {
    let speed = match speed_kmh {
        Some(s) if s >= 10.0 => s,
        _ => FALLBACK_SPEED_KMH,
    };
    let minutes = distance_km / speed * 60.0;
    Utc::now() + chrono::Duration::seconds((minutes * 60.0) as i64)
}

fn event_type_for(status: RideStatus) -> Option<RideEventType> {
    match status {
        RideStatus::Matched => Some(RideEventType::DriverMatched),
        RideStatus::InProgress => Some(RideEventType::RideStarted),
        RideStatus::Completed => Some(RideEventType::RideCompleted),
        RideStatus::Cancelled => Some(RideEventType::RideCancelled),
        _ => None,
    }
}

fn ride_response(ride: Ride) -> RideResponse {
    RideResponse {
        ride_id: ride.id,
        ride_number: ride.ride_number,
        status: ride.status,
        ride_type: ride.ride_type,
        driver_id: ride.driver_id,
        estimated_fare: ride.estimated_fare,
        estimated_distance_km: ride.estimated_distance_km,
        estimated_duration_minutes: ride.estimated_duration_minutes,
        final_fare: ride.final_fare,
        cancellation_reason: ride.cancellation_reason,
        requested_at: ride.requested_at,
        matched_at: ride.matched_at,
        started_at: ride.started_at,
        completed_at: ride.completed_at,
        cancelled_at: ride.cancelled_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_uses_current_speed_when_reasonable() {
        let before = Utc::now();
        let eta = eta_from(30.0, Some(30.0));
        // 30 km a 30 km/h: una hora
        let minutes = (eta - before).num_minutes();
        assert!((59..=61).contains(&minutes), "minutes was {}", minutes);
    }

    #[test]
    fn eta_falls_back_below_ten_kmh() {
        let before = Utc::now();
        let eta = eta_from(40.0, Some(3.0));
        // 40 km con fallback de 40 km/h: una hora
        let minutes = (eta - before).num_minutes();
        assert!((59..=61).contains(&minutes), "minutes was {}", minutes);
    }

    #[test]
    fn only_lifecycle_statuses_map_to_events() {
        assert!(event_type_for(RideStatus::Requested).is_none());
        assert!(event_type_for(RideStatus::EnRoute).is_none());
        assert_eq!(
            event_type_for(RideStatus::Completed).map(|e| e.as_str()),
            Some("RIDE_COMPLETED")
        );
        assert_eq!(
            event_type_for(RideStatus::Cancelled).map(|e| e.as_str()),
            Some("RIDE_CANCELLED")
        );
    }
}
