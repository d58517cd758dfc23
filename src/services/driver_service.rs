//! Servicio de conductores
//!
//! Alta de perfil, sesiones online/offline, posiciones con rate limit
//! y las dos transiciones de viaje que dispara el conductor (iniciar
//! y completar). Las posiciones aceptadas salen por el fanout y los
//! cambios de estado por el topic de viajes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::dto::common::LatLng;
use crate::dto::driver_dto::{
    CompleteRideRequest, CompleteRideResponse, GoOfflineResponse, GoOnlineRequest,
    GoOnlineResponse, LocationUpdateRequest, LocationUpdateResponse, RegisterDriverRequest,
    RegisterDriverResponse, StartRideRequest, StartRideResponse,
};
use crate::models::driver::DriverStatus;
use crate::models::ride::RideStatus;
use crate::models::user::UserRole;
use crate::mq::messages::{LocationBroadcast, RideStatusMessage};
use crate::mq::topology::{EXCHANGE_LOCATION_FANOUT, EXCHANGE_RIDE_TOPIC};
use crate::repositories::driver_repository::DriverRepository;
use crate::repositories::location_repository::LocationRepository;
use crate::repositories::user_repository::UserRepository;
use crate::state::DispatchState;
use crate::utils::errors::{not_found_error, AppError, AppResult};
use crate::utils::validation;

/// Ventana mínima entre posiciones aceptadas de un mismo conductor
pub const LOCATION_MIN_INTERVAL: Duration = Duration::from_secs(3);

/// Última posición aceptada por conductor, bajo mutex
#[derive(Clone, Default)]
pub struct LocationRateLimiter {
    last_seen: Arc<Mutex<HashMap<Uuid, Instant>>>,
}

impl LocationRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acepta o rechaza la posición según la ventana de 3 s
    pub fn check(&self, driver_id: Uuid) -> AppResult<()> {
        let mut last_seen = self.last_seen.lock().expect("rate limiter poisoned");
        let now = Instant::now();

        if let Some(previous) = last_seen.get(&driver_id) {
            if now.duration_since(*previous) < LOCATION_MIN_INTERVAL {
                return Err(AppError::RateLimitExceeded);
            }
        }

        last_seen.insert(driver_id, now);
        Ok(())
    }
}

pub struct DriverService {
    state: DispatchState,
    repo: DriverRepository,
}

impl DriverService {
    pub fn new(state: DispatchState) -> Self {
        let repo = DriverRepository::new(state.pool.clone());
        Self { state, repo }
    }

    /// Alta del perfil de conductor sobre un usuario DRIVER existente
    pub async fn register(
        &self,
        driver_id: Uuid,
        request: RegisterDriverRequest,
    ) -> AppResult<RegisterDriverResponse> {
        request.validate()?;
        validation::validate_vehicle_attributes(&request.vehicle_attrs)?;

        let users = UserRepository::new(self.state.pool.clone());
        let user = users
            .find_by_id(driver_id)
            .await?
            .ok_or_else(|| not_found_error("user", driver_id))?;

        if user.role != UserRole::Driver {
            return Err(AppError::Forbidden("user's role is not driver".to_string()));
        }

        let driver = self
            .repo
            .create_profile(
                driver_id,
                request.license_number.trim(),
                request.vehicle_type,
                &request.vehicle_attrs,
            )
            .await?;

        info!("conductor {} registrado", driver.id);

        Ok(RegisterDriverResponse {
            driver_id: driver.id,
            status: driver.status,
            message: "Driver profile registered successfully".to_string(),
        })
    }

    pub async fn go_online(
        &self,
        driver_id: Uuid,
        request: GoOnlineRequest,
    ) -> AppResult<GoOnlineResponse> {
        request.validate()?;

        let (session_id, reused) = self
            .repo
            .open_session(driver_id, request.latitude, request.longitude)
            .await?;

        if reused {
            info!("conductor {} reanudó su sesión {}", driver_id, session_id);
        } else {
            info!("conductor {} online con sesión {}", driver_id, session_id);
        }

        Ok(GoOnlineResponse {
            status: DriverStatus::Available,
            session_id,
            message: "You are now online and ready to accept rides".to_string(),
        })
    }

    /// Cierra la sesión y cancela los viajes activos del conductor;
    /// cada cancelación se publica para que el servicio de viajes
    /// notifique a su pasajero.
    pub async fn go_offline(&self, driver_id: Uuid) -> AppResult<GoOfflineResponse> {
        let (session_id, summary, cancelled_rides) = self.repo.close_session(driver_id).await?;

        for cancelled in &cancelled_rides {
            let message = RideStatusMessage {
                ride_id: cancelled.ride_id,
                driver_id: Some(driver_id),
                status: RideStatus::Cancelled,
                reason: Some("Driver went offline".to_string()),
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
                warn!(
                    "fallo publicando cancelación del viaje {}: {}",
                    cancelled.ride_id, e
                );
            }
        }

        info!(
            "conductor {} offline; sesión {} cerrada con {} viajes",
            driver_id, session_id, summary.rides_completed
        );

        Ok(GoOfflineResponse {
            status: DriverStatus::Offline,
            session_id,
            session_summary: summary,
            message: "You are now offline".to_string(),
            timestamp: Utc::now(),
        })
    }

    /// Posición nueva: rate limit, escritura transaccional y difusión
    /// por el fanout. Si el conductor lleva un viaje activo, el
    /// mensaje sale etiquetado con su ride id.
    pub async fn update_location(
        &self,
        driver_id: Uuid,
        request: LocationUpdateRequest,
    ) -> AppResult<LocationUpdateResponse> {
        self.state.limiter.check(driver_id)?;
        request.validate()?;

        let ride_id = self.repo.active_ride_of(driver_id).await?;

        let locations = LocationRepository::new(self.state.pool.clone());
        let (coordinate_id, recorded_at) = locations
            .update_current(
                driver_id,
                request.latitude,
                request.longitude,
                request.accuracy_meters,
                request.speed_kmh,
                request.heading_degrees,
                ride_id,
            )
            .await?;

        let broadcast = LocationBroadcast {
            driver_id,
            ride_id,
            coordinate_id,
            location: LatLng {
                lat: request.latitude,
                lng: request.longitude,
            },
            speed_kmh: request.speed_kmh,
            heading_degrees: request.heading_degrees,
            accuracy_meters: request.accuracy_meters,
            recorded_at,
        };
        if let Err(e) = self
            .state
            .publisher
            .publish(EXCHANGE_LOCATION_FANOUT, "", &broadcast)
            .await
        {
            // La posición ya quedó persistida; la proyección se
            // reconstruye con la siguiente
            warn!("fallo difundiendo posición del conductor {}: {}", driver_id, e);
        }

        Ok(LocationUpdateResponse {
            coordinate_id,
            recorded_at,
        })
    }

    /// Inicio del viaje con verificación de proximidad al pickup
    pub async fn start_ride(
        &self,
        driver_id: Uuid,
        request: StartRideRequest,
    ) -> AppResult<StartRideResponse> {
        validation::validate_location(
            request.driver_location.latitude,
            request.driver_location.longitude,
        )?;

        let started = self
            .repo
            .start_ride(
                request.ride_id,
                driver_id,
                request.driver_location.latitude,
                request.driver_location.longitude,
            )
            .await?;

        let message = RideStatusMessage {
            ride_id: request.ride_id,
            driver_id: Some(driver_id),
            status: RideStatus::InProgress,
            reason: None,
            final_fare: None,
            actual_distance_km: None,
            actual_duration_minutes: None,
            timestamp: started.started_at,
        };
        if let Err(e) = self
            .state
            .publisher
            .publish(EXCHANGE_RIDE_TOPIC, &message.routing_key(), &message)
            .await
        {
            warn!("fallo publicando inicio del viaje {}: {}", request.ride_id, e);
        }

        Ok(StartRideResponse {
            ride_id: request.ride_id,
            status: RideStatus::InProgress,
            started_at: started.started_at,
            message: "Ride started successfully".to_string(),
        })
    }

    /// Cierre del viaje: tarifa final sobre lo realmente recorrido
    pub async fn complete_ride(
        &self,
        driver_id: Uuid,
        request: CompleteRideRequest,
    ) -> AppResult<CompleteRideResponse> {
        validation::validate_location(
            request.final_location.latitude,
            request.final_location.longitude,
        )?;
        validation::validate_completion(request.actual_distance_km, request.actual_duration_minutes)?;

        let completed = self
            .repo
            .complete_ride(
                request.ride_id,
                driver_id,
                request.final_location.latitude,
                request.final_location.longitude,
                request.actual_distance_km,
                request.actual_duration_minutes,
            )
            .await?;

        let message = RideStatusMessage {
            ride_id: request.ride_id,
            driver_id: Some(driver_id),
            status: RideStatus::Completed,
            reason: None,
            final_fare: Some(completed.final_fare),
            actual_distance_km: Some(completed.actual_distance_km),
            actual_duration_minutes: Some(completed.actual_duration_minutes),
            timestamp: completed.completed_at,
        };
        if let Err(e) = self
            .state
            .publisher
            .publish(EXCHANGE_RIDE_TOPIC, &message.routing_key(), &message)
            .await
        {
            warn!("fallo publicando cierre del viaje {}: {}", request.ride_id, e);
        }

        Ok(CompleteRideResponse {
            ride_id: request.ride_id,
            status: RideStatus::Completed,
            completed_at: completed.completed_at,
            final_fare: completed.final_fare,
            driver_earnings: completed.driver_earnings,
            message: "Ride completed successfully".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_is_accepted_second_is_throttled() {
        let limiter = LocationRateLimiter::new();
        let driver = Uuid::new_v4();

        assert!(limiter.check(driver).is_ok());
        assert!(matches!(
            limiter.check(driver),
            Err(AppError::RateLimitExceeded)
        ));
    }

    #[test]
    fn limiter_tracks_drivers_independently() {
        let limiter = LocationRateLimiter::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(limiter.check(first).is_ok());
        assert!(limiter.check(second).is_ok());
        assert!(limiter.check(first).is_err());
        assert!(limiter.check(second).is_err());
    }
}
