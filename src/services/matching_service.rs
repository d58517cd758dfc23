//! Motor de matching
//!
//! Por cada pedido: candidatos por cercanía (PostGIS), ranking por
//! score compuesto y ofertas estrictamente secuenciales. Cada oferta
//! vive en un mapa bajo mutex con un canal de respuesta de un solo
//! uso; una respuesta tardía a una oferta vencida se descarta.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dto::common::{DriverInfo, LatLng, Location};
use crate::dto::ws::WsFrame;
use crate::models::driver::{DriverStatus, NearbyDriver};
use crate::mq::messages::{MatchRequestMessage, MatchResponseMessage};
use crate::mq::topology::EXCHANGE_DRIVER_TOPIC;
use crate::mq::Publisher;
use crate::repositories::driver_repository::DriverRepository;
use crate::utils::errors::{AppError, AppResult};
use crate::ws::ConnectionRegistry;

/// Radio de búsqueda de candidatos
pub const SEARCH_RADIUS_KM: f64 = 5.0;

/// Vigencia de la oferta que ve el conductor
pub const OFFER_TTL: Duration = Duration::from_secs(30);

/// Cuánto espera el motor la respuesta antes de pasar al siguiente
pub const OFFER_WAIT: Duration = Duration::from_secs(60);

/// Velocidad media supuesta para el ETA del match
const ASSUMED_SPEED_KMH: f64 = 40.0;

/// Respuesta del conductor a una oferta
#[derive(Debug, Clone)]
pub struct OfferResponse {
    pub accepted: bool,
    pub location: Location,
}

struct PendingOffer {
    ride_id: Uuid,
    driver_id: Uuid,
    expires_at: DateTime<Utc>,
    responder: oneshot::Sender<OfferResponse>,
}

/// Ofertas en vuelo, por offer id. El canal tiene un solo slot: ni el
/// que acepta ni el que espera se bloquean jamás.
#[derive(Clone, Default)]
pub struct OfferRegistry {
    inner: Arc<Mutex<HashMap<Uuid, PendingOffer>>>,
}

impl OfferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(
        &self,
        offer_id: Uuid,
        ride_id: Uuid,
        driver_id: Uuid,
    ) -> oneshot::Receiver<OfferResponse> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().expect("offer registry poisoned").insert(
            offer_id,
            PendingOffer {
                ride_id,
                driver_id,
                expires_at: Utc::now() + chrono::Duration::seconds(OFFER_WAIT.as_secs() as i64),
                responder: tx,
            },
        );
        rx
    }

    fn remove(&self, offer_id: Uuid) {
        self.inner.lock().expect("offer registry poisoned").remove(&offer_id);
    }

    /// Encamina la respuesta de un conductor hacia la espera del
    /// motor. Solo el conductor ofertado puede resolver; la entrada se
    /// destruye al resolverse y un segundo intento (u oferta vencida)
    /// devuelve error con la respuesta descartada.
    pub fn resolve(
        &self,
        offer_id: Uuid,
        driver_id: Uuid,
        response: OfferResponse,
    ) -> AppResult<()> {
        let mut offers = self.inner.lock().expect("offer registry poisoned");

        let offer = match offers.remove(&offer_id) {
            Some(offer) if offer.driver_id == driver_id => offer,
            Some(offer) => {
                // No era para este conductor: la oferta sigue en pie
                offers.insert(offer_id, offer);
                return Err(AppError::Forbidden(
                    "offer was not addressed to this driver".to_string(),
                ));
            }
            None => {
                return Err(AppError::NotFound(format!(
                    "offer '{}' not found or expired",
                    offer_id
                )))
            }
        };
        drop(offers);

        if offer.expires_at < Utc::now() {
            return Err(AppError::InvalidStatus("offer already expired".to_string()));
        }

        debug!("oferta {} del viaje {} resuelta", offer_id, offer.ride_id);

        // Si la espera ya venció, el receptor no existe y el envío se
        // pierde sin bloquear a nadie
        let _ = offer.responder.send(response);
        Ok(())
    }
}

/// Resultado del procesamiento de un pedido de matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched,
    NoCandidates,
    Exhausted,
}

pub struct MatchEngine {
    repo: DriverRepository,
    publisher: Publisher,
    drivers_ws: ConnectionRegistry,
    offers: OfferRegistry,
}

impl MatchEngine {
    pub fn new(
        repo: DriverRepository,
        publisher: Publisher,
        drivers_ws: ConnectionRegistry,
        offers: OfferRegistry,
    ) -> Self {
        Self {
            repo,
            publisher,
            drivers_ws,
            offers,
        }
    }

    /// Procesa un pedido: candidatos, ranking y protocolo secuencial
    /// de ofertas. Sin match, el watchdog del viaje hará la limpieza.
    pub async fn process(&self, request: &MatchRequestMessage) -> AppResult<MatchOutcome> {
        let candidates = self
            .repo
            .find_nearby(
                request.pickup_location.latitude,
                request.pickup_location.longitude,
                request.ride_type,
                SEARCH_RADIUS_KM,
            )
            .await?;

        if candidates.is_empty() {
            info!("sin conductores disponibles para el viaje {}", request.ride_id);
            return Ok(MatchOutcome::NoCandidates);
        }

        let ranked = rank_candidates(candidates);

        for candidate in ranked {
            let offer_id = Uuid::new_v4();
            let offer = WsFrame::RideOffer {
                offer_id,
                ride_id: request.ride_id,
                ride_number: request.ride_number.clone(),
                pickup_location: request.pickup_location.clone(),
                destination_location: request.destination_location.clone(),
                estimated_fare: request.estimated_fare,
                estimated_distance_km: candidate.distance_km,
                expires_at: Utc::now() + chrono::Duration::seconds(OFFER_TTL.as_secs() as i64),
            };

            // La oferta se registra antes de enviarla: una respuesta
            // inmediata no debe encontrar el mapa vacío
            let response_rx = self.offers.register(offer_id, request.ride_id, candidate.id);

            if !self.drivers_ws.send(candidate.id, offer).await {
                // Conductor sin socket: siguiente candidato
                self.offers.remove(offer_id);
                continue;
            }

            match tokio::time::timeout(OFFER_WAIT, response_rx).await {
                Ok(Ok(response)) if response.accepted => {
                    info!(
                        "conductor {} aceptó el viaje {} (oferta {})",
                        candidate.id, request.ride_id, offer_id
                    );

                    if let Err(e) = self.publish_match(request, &candidate, &response).await {
                        warn!(
                            "fallo publicando match del viaje {}: {}; probando siguiente candidato",
                            request.ride_id, e
                        );
                        continue;
                    }

                    if let Err(e) = self
                        .repo
                        .update_status(candidate.id, DriverStatus::EnRoute)
                        .await
                    {
                        warn!("no se pudo marcar EN_ROUTE al conductor {}: {}", candidate.id, e);
                    }

                    self.drivers_ws
                        .send(
                            candidate.id,
                            WsFrame::RideDetails {
                                ride_id: request.ride_id,
                                pickup_location: request.pickup_location.clone(),
                                destination_location: request.destination_location.clone(),
                                estimated_fare: request.estimated_fare,
                            },
                        )
                        .await;

                    return Ok(MatchOutcome::Matched);
                }
                Ok(Ok(_)) => {
                    info!("conductor {} rechazó el viaje {}", candidate.id, request.ride_id);
                    continue;
                }
                Ok(Err(_)) => {
                    // El responder se soltó sin responder (socket caído)
                    self.offers.remove(offer_id);
                    continue;
                }
                Err(_) => {
                    info!("oferta {} al conductor {} venció", offer_id, candidate.id);
                    self.offers.remove(offer_id);
                    continue;
                }
            }
        }

        info!("candidatos agotados para el viaje {}", request.ride_id);
        Ok(MatchOutcome::Exhausted)
    }

    async fn publish_match(
        &self,
        request: &MatchRequestMessage,
        candidate: &NearbyDriver,
        response: &OfferResponse,
    ) -> AppResult<()> {
        let eta_minutes = candidate.distance_km / ASSUMED_SPEED_KMH * 60.0;
        let message = MatchResponseMessage {
            ride_id: request.ride_id,
            driver_id: candidate.id,
            accepted: true,
            correlation_id: request.correlation_id,
            driver_info: DriverInfo {
                driver_id: candidate.id,
                name: candidate.name.clone(),
                rating: candidate.rating,
                vehicle: candidate.vehicle_attrs.0.clone(),
            },
            driver_location: LatLng {
                lat: response.location.latitude,
                lng: response.location.longitude,
            },
            estimated_arrival: Utc::now() + chrono::Duration::seconds((eta_minutes * 60.0) as i64),
            distance_km: candidate.distance_km,
        };

        self.publisher
            .publish(EXCHANGE_DRIVER_TOPIC, &message.routing_key(), &message)
            .await
    }
}

/// Score compuesto: cercanía pesa la mitad, reputación el resto
pub fn driver_score(distance_km: f64, rating: f64, completed_rides: i64, total_rides: i32) -> f64 {
    const DISTANCE_WEIGHT: f64 = 0.5;
    const RATING_WEIGHT: f64 = 0.3;
    const COMPLETION_WEIGHT: f64 = 0.2;

    let distance_score = 1.0 / (1.0 + distance_km);
    let rating_score = rating / 5.0;
    let completion_score = if total_rides > 0 {
        completed_rides as f64 / f64::from(total_rides)
    } else {
        0.0
    };

    distance_score * DISTANCE_WEIGHT + rating_score * RATING_WEIGHT + completion_score * COMPLETION_WEIGHT
}

/// Ordena candidatos por score descendente
pub fn rank_candidates(mut candidates: Vec<NearbyDriver>) -> Vec<NearbyDriver> {
    candidates.sort_by(|a, b| {
        let score_a = driver_score(a.distance_km, a.rating, a.completed_rides, a.total_rides);
        let score_b = driver_score(b.distance_km, b.rating, b.completed_rides, b.total_rides);
        score_b.total_cmp(&score_a)
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::driver::VehicleAttributes;
    use crate::models::ride::RideType;
    use sqlx::types::Json;

    fn candidate(distance_km: f64, rating: f64, completed: i64, total: i32) -> NearbyDriver {
        NearbyDriver {
            id: Uuid::new_v4(),
            name: "driver".to_string(),
            rating,
            total_rides: total,
            completed_rides: completed,
            vehicle_type: RideType::Economy,
            vehicle_attrs: Json(VehicleAttributes {
                color: "white".to_string(),
                model: "Camry".to_string(),
                year: 2021,
            }),
            latitude: 43.24,
            longitude: 76.89,
            distance_km,
        }
    }

    #[test]
    fn score_weights_add_up() {
        // A 0 km, rating perfecto y 100% de completados: score 1.0
        let score = driver_score(0.0, 5.0, 10, 10);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_history_means_zero_completion_score() {
        let score = driver_score(0.0, 5.0, 0, 0);
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn closer_driver_wins_with_equal_reputation() {
        let near = candidate(0.5, 4.5, 90, 100);
        let far = candidate(4.0, 4.5, 90, 100);
        let near_id = near.id;

        let ranked = rank_candidates(vec![far, near]);
        assert_eq!(ranked[0].id, near_id);
    }

    #[test]
    fn reputation_breaks_near_ties() {
        let mediocre = candidate(1.0, 3.0, 30, 100);
        let excellent = candidate(1.0, 5.0, 100, 100);
        let excellent_id = excellent.id;

        let ranked = rank_candidates(vec![mediocre, excellent]);
        assert_eq!(ranked[0].id, excellent_id);
    }

    fn accepted_at(latitude: f64, longitude: f64) -> OfferResponse {
        OfferResponse {
            accepted: true,
            location: Location {
                latitude,
                longitude,
            },
        }
    }

    #[tokio::test]
    async fn offer_resolution_consumes_the_entry() {
        let offers = OfferRegistry::new();
        let offer_id = Uuid::new_v4();
        let driver_id = Uuid::new_v4();
        let rx = offers.register(offer_id, Uuid::new_v4(), driver_id);

        offers
            .resolve(offer_id, driver_id, accepted_at(43.24, 76.89))
            .expect("first resolution succeeds");

        let response = rx.await.expect("response arrives");
        assert!(response.accepted);

        // Segunda resolución: la oferta ya no existe
        let err = offers.resolve(offer_id, driver_id, accepted_at(43.24, 76.89));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn another_driver_cannot_resolve_the_offer() {
        let offers = OfferRegistry::new();
        let offer_id = Uuid::new_v4();
        let driver_id = Uuid::new_v4();
        let rx = offers.register(offer_id, Uuid::new_v4(), driver_id);

        let err = offers.resolve(offer_id, Uuid::new_v4(), accepted_at(43.24, 76.89));
        assert!(err.is_err());

        // La oferta sigue viva para el conductor correcto
        offers
            .resolve(offer_id, driver_id, accepted_at(43.24, 76.89))
            .expect("intended driver can still resolve");
        assert!(rx.await.unwrap().accepted);
    }

    #[tokio::test]
    async fn late_response_after_timeout_is_dropped() {
        let offers = OfferRegistry::new();
        let offer_id = Uuid::new_v4();
        let driver_id = Uuid::new_v4();
        let rx = offers.register(offer_id, Uuid::new_v4(), driver_id);

        // La espera vence y el receptor desaparece
        drop(rx);
        offers.remove(offer_id);

        let err = offers.resolve(offer_id, driver_id, accepted_at(43.24, 76.89));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn resolve_without_waiter_does_not_block() {
        let offers = OfferRegistry::new();
        let offer_id = Uuid::new_v4();
        let driver_id = Uuid::new_v4();
        let rx = offers.register(offer_id, Uuid::new_v4(), driver_id);
        drop(rx);

        // La entrada sigue viva pero nadie espera: el envío se pierde
        // sin bloquear
        let result = offers.resolve(offer_id, driver_id, accepted_at(43.24, 76.89));
        assert!(result.is_ok());
    }
}
