//! Esquemas de los mensajes del broker, uno por routing key

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dto::common::{DriverInfo, GeoPoint, LatLng};
use crate::models::ride::{RideStatus, RideType};

/// `ride_topic` / `ride.request.<tipo>`: pedido de matching emitido
/// al crear un viaje, consumido por el despacho
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequestMessage {
    pub ride_id: Uuid,
    pub ride_number: String,
    pub pickup_location: GeoPoint,
    pub destination_location: GeoPoint,
    pub ride_type: RideType,
    pub estimated_fare: f64,
    pub timeout_seconds: u64,
    pub correlation_id: Uuid,
}

impl MatchRequestMessage {
    pub fn routing_key(&self) -> String {
        format!("ride.request.{}", self.ride_type)
    }
}

/// `driver_topic` / `driver.response.<ride_id>`: resultado del motor
/// de matching, consumido por el servicio de viajes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponseMessage {
    pub ride_id: Uuid,
    pub driver_id: Uuid,
    pub accepted: bool,
    pub correlation_id: Uuid,
    pub driver_info: DriverInfo,
    pub driver_location: LatLng,
    pub estimated_arrival: DateTime<Utc>,
    pub distance_km: f64,
}

impl MatchResponseMessage {
    pub fn routing_key(&self) -> String {
        format!("driver.response.{}", self.ride_id)
    }
}

/// `location_fanout`: posición aceptada de un conductor, difundida a
/// todos los interesados
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationBroadcast {
    pub driver_id: Uuid,
    pub ride_id: Option<Uuid>,
    pub coordinate_id: Uuid,
    pub location: LatLng,
    pub speed_kmh: Option<f64>,
    pub heading_degrees: Option<f64>,
    pub accuracy_meters: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// `ride_topic` / `ride.status.<estado>`: transición de estado
/// originada por quien la posee, consumida por el servicio de viajes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideStatusMessage {
    pub ride_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub status: RideStatus,
    pub reason: Option<String>,
    pub final_fare: Option<f64>,
    pub actual_distance_km: Option<f64>,
    pub actual_duration_minutes: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

impl RideStatusMessage {
    pub fn routing_key(&self) -> String {
        format!("ride.status.{}", self.status.routing_suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_keys() {
        let request = MatchRequestMessage {
            ride_id: Uuid::nil(),
            ride_number: "RIDE_20260801_120000_001".to_string(),
            pickup_location: GeoPoint {
                latitude: 43.2389,
                longitude: 76.8897,
                address: "Abay Ave 1".to_string(),
            },
            destination_location: GeoPoint {
                latitude: 43.2567,
                longitude: 76.9286,
                address: "Dostyk Ave 2".to_string(),
            },
            ride_type: RideType::Economy,
            estimated_fare: 1238.0,
            timeout_seconds: 120,
            correlation_id: Uuid::nil(),
        };
        assert_eq!(request.routing_key(), "ride.request.ECONOMY");

        let status = RideStatusMessage {
            ride_id: Uuid::nil(),
            driver_id: None,
            status: RideStatus::InProgress,
            reason: None,
            final_fare: None,
            actual_distance_km: None,
            actual_duration_minutes: None,
            timestamp: Utc::now(),
        };
        assert_eq!(status.routing_key(), "ride.status.in_progress");
    }
}
