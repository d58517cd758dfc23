//! Frames de los canales WebSocket
//!
//! Un único sobre etiquetado `{type, …campos}` cubre todos los frames
//! de pasajero y conductor, en ambas direcciones. Los variantes que un
//! lado nunca envía simplemente no se construyen en ese lado.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dto::common::{DriverInfo, GeoPoint, LatLng, Location};
use crate::models::ride::RideStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsFrame {
    /// Primer frame del cliente tras abrir el canal
    Auth { token: String },

    AuthSuccess {
        message: String,
    },

    Error {
        message: String,
    },

    /// Cambio de estado del viaje, hacia el pasajero
    RideStatusUpdate {
        ride_id: Uuid,
        status: RideStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        driver_info: Option<DriverInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        final_fare: Option<f64>,
    },

    /// Posición del conductor en vivo, hacia el pasajero
    DriverLocationUpdate {
        ride_id: Uuid,
        driver_location: LatLng,
        #[serde(skip_serializing_if = "Option::is_none")]
        speed_kmh: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        heading_degrees: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        estimated_arrival: Option<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        distance_to_pickup_km: Option<f64>,
    },

    /// Oferta de viaje, hacia el conductor
    RideOffer {
        offer_id: Uuid,
        ride_id: Uuid,
        ride_number: String,
        pickup_location: GeoPoint,
        destination_location: GeoPoint,
        estimated_fare: f64,
        estimated_distance_km: f64,
        expires_at: DateTime<Utc>,
    },

    /// Detalle completo tras aceptar, hacia el conductor
    RideDetails {
        ride_id: Uuid,
        pickup_location: GeoPoint,
        destination_location: GeoPoint,
        estimated_fare: f64,
    },

    /// Respuesta del conductor a una oferta
    RideResponse {
        offer_id: Uuid,
        ride_id: Uuid,
        accepted: bool,
        current_location: Location,
    },

    /// Posición enviada por el conductor por el socket
    LocationUpdate {
        latitude: f64,
        longitude: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        accuracy_meters: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        speed_kmh: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        heading_degrees: Option<f64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_frame_wire_format() {
        let frame: WsFrame =
            serde_json::from_str(r#"{"type":"auth","token":"Bearer abc"}"#).unwrap();
        assert_eq!(
            frame,
            WsFrame::Auth {
                token: "Bearer abc".to_string()
            }
        );
    }

    #[test]
    fn ride_response_frame_roundtrip() {
        let json = r#"{
            "type": "ride_response",
            "offer_id": "2c6d38f3-5a40-4c94-8d6e-57dd3f6a11f1",
            "ride_id": "7d8e18a1-90bc-4e6f-a1a2-64a7b3f3c111",
            "accepted": true,
            "current_location": {"latitude": 43.2, "longitude": 76.9}
        }"#;
        let frame: WsFrame = serde_json::from_str(json).unwrap();
        match frame {
            WsFrame::RideResponse { accepted, current_location, .. } => {
                assert!(accepted);
                assert_eq!(current_location.latitude, 43.2);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn status_update_omits_empty_fields() {
        let frame = WsFrame::RideStatusUpdate {
            ride_id: Uuid::nil(),
            status: RideStatus::Matched,
            message: None,
            driver_info: None,
            final_fare: None,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "ride_status_update");
        assert_eq!(json["status"], "MATCHED");
        assert!(json.get("final_fare").is_none());
        assert!(json.get("driver_info").is_none());
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let result: Result<WsFrame, _> = serde_json::from_str(r#"{"type":"bogus"}"#);
        assert!(result.is_err());
    }
}
