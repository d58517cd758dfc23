//! DTOs del servicio de viajes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::ride::{RideStatus, RideType};

/// Body de `POST /rides`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRideRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub pickup_latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub pickup_longitude: f64,
    #[validate(length(min = 1))]
    pub pickup_address: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub destination_latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub destination_longitude: f64,
    #[validate(length(min = 1))]
    pub destination_address: String,
    pub ride_type: RideType,
}

/// Respuesta de creación con las estimaciones calculadas
#[derive(Debug, Clone, Serialize)]
pub struct CreateRideResponse {
    pub ride_id: Uuid,
    pub ride_number: String,
    pub status: RideStatus,
    pub estimated_fare: f64,
    pub estimated_duration_minutes: i32,
    pub estimated_distance_km: f64,
}

/// Body de `POST /rides/{ride_id}/cancel`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelRideRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelRideResponse {
    pub ride_id: Uuid,
    pub status: RideStatus,
    pub refund_percent: u8,
    pub message: String,
}

/// Respuesta de `GET /rides/{ride_id}`
#[derive(Debug, Clone, Serialize)]
pub struct RideResponse {
    pub ride_id: Uuid,
    pub ride_number: String,
    pub status: RideStatus,
    pub ride_type: RideType,
    pub driver_id: Option<Uuid>,
    pub estimated_fare: f64,
    pub estimated_distance_km: f64,
    pub estimated_duration_minutes: i32,
    pub final_fare: Option<f64>,
    pub cancellation_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}
