//! DTOs del servicio de despacho

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::dto::common::Location;
use crate::models::driver::{DriverStatus, SessionSummary, VehicleAttributes};
use crate::models::ride::{RideStatus, RideType};

/// Body de `POST /drivers/{driver_id}/register`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterDriverRequest {
    #[validate(length(min = 1))]
    pub license_number: String,
    pub vehicle_type: RideType,
    pub vehicle_attrs: VehicleAttributes,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterDriverResponse {
    pub driver_id: Uuid,
    pub status: DriverStatus,
    pub message: String,
}

/// Body de `POST /drivers/{driver_id}/online`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GoOnlineRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoOnlineResponse {
    pub status: DriverStatus,
    pub session_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoOfflineResponse {
    pub status: DriverStatus,
    pub session_id: Uuid,
    pub session_summary: SessionSummary,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Body de `POST /drivers/{driver_id}/location`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LocationUpdateRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub heading_degrees: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationUpdateResponse {
    pub coordinate_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}

/// Body de `POST /drivers/{driver_id}/start`
#[derive(Debug, Clone, Deserialize)]
pub struct StartRideRequest {
    pub ride_id: Uuid,
    pub driver_location: Location,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartRideResponse {
    pub ride_id: Uuid,
    pub status: RideStatus,
    pub started_at: DateTime<Utc>,
    pub message: String,
}

/// Body de `POST /drivers/{driver_id}/complete`
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteRideRequest {
    pub ride_id: Uuid,
    pub final_location: Location,
    pub actual_distance_km: f64,
    pub actual_duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteRideResponse {
    pub ride_id: Uuid,
    pub status: RideStatus,
    pub completed_at: DateTime<Utc>,
    pub final_fare: f64,
    pub driver_earnings: f64,
    pub message: String,
}
