//! Modelo del conductor, su sesión y el resultado de la búsqueda espacial

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::ride::RideType;

/// Estado del conductor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "driver_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Offline,
    Available,
    EnRoute,
    Busy,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Offline => "OFFLINE",
            DriverStatus::Available => "AVAILABLE",
            DriverStatus::EnRoute => "EN_ROUTE",
            DriverStatus::Busy => "BUSY",
        }
    }
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atributos del vehículo (columna jsonb)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleAttributes {
    pub color: String,
    pub model: String,
    pub year: i32,
}

/// Fila de `drivers`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Driver {
    pub id: Uuid,
    pub license_number: String,
    pub vehicle_type: RideType,
    pub vehicle_attrs: Json<VehicleAttributes>,
    pub rating: f64,
    pub total_rides: i32,
    pub total_earnings: f64,
    pub status: DriverStatus,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fila de `driver_sessions`: un intervalo online por fila,
/// como máximo uno abierto (ended_at IS NULL) por conductor
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DriverSession {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_rides: i32,
    pub total_earnings: f64,
}

/// Resumen devuelto al cerrar sesión
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub duration_hours: f64,
    pub rides_completed: i64,
    pub earnings: f64,
    pub average_rating: Option<f64>,
}

/// Candidato devuelto por la búsqueda espacial del motor de matching
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NearbyDriver {
    pub id: Uuid,
    pub name: String,
    pub rating: f64,
    pub total_rides: i32,
    pub completed_rides: i64,
    pub vehicle_type: RideType,
    pub vehicle_attrs: Json<VehicleAttributes>,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
}
