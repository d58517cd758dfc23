//! Posiciones actuales e históricas
//!
//! `coordinates` guarda tanto la posición vigente de un conductor
//! (filas `driver`, con bandera is_current que se reescribe en cada
//! update) como los puntos de recogida/destino de un viaje (filas
//! `passenger`, insertadas una vez y nunca modificadas).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminador de filas en `coordinates`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "entity_type", rename_all = "lowercase")]
pub enum EntityType {
    Driver,
    Passenger,
}

/// Fila de `coordinates`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Coordinate {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub entity_type: EntityType,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fila de `location_history` (migaja append-only)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LocationHistory {
    pub id: Uuid,
    pub coordinate_id: Uuid,
    pub driver_id: Uuid,
    pub ride_id: Option<Uuid>,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub heading_degrees: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}
