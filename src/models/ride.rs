//! Modelo del viaje y su máquina de estados
//!
//! El viaje es el agregado principal: una fila en `rides`, dos
//! coordenadas de pasajero (recogida y destino) y una bitácora
//! append-only en `ride_events`. Los estados terminales son
//! definitivos; toda transición se valida contra la tabla de abajo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tipo de viaje (coincide con el tipo de vehículo del conductor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "ride_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideType {
    Economy,
    Premium,
    Xl,
}

impl RideType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideType::Economy => "ECONOMY",
            RideType::Premium => "PREMIUM",
            RideType::Xl => "XL",
        }
    }
}

impl std::fmt::Display for RideType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estado del viaje
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "ride_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Requested,
    Matched,
    EnRoute,
    Arrived,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Requested => "REQUESTED",
            RideStatus::Matched => "MATCHED",
            RideStatus::EnRoute => "EN_ROUTE",
            RideStatus::Arrived => "ARRIVED",
            RideStatus::InProgress => "IN_PROGRESS",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Cancelled => "CANCELLED",
        }
    }

    /// Sufijo para las routing keys `ride.status.<estado>`
    pub fn routing_suffix(&self) -> &'static str {
        match self {
            RideStatus::Requested => "requested",
            RideStatus::Matched => "matched",
            RideStatus::EnRoute => "en_route",
            RideStatus::Arrived => "arrived",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }

    /// COMPLETED y CANCELLED no admiten más transiciones
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Estados en los que el viaje tiene un conductor ocupado
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RideStatus::Matched | RideStatus::EnRoute | RideStatus::Arrived | RideStatus::InProgress
        )
    }

    /// Tabla de transiciones legales
    pub fn can_transition_to(&self, next: RideStatus) -> bool {
        use RideStatus::*;
        matches!(
            (self, next),
            (Requested, Matched)
                | (Requested, Cancelled)
                | (Matched, EnRoute)
                | (Matched, Cancelled)
                | (EnRoute, Arrived)
                | (EnRoute, InProgress)
                | (EnRoute, Cancelled)
                | (Arrived, InProgress)
                | (Arrived, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tipo de evento en la bitácora del viaje
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideEventType {
    RideRequested,
    DriverMatched,
    RideStarted,
    RideCompleted,
    RideCancelled,
}

impl RideEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideEventType::RideRequested => "RIDE_REQUESTED",
            RideEventType::DriverMatched => "DRIVER_MATCHED",
            RideEventType::RideStarted => "RIDE_STARTED",
            RideEventType::RideCompleted => "RIDE_COMPLETED",
            RideEventType::RideCancelled => "RIDE_CANCELLED",
        }
    }
}

/// Fila de `rides`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Ride {
    pub id: Uuid,
    pub ride_number: String,
    pub passenger_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub ride_type: RideType,
    pub status: RideStatus,
    pub estimated_fare: f64,
    pub estimated_distance_km: f64,
    pub estimated_duration_minutes: i32,
    pub final_fare: Option<f64>,
    pub pickup_coordinate_id: Option<Uuid>,
    pub destination_coordinate_id: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Viaje con sus coordenadas de recogida y destino ya resueltas
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RideDetails {
    pub id: Uuid,
    pub ride_number: String,
    pub passenger_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub ride_type: RideType,
    pub status: RideStatus,
    pub estimated_fare: f64,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub pickup_address: String,
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    pub destination_address: String,
}

/// Fila de `ride_events`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RideEvent {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_everything() {
        for terminal in [RideStatus::Completed, RideStatus::Cancelled] {
            for next in [
                RideStatus::Requested,
                RideStatus::Matched,
                RideStatus::EnRoute,
                RideStatus::Arrived,
                RideStatus::InProgress,
                RideStatus::Completed,
                RideStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next} allowed");
            }
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn happy_path_is_legal() {
        use RideStatus::*;
        let path = [Requested, Matched, EnRoute, Arrived, InProgress, Completed];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {} rejected", pair[0], pair[1]);
        }
    }

    #[test]
    fn en_route_may_skip_arrived() {
        assert!(RideStatus::EnRoute.can_transition_to(RideStatus::InProgress));
    }

    #[test]
    fn every_active_state_can_cancel() {
        use RideStatus::*;
        for from in [Requested, Matched, EnRoute, Arrived, InProgress] {
            assert!(from.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn illegal_shortcuts_are_rejected() {
        use RideStatus::*;
        assert!(!Requested.can_transition_to(InProgress));
        assert!(!Requested.can_transition_to(Completed));
        assert!(!Matched.can_transition_to(Completed));
        assert!(!EnRoute.can_transition_to(Matched));
    }

    #[test]
    fn wire_names() {
        assert_eq!(RideStatus::EnRoute.as_str(), "EN_ROUTE");
        assert_eq!(RideStatus::EnRoute.routing_suffix(), "en_route");
        assert_eq!(RideType::Xl.as_str(), "XL");
        assert_eq!(
            serde_json::to_string(&RideStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
    }
}
