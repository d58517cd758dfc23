//! Repositorio de viajes
//!
//! Todas las escrituras sobre `rides` registran su evento en
//! `ride_events` dentro de la misma transacción. Las transiciones
//! llevan un guard de estado en el WHERE: si otra transacción ganó la
//! carrera, la update no afecta filas y el llamador lo trata como
//! no-op idempotente.

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::coordinate::EntityType;
use crate::models::ride::{Ride, RideDetails, RideEventType, RideStatus, RideType};
use crate::utils::errors::AppResult;

/// Datos de inserción de un viaje nuevo
#[derive(Debug, Clone)]
pub struct NewRide {
    pub id: Uuid,
    pub ride_number: String,
    pub passenger_id: Uuid,
    pub ride_type: RideType,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub pickup_address: String,
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    pub destination_address: String,
    pub estimated_fare: f64,
    pub estimated_distance_km: f64,
    pub estimated_duration_minutes: i32,
}

/// Viaje cancelado junto con lo necesario para notificar
#[derive(Debug, Clone)]
pub struct CancelledRide {
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub previous_status: RideStatus,
}

pub struct RideRepository {
    pool: PgPool,
}

impl RideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserta el viaje en REQUESTED con sus dos coordenadas de
    /// pasajero y el evento RIDE_REQUESTED, todo en una transacción.
    pub async fn create(&self, new_ride: NewRide) -> AppResult<Ride> {
        let mut tx = self.pool.begin().await?;

        let pickup_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO coordinates (id, entity_id, entity_type, address, latitude, longitude, location, is_current)
            VALUES ($1, $2, $3, $4, $5, $6, ST_SetSRID(ST_MakePoint($6, $5), 4326)::geography, FALSE)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_ride.id)
        .bind(EntityType::Passenger)
        .bind(&new_ride.pickup_address)
        .bind(new_ride.pickup_latitude)
        .bind(new_ride.pickup_longitude)
        .fetch_one(&mut *tx)
        .await?;

        let destination_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO coordinates (id, entity_id, entity_type, address, latitude, longitude, location, is_current)
            VALUES ($1, $2, $3, $4, $5, $6, ST_SetSRID(ST_MakePoint($6, $5), 4326)::geography, FALSE)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_ride.id)
        .bind(EntityType::Passenger)
        .bind(&new_ride.destination_address)
        .bind(new_ride.destination_latitude)
        .bind(new_ride.destination_longitude)
        .fetch_one(&mut *tx)
        .await?;

        let ride: Ride = sqlx::query_as(
            r#"
            INSERT INTO rides (
                id, ride_number, passenger_id, ride_type, status,
                estimated_fare, estimated_distance_km, estimated_duration_minutes,
                pickup_coordinate_id, destination_coordinate_id, requested_at
            )
            VALUES ($1, $2, $3, $4, 'REQUESTED', $5, $6, $7, $8, $9, NOW())
            RETURNING *
            "#,
        )
        .bind(new_ride.id)
        .bind(&new_ride.ride_number)
        .bind(new_ride.passenger_id)
        .bind(new_ride.ride_type)
        .bind(new_ride.estimated_fare)
        .bind(new_ride.estimated_distance_km)
        .bind(new_ride.estimated_duration_minutes)
        .bind(pickup_id)
        .bind(destination_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO ride_events (id, ride_id, event_type, event_data) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(ride.id)
        .bind(RideEventType::RideRequested.as_str())
        .bind(json!({
            "ride_number": ride.ride_number,
            "ride_type": ride.ride_type,
            "estimated_fare": ride.estimated_fare,
            "estimated_distance_km": ride.estimated_distance_km,
        }))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ride)
    }

    pub async fn find_by_id(&self, ride_id: Uuid) -> AppResult<Option<Ride>> {
        let ride = sqlx::query_as::<_, Ride>("SELECT * FROM rides WHERE id = $1")
            .bind(ride_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ride)
    }

    /// Viaje con sus coordenadas de recogida y destino resueltas
    pub async fn find_details(&self, ride_id: Uuid) -> AppResult<Option<RideDetails>> {
        let details = sqlx::query_as::<_, RideDetails>(
            r#"
            SELECT r.id, r.ride_number, r.passenger_id, r.driver_id, r.ride_type, r.status,
                   r.estimated_fare,
                   p.latitude  AS pickup_latitude,
                   p.longitude AS pickup_longitude,
                   COALESCE(p.address, '') AS pickup_address,
                   d.latitude  AS destination_latitude,
                   d.longitude AS destination_longitude,
                   COALESCE(d.address, '') AS destination_address
            FROM rides r
            JOIN coordinates p ON p.id = r.pickup_coordinate_id
            JOIN coordinates d ON d.id = r.destination_coordinate_id
            WHERE r.id = $1
            "#,
        )
        .bind(ride_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(details)
    }

    /// REQUESTED -> MATCHED con asignación de conductor. Devuelve
    /// false si el viaje ya no estaba en REQUESTED (reentrega o carrera).
    pub async fn mark_matched(&self, ride_id: Uuid, driver_id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE rides
            SET status = 'MATCHED', driver_id = $2, matched_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'REQUESTED'
            "#,
        )
        .bind(ride_id)
        .bind(driver_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO ride_events (id, ride_id, event_type, event_data) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(ride_id)
        .bind(RideEventType::DriverMatched.as_str())
        .bind(json!({ "driver_id": driver_id, "matched_at": Utc::now() }))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    /// MATCHED -> EN_ROUTE, disparada por la primera posición del
    /// conductor con ride id. Silenciosa si ya avanzó.
    pub async fn mark_en_route(&self, ride_id: Uuid) -> AppResult<bool> {
        let updated = sqlx::query(
            "UPDATE rides SET status = 'EN_ROUTE', updated_at = NOW() WHERE id = $1 AND status = 'MATCHED'",
        )
        .bind(ride_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    /// Cancelación del watchdog: solo si el viaje sigue en REQUESTED.
    /// Devuelve None si alguien llegó antes (match o cancelación).
    pub async fn cancel_requested(
        &self,
        ride_id: Uuid,
        reason: &str,
    ) -> AppResult<Option<CancelledRide>> {
        self.cancel_guarded(ride_id, reason, "('REQUESTED')").await
    }

    /// Cancelación del pasajero: permitida desde REQUESTED o MATCHED.
    pub async fn cancel_by_passenger(
        &self,
        ride_id: Uuid,
        reason: &str,
    ) -> AppResult<Option<CancelledRide>> {
        self.cancel_guarded(ride_id, reason, "('REQUESTED', 'MATCHED')").await
    }

    async fn cancel_guarded(
        &self,
        ride_id: Uuid,
        reason: &str,
        guard: &'static str,
    ) -> AppResult<Option<CancelledRide>> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "SELECT passenger_id, driver_id, status FROM rides \
             WHERE id = $1 AND status IN {} FOR UPDATE",
            guard
        );
        let row: Option<(Uuid, Option<Uuid>, RideStatus)> = sqlx::query_as(&query)
            .bind(ride_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some((passenger_id, driver_id, previous_status)) = row else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE rides
            SET status = 'CANCELLED', cancelled_at = NOW(), cancellation_reason = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(ride_id)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO ride_events (id, ride_id, event_type, event_data) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(ride_id)
        .bind(RideEventType::RideCancelled.as_str())
        .bind(json!({
            "reason": reason,
            "previous_status": previous_status,
            "cancelled_at": Utc::now(),
        }))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(CancelledRide {
            ride_id,
            passenger_id,
            driver_id,
            previous_status,
        }))
    }

    /// Anota un evento fuera de una transición (consumidores de estado)
    pub async fn record_event(
        &self,
        ride_id: Uuid,
        event_type: RideEventType,
        event_data: serde_json::Value,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO ride_events (id, ride_id, event_type, event_data) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(ride_id)
        .bind(event_type.as_str())
        .bind(event_data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Chequeo de de-duplicación contra la bitácora para consumidores
    /// idempotentes frente a reentregas
    pub async fn has_event(&self, ride_id: Uuid, event_type: RideEventType) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM ride_events WHERE ride_id = $1 AND event_type = $2)",
        )
        .bind(ride_id)
        .bind(event_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
