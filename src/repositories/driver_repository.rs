//! Repositorio de conductores
//!
//! Sesiones, transiciones de estado del conductor y las dos
//! operaciones de viaje que posee el despacho (iniciar y completar),
//! cada una como transacción única. También la búsqueda espacial de
//! candidatos para el motor de matching.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::coordinate::{Coordinate, EntityType};
use crate::models::driver::{
    Driver, DriverSession, DriverStatus, NearbyDriver, SessionSummary, VehicleAttributes,
};
use crate::models::ride::{RideEventType, RideStatus, RideType};
use crate::models::user::{UserRole, UserStatus};
use crate::repositories::ride_repository::CancelledRide;
use crate::utils::errors::{invalid_status_error, not_found_error, AppError, AppResult};
use crate::utils::fare;
use crate::utils::geo;

/// Conductor con los campos de su cuenta de usuario
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DriverAccount {
    pub id: Uuid,
    pub license_number: String,
    pub vehicle_type: RideType,
    pub vehicle_attrs: Json<VehicleAttributes>,
    pub rating: f64,
    pub status: DriverStatus,
    pub is_verified: bool,
    pub role: UserRole,
    pub user_status: UserStatus,
    pub name: String,
}

/// Resultado de iniciar un viaje
#[derive(Debug, Clone)]
pub struct StartedRide {
    pub passenger_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Resultado de completar un viaje
#[derive(Debug, Clone)]
pub struct CompletedRide {
    pub passenger_id: Uuid,
    pub final_fare: f64,
    pub driver_earnings: f64,
    pub actual_distance_km: f64,
    pub actual_duration_minutes: i32,
    pub completed_at: DateTime<Utc>,
}

pub struct DriverRepository {
    pool: PgPool,
}

impl DriverRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Alta del perfil de conductor para un usuario DRIVER existente
    pub async fn create_profile(
        &self,
        driver_id: Uuid,
        license_number: &str,
        vehicle_type: RideType,
        vehicle_attrs: &VehicleAttributes,
    ) -> AppResult<Driver> {
        let driver = sqlx::query_as::<_, Driver>(
            r#"
            INSERT INTO drivers (id, license_number, vehicle_type, vehicle_attrs,
                                 rating, total_rides, total_earnings, status, is_verified)
            VALUES ($1, $2, $3, $4, 5.0, 0, 0, 'OFFLINE', TRUE)
            RETURNING *
            "#,
        )
        .bind(driver_id)
        .bind(license_number)
        .bind(vehicle_type)
        .bind(Json(vehicle_attrs))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::InvalidStatus("driver profile or license number already registered".to_string())
            }
            other => AppError::Database(other),
        })?;

        Ok(driver)
    }

    pub async fn find_account(&self, driver_id: Uuid) -> AppResult<Option<DriverAccount>> {
        let account = sqlx::query_as::<_, DriverAccount>(
            r#"
            SELECT d.id, d.license_number, d.vehicle_type, d.vehicle_attrs, d.rating,
                   d.status, d.is_verified,
                   u.role, u.status AS user_status,
                   COALESCE(u.attrs->>'name', u.email) AS name
            FROM drivers d
            JOIN users u ON u.id = d.id
            WHERE d.id = $1
            "#,
        )
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    pub async fn update_status(&self, driver_id: Uuid, status: DriverStatus) -> AppResult<()> {
        let updated = sqlx::query("UPDATE drivers SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(driver_id)
            .bind(status)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(not_found_error("driver", driver_id));
        }

        Ok(())
    }

    /// Pasar a online. Si ya hay una sesión abierta se reutiliza
    /// (idempotente) pero igual se refresca estado y posición.
    pub async fn open_session(
        &self,
        driver_id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> AppResult<(Uuid, bool)> {
        let mut tx = self.pool.begin().await?;

        let account = fetch_account_for_update(&mut tx, driver_id).await?;
        if account.role != UserRole::Driver {
            return Err(AppError::Forbidden("user is not a driver".to_string()));
        }
        if account.user_status != UserStatus::Active {
            return Err(AppError::Forbidden("driver account is not active".to_string()));
        }
        if !account.is_verified {
            return Err(AppError::Forbidden("driver account is not verified".to_string()));
        }

        let open_session: Option<DriverSession> = sqlx::query_as(
            r#"
            SELECT id, driver_id, started_at, ended_at, total_rides, total_earnings
            FROM driver_sessions
            WHERE driver_id = $1 AND ended_at IS NULL
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(driver_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (session_id, reused) = match open_session {
            Some(session) => (session.id, true),
            None => {
                let id: Uuid = sqlx::query_scalar(
                    r#"
                    INSERT INTO driver_sessions (id, driver_id, started_at, total_rides, total_earnings)
                    VALUES ($1, $2, NOW(), 0, 0)
                    RETURNING id
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(driver_id)
                .fetch_one(&mut *tx)
                .await?;
                (id, false)
            }
        };

        sqlx::query("UPDATE drivers SET status = 'AVAILABLE', updated_at = NOW() WHERE id = $1")
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;

        store_current_location(
            &mut tx,
            driver_id,
            latitude,
            longitude,
            "Initial online location",
            None,
            None,
            None,
            None,
        )
        .await?;

        tx.commit().await?;

        Ok((session_id, reused))
    }

    /// Pasar a offline: cierra la sesión con su resumen, deja al
    /// conductor OFFLINE y cancela todos sus viajes activos.
    pub async fn close_session(
        &self,
        driver_id: Uuid,
    ) -> AppResult<(Uuid, SessionSummary, Vec<CancelledRide>)> {
        let mut tx = self.pool.begin().await?;

        let account = fetch_account_for_update(&mut tx, driver_id).await?;
        if account.role != UserRole::Driver {
            return Err(AppError::Forbidden("user is not a driver".to_string()));
        }
        if account.user_status != UserStatus::Active {
            return Err(AppError::Forbidden("driver account is not active".to_string()));
        }

        let session: Option<DriverSession> = sqlx::query_as(
            r#"
            SELECT id, driver_id, started_at, ended_at, total_rides, total_earnings
            FROM driver_sessions
            WHERE driver_id = $1 AND ended_at IS NULL
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(driver_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(session) = session else {
            return Err(AppError::InvalidStatus(
                "no active session found for driver".to_string(),
            ));
        };

        let (rides_completed, gross_fares): (i64, f64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(final_fare), 0)::double precision
            FROM rides
            WHERE driver_id = $1 AND status = 'COMPLETED' AND completed_at >= $2
            "#,
        )
        .bind(driver_id)
        .bind(session.started_at)
        .fetch_one(&mut *tx)
        .await?;

        let average_rating: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT AVG((re.event_data->>'rating')::numeric)::double precision
            FROM ride_events re
            JOIN rides r ON r.id = re.ride_id
            WHERE r.driver_id = $1
              AND r.status = 'COMPLETED'
              AND r.completed_at >= $2
              AND re.event_type = 'RIDE_COMPLETED'
              AND re.event_data ? 'rating'
            "#,
        )
        .bind(driver_id)
        .bind(session.started_at)
        .fetch_one(&mut *tx)
        .await?;

        let summary = SessionSummary {
            duration_hours: (Utc::now() - session.started_at).num_seconds() as f64 / 3600.0,
            rides_completed,
            earnings: fare::driver_earnings(gross_fares),
            average_rating,
        };

        sqlx::query(
            r#"
            UPDATE driver_sessions
            SET ended_at = NOW(), total_rides = $2, total_earnings = $3
            WHERE id = $1
            "#,
        )
        .bind(session.id)
        .bind(summary.rides_completed as i32)
        .bind(summary.earnings)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE drivers SET status = 'OFFLINE', updated_at = NOW() WHERE id = $1")
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;

        // Viajes activos del conductor: se cancelan con desasignación
        let active_rides: Vec<(Uuid, Uuid, RideStatus)> = sqlx::query_as(
            r#"
            SELECT id, passenger_id, status
            FROM rides
            WHERE driver_id = $1
              AND status IN ('MATCHED', 'EN_ROUTE', 'ARRIVED', 'IN_PROGRESS')
            FOR UPDATE
            "#,
        )
        .bind(driver_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut cancelled = Vec::with_capacity(active_rides.len());
        for (ride_id, passenger_id, previous_status) in active_rides {
            sqlx::query(
                r#"
                UPDATE rides
                SET status = 'CANCELLED', cancelled_at = NOW(),
                    cancellation_reason = 'Driver went offline',
                    driver_id = NULL, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(ride_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO ride_events (id, ride_id, event_type, event_data) VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(ride_id)
            .bind(RideEventType::RideCancelled.as_str())
            .bind(json!({
                "reason": "Driver went offline",
                "previous_status": previous_status,
                "cancelled_at": Utc::now(),
            }))
            .execute(&mut *tx)
            .await?;

            cancelled.push(CancelledRide {
                ride_id,
                passenger_id,
                driver_id: Some(driver_id),
                previous_status,
            });
        }

        tx.commit().await?;

        Ok((session.id, summary, cancelled))
    }

    /// Candidatos para un pedido de matching: disponibles, del tipo de
    /// vehículo pedido y dentro del radio, ordenados por distancia y
    /// rating, tope de 10.
    pub async fn find_nearby(
        &self,
        pickup_latitude: f64,
        pickup_longitude: f64,
        ride_type: RideType,
        radius_km: f64,
    ) -> AppResult<Vec<NearbyDriver>> {
        let drivers = sqlx::query_as::<_, NearbyDriver>(
            r#"
            SELECT d.id,
                   COALESCE(u.attrs->>'name', u.email) AS name,
                   d.rating,
                   d.total_rides,
                   d.total_rides - COALESCE(
                       (SELECT COUNT(*) FROM rides r WHERE r.driver_id = d.id AND r.status = 'CANCELLED'),
                       0
                   ) AS completed_rides,
                   d.vehicle_type,
                   d.vehicle_attrs,
                   c.latitude,
                   c.longitude,
                   ST_Distance(c.location, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography) / 1000.0
                       AS distance_km
            FROM drivers d
            JOIN users u ON u.id = d.id
            JOIN coordinates c ON c.entity_id = d.id
                AND c.entity_type = 'driver'
                AND c.is_current = TRUE
            WHERE d.status = 'AVAILABLE'
              AND d.vehicle_type = $3
              AND ST_DWithin(c.location, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography, $4)
            ORDER BY distance_km ASC, d.rating DESC
            LIMIT 10
            "#,
        )
        .bind(pickup_latitude)
        .bind(pickup_longitude)
        .bind(ride_type)
        .bind(radius_km * 1000.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(drivers)
    }

    /// Viaje activo del conductor, si lo hay (para etiquetar el fanout
    /// de posiciones)
    pub async fn active_ride_of(&self, driver_id: Uuid) -> AppResult<Option<Uuid>> {
        let ride_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM rides
            WHERE driver_id = $1
              AND status IN ('MATCHED', 'EN_ROUTE', 'ARRIVED', 'IN_PROGRESS')
            ORDER BY matched_at DESC
            LIMIT 1
            "#,
        )
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ride_id)
    }

    /// Inicio del viaje: el conductor debe estar asignado, en camino y
    /// a menos de 100 m del punto de recogida.
    pub async fn start_ride(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> AppResult<StartedRide> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(Uuid, RideStatus, f64, f64)> = sqlx::query_as(
            r#"
            SELECT r.passenger_id, r.status, p.latitude, p.longitude
            FROM rides r
            JOIN coordinates p ON p.id = r.pickup_coordinate_id
            WHERE r.id = $1 AND r.driver_id = $2
            FOR UPDATE OF r
            "#,
        )
        .bind(ride_id)
        .bind(driver_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((passenger_id, status, pickup_lat, pickup_lng)) = row else {
            return Err(AppError::NotFound(
                "ride not found or driver not assigned to this ride".to_string(),
            ));
        };

        if !matches!(status, RideStatus::EnRoute | RideStatus::Arrived) {
            return Err(invalid_status_error("start ride", status));
        }

        let distance_km = geo::haversine_km(latitude, longitude, pickup_lat, pickup_lng);
        if distance_km > geo::PICKUP_PROXIMITY_KM {
            return Err(AppError::Unprocessable(format!(
                "driver is too far from pickup location: {:.0} meters away",
                distance_km * 1000.0
            )));
        }

        let started_at = Utc::now();
        sqlx::query(
            r#"
            UPDATE rides
            SET status = 'IN_PROGRESS', arrived_at = NOW(), started_at = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(ride_id)
        .bind(started_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE drivers SET status = 'BUSY', updated_at = NOW() WHERE id = $1")
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO ride_events (id, ride_id, event_type, event_data) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(ride_id)
        .bind(RideEventType::RideStarted.as_str())
        .bind(json!({
            "started_at": started_at,
            "driver_location": { "lat": latitude, "lng": longitude },
        }))
        .execute(&mut *tx)
        .await?;

        store_current_location(
            &mut tx,
            driver_id,
            latitude,
            longitude,
            "Ride in progress",
            Some(ride_id),
            None,
            None,
            None,
        )
        .await?;

        tx.commit().await?;

        Ok(StartedRide {
            passenger_id,
            started_at,
        })
    }

    /// Cierre del viaje: tarifa final sobre distancia/duración reales,
    /// primero el viaje a COMPLETED y después el conductor a AVAILABLE
    /// con sus acumulados, en la misma transacción.
    pub async fn complete_ride(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        latitude: f64,
        longitude: f64,
        actual_distance_km: f64,
        actual_duration_minutes: i32,
    ) -> AppResult<CompletedRide> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(Uuid, RideStatus, RideType)> = sqlx::query_as(
            r#"
            SELECT passenger_id, status, ride_type
            FROM rides
            WHERE id = $1 AND driver_id = $2
            FOR UPDATE
            "#,
        )
        .bind(ride_id)
        .bind(driver_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((passenger_id, status, ride_type)) = row else {
            return Err(AppError::NotFound(
                "ride not found or driver not assigned to this ride".to_string(),
            ));
        };

        if status != RideStatus::InProgress {
            return Err(invalid_status_error("complete ride", status));
        }

        let final_fare = fare::final_fare(
            ride_type,
            actual_distance_km,
            f64::from(actual_duration_minutes),
        );
        let driver_earnings = fare::driver_earnings(final_fare);
        let completed_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE rides
            SET status = 'COMPLETED', final_fare = $2, completed_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(ride_id)
        .bind(final_fare)
        .bind(completed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE drivers
            SET status = 'AVAILABLE',
                total_rides = total_rides + 1,
                total_earnings = total_earnings + $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(driver_id)
        .bind(driver_earnings)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO ride_events (id, ride_id, event_type, event_data) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(ride_id)
        .bind(RideEventType::RideCompleted.as_str())
        .bind(json!({
            "final_fare": final_fare,
            "driver_earnings": driver_earnings,
            "actual_distance_km": actual_distance_km,
            "actual_duration_minutes": actual_duration_minutes,
            "completed_at": completed_at,
        }))
        .execute(&mut *tx)
        .await?;

        store_current_location(
            &mut tx,
            driver_id,
            latitude,
            longitude,
            "Ride completed",
            Some(ride_id),
            None,
            None,
            None,
        )
        .await?;

        tx.commit().await?;

        Ok(CompletedRide {
            passenger_id,
            final_fare,
            driver_earnings,
            actual_distance_km,
            actual_duration_minutes,
            completed_at,
        })
    }
}

async fn fetch_account_for_update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    driver_id: Uuid,
) -> AppResult<DriverAccount> {
    let account: Option<DriverAccount> = sqlx::query_as(
        r#"
        SELECT d.id, d.license_number, d.vehicle_type, d.vehicle_attrs, d.rating,
               d.status, d.is_verified,
               u.role, u.status AS user_status,
               COALESCE(u.attrs->>'name', u.email) AS name
        FROM drivers d
        JOIN users u ON u.id = d.id
        WHERE d.id = $1
        FOR UPDATE OF d
        "#,
    )
    .bind(driver_id)
    .fetch_optional(&mut **tx)
    .await?;

    account.ok_or_else(|| not_found_error("driver", driver_id))
}

/// Reescribe la posición vigente del conductor: la fila anterior pasa
/// a is_current = false, se inserta la nueva y se anota la migaja en
/// location_history, todo bajo la transacción del llamador.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn store_current_location(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    driver_id: Uuid,
    latitude: f64,
    longitude: f64,
    address: &str,
    ride_id: Option<Uuid>,
    accuracy_meters: Option<f64>,
    speed_kmh: Option<f64>,
    heading_degrees: Option<f64>,
) -> AppResult<Coordinate> {
    sqlx::query(
        r#"
        UPDATE coordinates
        SET is_current = FALSE, updated_at = NOW()
        WHERE entity_id = $1 AND entity_type = 'driver' AND is_current = TRUE
        "#,
    )
    .bind(driver_id)
    .execute(&mut **tx)
    .await?;

    let coordinate: Coordinate = sqlx::query_as(
        r#"
        INSERT INTO coordinates (id, entity_id, entity_type, address, latitude, longitude, location, is_current)
        VALUES ($1, $2, $3, $4, $5, $6, ST_SetSRID(ST_MakePoint($6, $5), 4326)::geography, TRUE)
        RETURNING id, entity_id, entity_type, address, latitude, longitude, is_current, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(driver_id)
    .bind(EntityType::Driver)
    .bind(address)
    .bind(latitude)
    .bind(longitude)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO location_history (id, coordinate_id, driver_id, ride_id, latitude, longitude,
                                      accuracy_meters, speed_kmh, heading_degrees, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(coordinate.id)
    .bind(driver_id)
    .bind(ride_id)
    .bind(latitude)
    .bind(longitude)
    .bind(accuracy_meters)
    .bind(speed_kmh)
    .bind(heading_degrees)
    .execute(&mut **tx)
    .await?;

    Ok(coordinate)
}
