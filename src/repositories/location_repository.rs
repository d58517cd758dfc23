//! Repositorio de posiciones
//!
//! La update de posición aceptada (ya pasó el rate limit) reescribe la
//! bandera is_current y apila la migaja en una sola transacción.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repositories::driver_repository::store_current_location;
use crate::utils::errors::AppResult;

pub struct LocationRepository {
    pool: PgPool,
}

impl LocationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Graba la nueva posición vigente del conductor y devuelve el id
    /// de la coordenada insertada con su timestamp.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_current(
        &self,
        driver_id: Uuid,
        latitude: f64,
        longitude: f64,
        accuracy_meters: Option<f64>,
        speed_kmh: Option<f64>,
        heading_degrees: Option<f64>,
        ride_id: Option<Uuid>,
    ) -> AppResult<(Uuid, DateTime<Utc>)> {
        let mut tx = self.pool.begin().await?;

        let coordinate = store_current_location(
            &mut tx,
            driver_id,
            latitude,
            longitude,
            "Unknown",
            ride_id,
            accuracy_meters,
            speed_kmh,
            heading_degrees,
        )
        .await?;

        tx.commit().await?;

        Ok((coordinate.id, coordinate.created_at))
    }
}
