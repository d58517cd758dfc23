//! Rutas del servicio de viajes

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Extension, Json, Router};
use serde_json::json;
use uuid::Uuid;

use crate::dto::ride_dto::{
    CancelRideRequest, CancelRideResponse, CreateRideRequest, CreateRideResponse, RideResponse,
};
use crate::middleware::auth::{require_auth, AuthUser};
use crate::models::user::UserRole;
use crate::services::ride_service::RideService;
use crate::state::RideState;
use crate::utils::errors::AppError;
use crate::ws::passenger::passenger_ws_handler;

pub fn create_ride_router(state: RideState) -> Router {
    let protected = Router::new()
        .route("/rides", post(create_ride))
        .route("/rides/:ride_id", get(get_ride))
        .route("/rides/:ride_id/cancel", post(cancel_ride))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth::<RideState>,
        ));

    Router::new()
        .merge(protected)
        .route("/ws/passengers/:passenger_id", get(passenger_ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "service": "ride-service", "status": "healthy" }))
}

fn require_passenger(user: &AuthUser) -> Result<(), AppError> {
    if user.role != UserRole::Passenger {
        return Err(AppError::Forbidden(
            "only passengers can perform this operation".to_string(),
        ));
    }
    Ok(())
}

async fn create_ride(
    State(state): State<RideState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateRideRequest>,
) -> Result<(StatusCode, Json<CreateRideResponse>), AppError> {
    require_passenger(&user)?;

    let service = RideService::new(state);
    let response = service.create_ride(user.id, request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_ride(
    State(state): State<RideState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideResponse>, AppError> {
    require_passenger(&user)?;

    let service = RideService::new(state);
    let response = service.get_ride(ride_id, user.id).await?;

    Ok(Json(response))
}

async fn cancel_ride(
    State(state): State<RideState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<Uuid>,
    body: Option<Json<CancelRideRequest>>,
) -> Result<Json<CancelRideResponse>, AppError> {
    require_passenger(&user)?;

    let reason = body.and_then(|Json(request)| request.reason);

    let service = RideService::new(state);
    let response = service.cancel_ride(ride_id, user.id, reason).await?;

    Ok(Json(response))
}
