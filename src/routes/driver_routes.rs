//! Rutas del servicio de despacho

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Extension, Json, Router};
use serde_json::json;
use uuid::Uuid;

use crate::dto::driver_dto::{
    CompleteRideRequest, CompleteRideResponse, GoOfflineResponse, GoOnlineRequest,
    GoOnlineResponse, LocationUpdateRequest, LocationUpdateResponse, RegisterDriverRequest,
    RegisterDriverResponse, StartRideRequest, StartRideResponse,
};
use crate::middleware::auth::{require_auth, AuthUser};
use crate::models::user::UserRole;
use crate::services::driver_service::DriverService;
use crate::state::DispatchState;
use crate::utils::errors::AppError;
use crate::ws::driver::driver_ws_handler;

pub fn create_driver_router(state: DispatchState) -> Router {
    let protected = Router::new()
        .route("/drivers/:driver_id/register", post(register_driver))
        .route("/drivers/:driver_id/online", post(go_online))
        .route("/drivers/:driver_id/offline", post(go_offline))
        .route("/drivers/:driver_id/location", post(update_location))
        .route("/drivers/:driver_id/start", post(start_ride))
        .route("/drivers/:driver_id/complete", post(complete_ride))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth::<DispatchState>,
        ));

    Router::new()
        .merge(protected)
        .route("/ws/drivers/:driver_id", get(driver_ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "service": "dispatch-service", "status": "healthy" }))
}

/// El conductor solo opera sobre sí mismo
fn require_driver(user: &AuthUser, driver_id: Uuid) -> Result<(), AppError> {
    if user.role != UserRole::Driver {
        return Err(AppError::Forbidden(
            "only drivers can perform this operation".to_string(),
        ));
    }
    if user.id != driver_id {
        return Err(AppError::Forbidden(
            "cannot act on behalf of another driver".to_string(),
        ));
    }
    Ok(())
}

async fn register_driver(
    State(state): State<DispatchState>,
    Extension(user): Extension<AuthUser>,
    Path(driver_id): Path<Uuid>,
    Json(request): Json<RegisterDriverRequest>,
) -> Result<(StatusCode, Json<RegisterDriverResponse>), AppError> {
    require_driver(&user, driver_id)?;

    let service = DriverService::new(state);
    let response = service.register(driver_id, request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

async fn go_online(
    State(state): State<DispatchState>,
    Extension(user): Extension<AuthUser>,
    Path(driver_id): Path<Uuid>,
    Json(request): Json<GoOnlineRequest>,
) -> Result<Json<GoOnlineResponse>, AppError> {
    require_driver(&user, driver_id)?;

    let service = DriverService::new(state);
    let response = service.go_online(driver_id, request).await?;

    Ok(Json(response))
}

async fn go_offline(
    State(state): State<DispatchState>,
    Extension(user): Extension<AuthUser>,
    Path(driver_id): Path<Uuid>,
) -> Result<Json<GoOfflineResponse>, AppError> {
    require_driver(&user, driver_id)?;

    let service = DriverService::new(state);
    let response = service.go_offline(driver_id).await?;

    Ok(Json(response))
}

async fn update_location(
    State(state): State<DispatchState>,
    Extension(user): Extension<AuthUser>,
    Path(driver_id): Path<Uuid>,
    Json(request): Json<LocationUpdateRequest>,
) -> Result<Json<LocationUpdateResponse>, AppError> {
    require_driver(&user, driver_id)?;

    let service = DriverService::new(state);
    let response = service.update_location(driver_id, request).await?;

    Ok(Json(response))
}

async fn start_ride(
    State(state): State<DispatchState>,
    Extension(user): Extension<AuthUser>,
    Path(driver_id): Path<Uuid>,
    Json(request): Json<StartRideRequest>,
) -> Result<Json<StartRideResponse>, AppError> {
    require_driver(&user, driver_id)?;

    let service = DriverService::new(state);
    let response = service.start_ride(driver_id, request).await?;

    Ok(Json(response))
}

async fn complete_ride(
    State(state): State<DispatchState>,
    Extension(user): Extension<AuthUser>,
    Path(driver_id): Path<Uuid>,
    Json(request): Json<CompleteRideRequest>,
) -> Result<Json<CompleteRideResponse>, AppError> {
    require_driver(&user, driver_id)?;

    let service = DriverService::new(state);
    let response = service.complete_ride(driver_id, request).await?;

    Ok(Json(response))
}
