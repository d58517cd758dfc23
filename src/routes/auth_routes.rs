//! Rutas del servicio de autenticación

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Extension, Json, Router};
use serde_json::json;

use crate::dto::auth_dto::{
    LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse,
};
use crate::middleware::auth::{require_auth, AuthUser};
use crate::services::auth_service::AuthService;
use crate::state::AuthServiceState;
use crate::utils::errors::AppError;

pub fn create_auth_router(state: AuthServiceState) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(logout))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth::<AuthServiceState>,
        ));

    Router::new()
        .merge(protected)
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "service": "auth-service", "status": "healthy" }))
}

async fn register(
    State(state): State<AuthServiceState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let service = AuthService::new(state);
    let response = service.register(request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(state): State<AuthServiceState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let service = AuthService::new(state);
    let response = service.login(request).await?;

    Ok(Json(response))
}

async fn logout(
    State(state): State<AuthServiceState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<LogoutResponse>, AppError> {
    let service = AuthService::new(state);
    let response = service.logout(user.id).await?;

    Ok(Json(response))
}
