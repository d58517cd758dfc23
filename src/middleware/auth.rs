//! Middleware de autenticación
//!
//! Valida el `Authorization: Bearer <token>` con el secreto HMAC
//! compartido y verifica que el sujeto exista (y siga activo) en la
//! tabla de usuarios. La identidad validada queda en las extensiones
//! del request para los handlers.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::user::{UserRole, UserStatus};
use crate::repositories::user_repository::UserRepository;
use crate::state::{AuthServiceState, DispatchState, RideState};
use crate::utils::errors::AppError;
use crate::utils::jwt::{self, JwtConfig};

/// Identidad autenticada del request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

/// Lo que el middleware necesita de cualquier estado de servicio
pub trait AuthContext {
    fn pool(&self) -> &PgPool;
    fn jwt_config(&self) -> JwtConfig;
}

impl AuthContext for RideState {
    fn pool(&self) -> &PgPool {
        &self.pool
    }
    fn jwt_config(&self) -> JwtConfig {
        self.config.jwt()
    }
}

impl AuthContext for DispatchState {
    fn pool(&self) -> &PgPool {
        &self.pool
    }
    fn jwt_config(&self) -> JwtConfig {
        self.config.jwt()
    }
}

impl AuthContext for AuthServiceState {
    fn pool(&self) -> &PgPool {
        &self.pool
    }
    fn jwt_config(&self) -> JwtConfig {
        self.config.jwt()
    }
}

/// Middleware de autenticación por token Bearer
pub async fn require_auth<S>(
    State(state): State<S>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    S: AuthContext + Clone + Send + Sync + 'static,
{
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?;

    let token = jwt::extract_bearer_token(auth_header)?;
    let claims = jwt::verify_token(token, &state.jwt_config())?;
    let user_id = claims.subject_id()?;

    let users = UserRepository::new(state.pool().clone());
    match users.account_status(user_id).await? {
        Some(UserStatus::Active) => {}
        Some(_) => return Err(AppError::Forbidden("account is not active".to_string())),
        None => return Err(AppError::Unauthorized("unknown token subject".to_string())),
    }

    request.extensions_mut().insert(AuthUser {
        id: user_id,
        role: claims.role,
    });

    Ok(next.run(request).await)
}
