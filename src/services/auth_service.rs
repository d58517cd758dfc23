//! Servicio de autenticación
//!
//! Registro con bcrypt, login con sesión única (un token vivo por
//! usuario en `active_tokens`) y logout. El resto del sistema solo
//! valida los tokens que se emiten acá.

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::dto::auth_dto::{
    LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse,
};
use crate::models::user::UserStatus;
use crate::repositories::user_repository::UserRepository;
use crate::state::AuthServiceState;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::jwt;

pub struct AuthService {
    state: AuthServiceState,
    repo: UserRepository,
}

impl AuthService {
    pub fn new(state: AuthServiceState) -> Self {
        let repo = UserRepository::new(state.pool.clone());
        Self { state, repo }
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<RegisterResponse> {
        request.validate()?;

        let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))?;

        let user = self
            .repo
            .create(
                &request.email,
                &password_hash,
                request.role,
                json!({ "name": request.name, "phone": request.phone }),
            )
            .await?;

        info!("usuario {} registrado con rol {}", user.id, user.role);

        Ok(RegisterResponse {
            user_id: user.id,
            email: user.email,
            role: user.role,
        })
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        request.validate()?;

        let user = self
            .repo
            .find_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid email or password".to_string()))?;

        let valid = bcrypt::verify(&request.password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("failed to verify password: {}", e)))?;
        if !valid {
            return Err(AppError::Unauthorized("invalid email or password".to_string()));
        }

        if user.status != UserStatus::Active {
            return Err(AppError::Forbidden("account is not active".to_string()));
        }

        // Sesión única: con un token vivo el login se rechaza
        if self.repo.has_active_token(user.id).await? {
            return Err(AppError::InvalidStatus("user already logged in".to_string()));
        }

        let config = self.state.config.jwt();
        let token = jwt::generate_token(user.id, user.role, &config)?;
        let expires_at = Utc::now() + Duration::seconds(config.expiration_secs as i64);
        self.repo.save_active_token(user.id, &token, expires_at).await?;

        info!("login de {} ({})", user.email, user.role);

        Ok(LoginResponse {
            token,
            user_id: user.id,
            role: user.role,
            expires_in_secs: config.expiration_secs,
        })
    }

    pub async fn logout(&self, user_id: Uuid) -> AppResult<LogoutResponse> {
        self.repo.delete_active_token(user_id).await?;

        Ok(LogoutResponse {
            message: "Logged out successfully".to_string(),
        })
    }
}
