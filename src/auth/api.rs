//! Authentication API Endpoints
//! Mission: Provide registration, login and current-user endpoints

use crate::auth::{
    jwt::JwtHandler,
    models::{AuthResponse, Claims, LoginRequest, RegisterRequest, UserResponse},
    user_store::UserStore,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, jwt_handler: Arc<JwtHandler>) -> Self {
        Self {
            user_store,
            jwt_handler,
        }
    }
}

/// Registration endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthApiError> {
    if !payload.email.contains('@') {
        return Err(AuthApiError::InvalidEmail);
    }
    if payload.password.len() < 8 {
        return Err(AuthApiError::WeakPassword);
    }
    if payload.display_name.trim().is_empty() {
        return Err(AuthApiError::MissingDisplayName);
    }

    if state
        .user_store
        .find_by_email(&payload.email)
        .map_err(|_| AuthApiError::InternalError)?
        .is_some()
    {
        return Err(AuthApiError::EmailTaken);
    }

    let user = state
        .user_store
        .create(&payload.email, &payload.password, &payload.display_name)
        .map_err(|_| AuthApiError::InternalError)?;

    let (token, expires_in) = state
        .jwt_handler
        .generate_token(&user)
        .map_err(|_| AuthApiError::InternalError)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            expires_in,
            user: UserResponse::from_user(&user),
        }),
    ))
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthApiError> {
    info!("🔐 Login attempt: {}", payload.email);

    let valid = state
        .user_store
        .verify_password(&payload.email, &payload.password)
        .map_err(|_| AuthApiError::InternalError)?;

    if !valid {
        warn!("❌ Failed login attempt: {}", payload.email);
        return Err(AuthApiError::InvalidCredentials);
    }

    let user = state
        .user_store
        .find_by_email(&payload.email)
        .map_err(|_| AuthApiError::InternalError)?
        .ok_or(AuthApiError::InvalidCredentials)?;

    let (token, expires_in) = state
        .jwt_handler
        .generate_token(&user)
        .map_err(|_| AuthApiError::InternalError)?;

    info!("✅ Login successful: {}", user.email);

    Ok(Json(AuthResponse {
        token,
        expires_in,
        user: UserResponse::from_user(&user),
    }))
}

/// Current-user endpoint - GET /api/auth/me (behind auth middleware)
pub async fn get_current_user(Extension(claims): Extension<Claims>) -> Json<serde_json::Value> {
    Json(json!({
        "id": claims.sub,
        "email": claims.email,
        "displayName": claims.display_name,
    }))
}

/// Auth API error types
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    InvalidEmail,
    WeakPassword,
    MissingDisplayName,
    EmailTaken,
    InternalError,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }
            AuthApiError::InvalidEmail => {
                (StatusCode::BAD_REQUEST, "Invalid email address".to_string())
            }
            AuthApiError::WeakPassword => (
                StatusCode::BAD_REQUEST,
                "Password must be at least 8 characters".to_string(),
            ),
            AuthApiError::MissingDisplayName => {
                (StatusCode::BAD_REQUEST, "Display name is required".to_string())
            }
            AuthApiError::EmailTaken => (
                StatusCode::CONFLICT,
                "User with this email already exists".to_string(),
            ),
            AuthApiError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AuthApiError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthApiError::EmailTaken.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AuthApiError::WeakPassword.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
