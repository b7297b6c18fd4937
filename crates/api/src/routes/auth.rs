//! Login and own-account endpoints.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockmirror_core::Permission;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::user::User;
use crate::services::auth::{
    AuthError, hash_password, validate_password, verify_password,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Current user with the permissions they effectively hold.
#[derive(Debug, Serialize)]
pub struct Me {
    #[serde(flatten)]
    pub user: User,
    pub effective_permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let users = UserRepository::new(state.pool());
    let credentials = users
        .find_credentials(req.identifier.trim())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if let Err(e) = verify_password(&req.password, &credentials.password_hash) {
        warn!(user_id = %credentials.user.id, "Failed login attempt");
        return Err(e.into());
    }

    let user = credentials.user;
    if !user.is_active {
        return Err(AppError::Forbidden("account is deactivated".to_string()));
    }

    users.touch_last_login(user.id).await?;
    let issued = state.jwt().issue(&user)?;
    info!(user_id = %user.id, username = %user.username, "User logged in");

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user,
    }))
}

/// `GET /api/auth/me`
pub async fn me(CurrentUser(user): CurrentUser) -> Json<Me> {
    let effective_permissions = user.effective_permissions();
    Json(Me {
        user,
        effective_permissions,
    })
}

/// `POST /api/auth/change-password`
pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    let users = UserRepository::new(state.pool());
    let credentials = users
        .get_credentials(current.id())
        .await?
        .ok_or_else(|| AppError::NotFound("user".to_string()))?;

    verify_password(&req.current_password, &credentials.password_hash)
        .map_err(|_| AppError::BadRequest("current password is incorrect".to_string()))?;
    validate_password(&req.new_password)?;

    let hash = hash_password(&req.new_password)?;
    users.set_password_hash(current.id(), &hash).await?;
    info!(user_id = %current.id(), "Password changed");

    Ok(StatusCode::NO_CONTENT)
}
