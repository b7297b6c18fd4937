//! User management (`manage_users`).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;

use stockmirror_core::{Email, Permission, Role, UserId};

use crate::db::UserRepository;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::user::{NewUser, User, UserChanges};
use crate::services::auth::{hash_password, validate_password};
use crate::state::AppState;

const MAX_USERNAME_LENGTH: usize = 64;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub permissions: Option<Vec<Permission>>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

fn parse_username(raw: &str) -> Result<String, AppError> {
    let username = raw.trim();
    if username.is_empty() || username.len() > MAX_USERNAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "username must be 1-{MAX_USERNAME_LENGTH} characters"
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest(
            "username must not contain whitespace".to_string(),
        ));
    }
    Ok(username.to_string())
}

fn parse_email(raw: Option<&str>) -> Result<Option<Email>, AppError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Email::parse)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// `GET /api/users`
pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<User>>, AppError> {
    current.require(Permission::ManageUsers)?;
    Ok(Json(UserRepository::new(state.pool()).list_all().await?))
}

/// `POST /api/users`
pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    current.require(Permission::ManageUsers)?;

    let username = parse_username(&req.username)?;
    let email = parse_email(req.email.as_deref())?;
    validate_password(&req.password)?;
    let password_hash = hash_password(&req.password)?;

    let user = UserRepository::new(state.pool())
        .create(&NewUser {
            username,
            email,
            password_hash,
            role: req.role,
            permissions: req.permissions,
            created_by: Some(current.id()),
        })
        .await?;

    info!(user_id = %user.id, role = %user.role, created_by = %current.id(), "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /api/users/{id}`
pub async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    current.require(Permission::ManageUsers)?;
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

/// `PATCH /api/users/{id}`
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<UserId>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    current.require(Permission::ManageUsers)?;
    if id == current.id() && req.is_active == Some(false) {
        return Err(AppError::BadRequest(
            "you cannot deactivate your own account".to_string(),
        ));
    }

    let password_hash = match req.password.as_deref() {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let changes = UserChanges {
        email: parse_email(req.email.as_deref())?,
        role: req.role,
        permissions: req.permissions,
        is_active: req.is_active,
        password_hash,
    };
    let user = UserRepository::new(state.pool()).update(id, &changes).await?;

    info!(user_id = %id, updated_by = %current.id(), "User updated");
    Ok(Json(user))
}

/// `DELETE /api/users/{id}`: deactivates; rows are kept for the ledger.
pub async fn deactivate(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    current.require(Permission::ManageUsers)?;
    if id == current.id() {
        return Err(AppError::BadRequest(
            "you cannot deactivate your own account".to_string(),
        ));
    }

    UserRepository::new(state.pool())
        .update(
            id,
            &UserChanges {
                is_active: Some(false),
                ..UserChanges::default()
            },
        )
        .await?;

    info!(user_id = %id, deactivated_by = %current.id(), "User deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_username() {
        assert_eq!(parse_username("  ana ").ok(), Some("ana".to_string()));
        assert!(parse_username("").is_err());
        assert!(parse_username("two words").is_err());
        assert!(parse_username(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_parse_email_treats_blank_as_absent() {
        assert!(parse_email(None).unwrap_or_default().is_none());
        assert!(parse_email(Some("  ")).unwrap_or_default().is_none());
        assert!(parse_email(Some("ana@example.com")).is_ok_and(|e| e.is_some()));
        assert!(parse_email(Some("not-an-email")).is_err());
    }
}
