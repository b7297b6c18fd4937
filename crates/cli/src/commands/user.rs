//! User bootstrap.
//!
//! ```bash
//! STOCKMIRROR_USER_PASSWORD=... smctl user create -u admin -e admin@example.com -r admin
//! ```

use stockmirror_api::db::UserRepository;
use stockmirror_api::models::user::NewUser;
use stockmirror_api::services::auth::{hash_password, validate_password};
use stockmirror_core::{Email, Role, UserId};

use super::{CliError, connect};

/// Create a user with the given role; returns the new ID.
///
/// # Errors
///
/// Returns `CliError::Invalid` for a bad username, email or role,
/// `CliError::Auth` for a weak password and `CliError::Repository` when
/// the username or email is taken.
pub async fn create(
    username: &str,
    email: Option<&str>,
    role: &str,
    password: &str,
) -> Result<UserId, CliError> {
    let username = username.trim();
    if username.is_empty() || username.chars().any(char::is_whitespace) {
        return Err(CliError::Invalid(format!("username {username:?}")));
    }
    let role: Role = role
        .parse()
        .map_err(|_| CliError::Invalid(format!("role {role} (admin, manager, staff)")))?;
    let email = email
        .map(Email::parse)
        .transpose()
        .map_err(|e| CliError::Invalid(e.to_string()))?;
    validate_password(password)?;

    let pool = connect().await?;
    let user = UserRepository::new(&pool)
        .create(&NewUser {
            username: username.to_string(),
            email,
            password_hash: hash_password(password)?,
            role,
            permissions: Vec::new(),
            created_by: None,
        })
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, role = %user.role, "User created");
    Ok(user.id)
}
