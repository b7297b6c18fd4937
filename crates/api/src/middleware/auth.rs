//! Bearer-token authentication extractor.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

use stockmirror_core::{Permission, Role, UserId};

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::user::User;
use crate::state::AppState;

/// The authenticated, active user behind the request's bearer token.
///
/// The user row is re-read on every request, so deactivation and role
/// changes take effect before the token expires.
///
/// ```rust,ignore
/// async fn handler(user: CurrentUser) -> Result<Json<Product>, AppError> {
///     user.require(Permission::ManageProducts)?;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Fail with 403 unless the user holds `permission`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` when the permission is missing.
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.0.can(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "requires permission {permission}"
            )))
        }
    }

    #[must_use]
    pub const fn id(&self) -> UserId {
        self.0.id
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.0.role
    }

    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.0.can(permission)
    }
}

/// Token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let claims = state.jwt().verify(token)?;
        let user_id = claims.user_id()?;

        let user = UserRepository::new(state.pool())
            .get_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Unauthorized("user not found or inactive".to_string()))?;

        set_sentry_user(user.id.as_i32(), &user.username);
        tracing::Span::current().record("user_id", user.id.as_i32());

        Ok(Self(user))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use axum::http::StatusCode;
    use chrono::Utc;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn current(role: Role, permissions: Vec<Permission>) -> CurrentUser {
        CurrentUser(User {
            id: UserId::new(7),
            username: "sam".to_string(),
            email: None,
            role,
            permissions,
            is_active: true,
            created_by: None,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_staff_is_forbidden_from_managing_products() {
        let staff = current(Role::Staff, vec![]);
        assert!(staff.require(Permission::ManageStock).is_ok());
        let err = staff.require(Permission::ManageProducts).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_explicit_grant_allows() {
        let staff = current(Role::Staff, vec![Permission::ViewReports]);
        assert!(staff.require(Permission::ViewReports).is_ok());
        assert!(current(Role::Manager, vec![]).require(Permission::ManageUsers).is_err());
        assert!(current(Role::Admin, vec![]).require(Permission::ManageUsers).is_ok());
    }
}
