//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stockmirror_core::{Email, Permission, Role, UserId, has_permission};

/// An API user (domain type).
///
/// The password hash never leaves the repository layer except through
/// [`UserCredentials`].
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<Email>,
    pub role: Role,
    /// Grants on top of the role defaults.
    pub permissions: Vec<Permission>,
    pub is_active: bool,
    pub created_by: Option<UserId>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the user holds `permission` via role or explicit grant.
    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        has_permission(self.role, &self.permissions, permission)
    }

    /// Role defaults plus explicit grants, sorted and deduplicated.
    #[must_use]
    pub fn effective_permissions(&self) -> Vec<Permission> {
        let mut all: Vec<Permission> = self
            .role
            .default_permissions()
            .iter()
            .chain(self.permissions.iter())
            .copied()
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }
}

/// A user together with the stored Argon2 hash, used only for login and
/// password changes.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Fields for a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<Email>,
    pub password_hash: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub created_by: Option<UserId>,
}

/// Partial user update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<Email>,
    pub role: Option<Role>,
    pub permissions: Option<Vec<Permission>>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, permissions: Vec<Permission>) -> User {
        User {
            id: UserId::new(1),
            username: "ana".to_string(),
            email: None,
            role,
            permissions,
            is_active: true,
            created_by: None,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_effective_permissions_merge_role_and_grants() {
        let u = user(Role::Staff, vec![Permission::ViewReports, Permission::ManageStock]);
        assert_eq!(
            u.effective_permissions(),
            vec![Permission::ManageStock, Permission::ViewReports]
        );
        assert!(u.can(Permission::ViewReports));
        assert!(!u.can(Permission::RunSync));
    }
}
