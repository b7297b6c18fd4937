//! User roles and fine-grained permissions.
//!
//! A user's effective permissions are the defaults of their role plus any
//! permissions granted explicitly on the user record.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// User role with a default permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Everything, including user management.
    Admin,
    /// Everything except user management.
    Manager,
    /// Stock movements and scanning only.
    #[default]
    Staff,
}

/// A single capability checked by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageUsers,
    ManageProducts,
    ManageStock,
    ApproveMobile,
    ManageStores,
    RunSync,
    ViewReports,
}

impl Permission {
    /// Every permission, in a stable order.
    pub const ALL: [Self; 7] = [
        Self::ManageUsers,
        Self::ManageProducts,
        Self::ManageStock,
        Self::ApproveMobile,
        Self::ManageStores,
        Self::RunSync,
        Self::ViewReports,
    ];

    /// The snake_case name stored in `users.permissions`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ManageUsers => "manage_users",
            Self::ManageProducts => "manage_products",
            Self::ManageStock => "manage_stock",
            Self::ApproveMobile => "approve_mobile",
            Self::ManageStores => "manage_stores",
            Self::RunSync => "run_sync",
            Self::ViewReports => "view_reports",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("invalid permission: {s}"))
    }
}

impl Role {
    /// Permissions granted by the role alone.
    #[must_use]
    pub fn default_permissions(self) -> &'static [Permission] {
        match self {
            Self::Admin => &Permission::ALL,
            Self::Manager => &[
                Permission::ManageProducts,
                Permission::ManageStock,
                Permission::ApproveMobile,
                Permission::ManageStores,
                Permission::RunSync,
                Permission::ViewReports,
            ],
            Self::Staff => &[Permission::ManageStock],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Manager => write!(f, "manager"),
            Self::Staff => write!(f, "staff"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "staff" => Ok(Self::Staff),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Whether a user with `role` and `explicit` grants holds `permission`.
#[must_use]
pub fn has_permission(role: Role, explicit: &[Permission], permission: Permission) -> bool {
    role.default_permissions().contains(&permission) || explicit.contains(&permission)
}
