//! Status enums for ledgers and workflows.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Mobile transaction approval status.
///
/// ```text
/// pending -> approved
/// pending -> rejected
/// ```
///
/// Approved and rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "mobile_transaction_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Attempted a transition the state machine does not allow.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot move transaction from {from} to {to}")]
pub struct InvalidTransition {
    /// Current status.
    pub from: TransactionStatus,
    /// Requested status.
    pub to: TransactionStatus,
}

impl TransactionStatus {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Validate a transition and return the new status.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] unless moving from `Pending` to
    /// `Approved` or `Rejected`.
    pub const fn transition(self, to: Self) -> Result<Self, InvalidTransition> {
        match (self, to) {
            (Self::Pending, Self::Approved | Self::Rejected) => Ok(to),
            _ => Err(InvalidTransition { from: self, to }),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        })
    }
}

/// What a barcode scan was used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "scan_action", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ScanAction {
    Lookup,
    StockIn,
    StockOut,
}

/// Direction of a sync operation against a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sync_direction", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Local quantity written to Shopify.
    Push,
    /// Shopify quantity written locally.
    Pull,
    /// Read-only comparison.
    Compare,
}

/// Outcome of reconciling one product against one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sync_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Store already matched the local quantity.
    InSync,
    /// Store was written and the write read back correctly.
    Updated,
    /// Quantities differ (compare), or a write did not read back (push).
    Mismatch,
    /// The full catalog was scanned and the SKU is absent.
    NotFound,
    /// The page cap was reached before the SKU was found.
    Incomplete,
    /// The store could not be reached or rejected the request.
    Failed,
}

impl SyncStatus {
    /// Whether the store now mirrors the local quantity.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::InSync | Self::Updated)
    }

    /// Compare a local quantity with what a store reports.
    #[must_use]
    pub const fn from_quantities(local: i64, remote: i64) -> Self {
        if local == remote {
            Self::InSync
        } else {
            Self::Mismatch
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InSync => "in_sync",
            Self::Updated => "updated",
            Self::Mismatch => "mismatch",
            Self::NotFound => "not_found",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_can_be_approved_or_rejected() {
        assert_eq!(
            TransactionStatus::Pending.transition(TransactionStatus::Approved),
            Ok(TransactionStatus::Approved)
        );
        assert_eq!(
            TransactionStatus::Pending.transition(TransactionStatus::Rejected),
            Ok(TransactionStatus::Rejected)
        );
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        for from in [TransactionStatus::Approved, TransactionStatus::Rejected] {
            assert!(from.is_terminal());
            for to in [
                TransactionStatus::Pending,
                TransactionStatus::Approved,
                TransactionStatus::Rejected,
            ] {
                assert_eq!(from.transition(to), Err(InvalidTransition { from, to }));
            }
        }
    }

    #[test]
    fn test_pending_to_pending_is_invalid() {
        assert!(
            TransactionStatus::Pending
                .transition(TransactionStatus::Pending)
                .is_err()
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = TransactionStatus::Rejected
            .transition(TransactionStatus::Approved)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot move transaction from rejected to approved"
        );
    }

    #[test]
    fn test_sync_status_from_quantities() {
        assert_eq!(SyncStatus::from_quantities(4, 4), SyncStatus::InSync);
        assert_eq!(SyncStatus::from_quantities(4, 5), SyncStatus::Mismatch);
    }

    #[test]
    fn test_settled_statuses() {
        assert!(SyncStatus::InSync.is_settled());
        assert!(SyncStatus::Updated.is_settled());
        assert!(!SyncStatus::Mismatch.is_settled());
        assert!(!SyncStatus::Incomplete.is_settled());
    }
}
