//! Stock movements and the arithmetic that guards product quantities.
//!
//! Quantities are never negative. Every change to `products.quantity` is
//! expressed as a [`Movement`] so the same rules apply whether the change
//! comes from the stock endpoints, a scanner, a mobile approval or a pull
//! from Shopify.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why a movement could not be applied.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockError {
    /// `stock_in`/`stock_out` need a strictly positive quantity.
    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,
    /// Absolute quantities cannot be negative.
    #[error("quantity cannot be negative")]
    NegativeQuantity,
    /// Not enough units on hand for a `stock_out`.
    #[error("insufficient stock: {available} available, {requested} requested")]
    Insufficient {
        /// Units currently on hand.
        available: i32,
        /// Units requested.
        requested: i32,
    },
    /// The resulting quantity does not fit the column.
    #[error("quantity overflow")]
    Overflow,
}

/// Ledger classification of a movement, stored in `stock_logs.movement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "stock_movement", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    StockIn,
    StockOut,
    Adjust,
    SyncPull,
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StockIn => "stock_in",
            Self::StockOut => "stock_out",
            Self::Adjust => "adjust",
            Self::SyncPull => "sync_pull",
        })
    }
}

/// A requested change to a product's quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// Receive units.
    StockIn(i32),
    /// Remove units; refused when fewer are on hand.
    StockOut(i32),
    /// Set the absolute quantity (stock count).
    Adjust(i32),
    /// Set the absolute quantity to a value read from a Shopify store.
    SyncPull(i32),
}

impl Movement {
    /// Ledger kind for this movement.
    #[must_use]
    pub const fn kind(self) -> MovementKind {
        match self {
            Self::StockIn(_) => MovementKind::StockIn,
            Self::StockOut(_) => MovementKind::StockOut,
            Self::Adjust(_) => MovementKind::Adjust,
            Self::SyncPull(_) => MovementKind::SyncPull,
        }
    }

    /// The quantity carried by the movement as requested.
    #[must_use]
    pub const fn quantity(self) -> i32 {
        match self {
            Self::StockIn(n) | Self::StockOut(n) | Self::Adjust(n) | Self::SyncPull(n) => n,
        }
    }

    /// Compute the new on-hand quantity from `current`.
    ///
    /// # Errors
    ///
    /// See [`StockError`].
    pub const fn apply(self, current: i32) -> Result<i32, StockError> {
        match self {
            Self::StockIn(n) => {
                if n <= 0 {
                    return Err(StockError::NonPositiveQuantity);
                }
                match current.checked_add(n) {
                    Some(total) => Ok(total),
                    None => Err(StockError::Overflow),
                }
            }
            Self::StockOut(n) => {
                if n <= 0 {
                    return Err(StockError::NonPositiveQuantity);
                }
                if current < n {
                    return Err(StockError::Insufficient {
                        available: current,
                        requested: n,
                    });
                }
                Ok(current - n)
            }
            Self::Adjust(n) | Self::SyncPull(n) => {
                if n < 0 {
                    return Err(StockError::NegativeQuantity);
                }
                Ok(n)
            }
        }
    }
}

/// Direction of a mobile stock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "stock_direction", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    In,
    Out,
}

impl StockDirection {
    /// The movement this direction applies for `quantity` units.
    #[must_use]
    pub const fn movement(self, quantity: i32) -> Movement {
        match self {
            Self::In => Movement::StockIn(quantity),
            Self::Out => Movement::StockOut(quantity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_in_adds() {
        assert_eq!(Movement::StockIn(5).apply(10), Ok(15));
    }

    #[test]
    fn test_stock_out_reduces() {
        assert_eq!(Movement::StockOut(4).apply(10), Ok(6));
        assert_eq!(Movement::StockOut(10).apply(10), Ok(0));
    }

    #[test]
    fn test_stock_out_refuses_when_insufficient() {
        assert_eq!(
            Movement::StockOut(11).apply(10),
            Err(StockError::Insufficient {
                available: 10,
                requested: 11
            })
        );
    }

    #[test]
    fn test_in_and_out_require_positive_quantity() {
        assert_eq!(
            Movement::StockIn(0).apply(3),
            Err(StockError::NonPositiveQuantity)
        );
        assert_eq!(
            Movement::StockOut(-2).apply(3),
            Err(StockError::NonPositiveQuantity)
        );
    }

    #[test]
    fn test_adjust_sets_absolute_value() {
        assert_eq!(Movement::Adjust(0).apply(40), Ok(0));
        assert_eq!(Movement::SyncPull(12).apply(40), Ok(12));
        assert_eq!(
            Movement::Adjust(-1).apply(40),
            Err(StockError::NegativeQuantity)
        );
    }

    #[test]
    fn test_stock_in_overflow() {
        assert_eq!(
            Movement::StockIn(1).apply(i32::MAX),
            Err(StockError::Overflow)
        );
    }

    #[test]
    fn test_direction_maps_to_movement() {
        assert_eq!(StockDirection::In.movement(3), Movement::StockIn(3));
        assert_eq!(StockDirection::Out.movement(3).kind(), MovementKind::StockOut);
    }

    #[test]
    fn test_insufficient_message() {
        let err = Movement::StockOut(5).apply(2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "insufficient stock: 2 available, 5 requested"
        );
    }
}
