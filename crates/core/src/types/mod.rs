//! Core types for StockMirror.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod role;
pub mod shop_domain;
pub mod sku;
pub mod status;
pub mod stock;

pub use email::{Email, EmailError};
pub use id::*;
pub use role::{Permission, Role, has_permission};
pub use shop_domain::{ShopDomain, ShopDomainError};
pub use sku::{Sku, SkuError};
pub use status::{InvalidTransition, ScanAction, SyncDirection, SyncStatus, TransactionStatus};
pub use stock::{Movement, MovementKind, StockDirection, StockError};
