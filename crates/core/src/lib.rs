//! StockMirror Core - Shared domain types.
//!
//! This crate provides the types used by every StockMirror component:
//! - `api` - JSON HTTP API and Shopify reconciliation
//! - `cli` - Migrations, user bootstrap and sync runs
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Stock arithmetic and state machine
//! rules live here so they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - IDs, SKUs, shop domains, roles, stock movements and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
