//! StockMirror API library.
//!
//! JSON HTTP API over a Postgres inventory that mirrors stock levels to
//! one or more Shopify stores. Exposed as a library so the CLI and the
//! integration tests can reuse repositories and reconciliation.
//!
//! # Layout
//!
//! - [`db`] - Repositories (parameterised SQL, transactional stock changes)
//! - [`shopify`] - Paced, retrying Admin REST client per store
//! - [`services`] - Password/JWT auth and reconciliation
//! - [`routes`] / [`middleware`] - axum handlers and extractors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
