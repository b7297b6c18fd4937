//! Domain types returned by repositories and serialised by handlers.

pub mod mobile;
pub mod product;
pub mod scan;
pub mod stock;
pub mod store;
pub mod sync;
pub mod user;

use serde::Serialize;

/// One page of a listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}
