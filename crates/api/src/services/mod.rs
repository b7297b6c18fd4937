//! Business logic that spans repositories and the Shopify client.

pub mod auth;
pub mod reconcile;
