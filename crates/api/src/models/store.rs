//! Shopify store connection types.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;

use stockmirror_core::{ShopDomain, StoreId, UserId};

/// A connected Shopify store.
///
/// The access token is skipped during serialisation and redacted in `Debug`.
#[derive(Clone, Serialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub shopify_domain: ShopDomain,
    #[serde(skip)]
    pub access_token: SecretString,
    /// Location that receives pushed quantities.
    pub location_id: Option<i64>,
    pub connected: bool,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub manager_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("shopify_domain", &self.shopify_domain)
            .field("access_token", &"[REDACTED]")
            .field("location_id", &self.location_id)
            .field("connected", &self.connected)
            .field("manager_id", &self.manager_id)
            .finish_non_exhaustive()
    }
}

/// Fields for a new store.
#[derive(Debug, Clone)]
pub struct NewStore {
    pub name: String,
    pub shopify_domain: ShopDomain,
    pub access_token: SecretString,
    pub location_id: Option<i64>,
    pub manager_id: Option<UserId>,
}

/// Partial store update.
#[derive(Debug, Clone, Default)]
pub struct StoreChanges {
    pub name: Option<String>,
    pub shopify_domain: Option<ShopDomain>,
    pub access_token: Option<SecretString>,
    pub location_id: Option<i64>,
    pub manager_id: Option<UserId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store {
            id: StoreId::new(3),
            name: "Outlet".to_string(),
            shopify_domain: ShopDomain::parse("outlet").unwrap(),
            access_token: SecretString::from("shpat_0123456789abcdef"),
            location_id: Some(77),
            connected: true,
            last_connected_at: None,
            manager_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_never_serialised() {
        let json = serde_json::to_value(store()).unwrap();
        assert!(json.get("access_token").is_none());
        assert_eq!(json["shopify_domain"], "outlet.myshopify.com");
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", store());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("shpat_"));
    }
}
