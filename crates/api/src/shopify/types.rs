//! REST payloads used by the client.
//!
//! Only the fields the inventory mirror reads are declared; Shopify sends
//! many more and serde ignores them.

use serde::{Deserialize, Serialize};

/// `GET shop.json`
#[derive(Debug, Deserialize)]
pub(crate) struct ShopEnvelope {
    pub shop: Shop,
}

/// Store metadata returned by `shop.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub myshopify_domain: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// `GET locations.json`
#[derive(Debug, Deserialize)]
pub(crate) struct LocationsEnvelope {
    pub locations: Vec<Location>,
}

/// A stock location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

const fn default_true() -> bool {
    true
}

/// `GET products.json`
#[derive(Debug, Deserialize)]
pub(crate) struct ProductsEnvelope {
    pub products: Vec<RestProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RestProduct {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub variants: Vec<RestVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RestVariant {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub inventory_item_id: i64,
}

/// `GET inventory_levels.json`
#[derive(Debug, Deserialize)]
pub(crate) struct InventoryLevelsEnvelope {
    pub inventory_levels: Vec<InventoryLevel>,
}

/// `POST inventory_levels/set.json`
#[derive(Debug, Deserialize)]
pub(crate) struct InventoryLevelEnvelope {
    pub inventory_level: InventoryLevel,
}

/// Quantity of one inventory item at one location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub inventory_item_id: i64,
    pub location_id: i64,
    /// `null` when the item is not tracked at the location.
    #[serde(default)]
    pub available: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetInventoryLevel {
    pub location_id: i64,
    pub inventory_item_id: i64,
    pub available: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_products_page_parses_with_missing_fields() {
        let json = r#"{"products":[{"id":1,"title":"Tee","variants":[
            {"id":11,"title":"S","sku":"TEE-S","inventory_item_id":111},
            {"id":12,"title":"M","sku":null,"inventory_item_id":112}
        ]},{"id":2}]}"#;
        let page: ProductsEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(page.products.len(), 2);
        assert_eq!(page.products[0].variants[0].sku.as_deref(), Some("TEE-S"));
        assert!(page.products[0].variants[1].sku.is_none());
        assert!(page.products[1].variants.is_empty());
    }

    #[test]
    fn test_inventory_level_null_available() {
        let json = r#"{"inventory_levels":[
            {"inventory_item_id":111,"location_id":9,"available":null},
            {"inventory_item_id":111,"location_id":10,"available":4}
        ]}"#;
        let levels: InventoryLevelsEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(levels.inventory_levels[0].available, None);
        assert_eq!(levels.inventory_levels[1].available, Some(4));
    }

    #[test]
    fn test_location_defaults_active() {
        let location: Location = serde_json::from_str(r#"{"id":5,"name":"Main"}"#).unwrap();
        assert!(location.active);
    }
}
