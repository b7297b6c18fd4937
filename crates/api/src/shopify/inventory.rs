//! SKU lookup across a store's catalog.
//!
//! The Admin REST API cannot filter products by SKU, so a lookup pages
//! through the catalog (up to `max_pages`) and matches variants
//! case-insensitively. Every page scanned is indexed into the client's SKU
//! cache, so later lookups for any SKU seen only fetch inventory levels.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use stockmirror_core::Sku;

use super::types::{InventoryLevel, RestProduct};
use super::{ShopifyClient, ShopifyError};

/// Variant identity remembered from a catalog scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CachedVariant {
    pub product_id: i64,
    pub variant_id: i64,
    pub inventory_item_id: i64,
    pub title: String,
}

/// Variants carrying one SKU, and whether the scan that found them reached
/// the end of the catalog.
#[derive(Debug, Clone)]
pub(crate) struct CachedSku {
    pub variants: Vec<CachedVariant>,
    pub complete: bool,
}

/// Available quantity at one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelQuantity {
    pub location_id: i64,
    pub available: i64,
}

/// One matching variant with its stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantInventory {
    pub product_id: i64,
    pub variant_id: i64,
    pub inventory_item_id: i64,
    /// "Product / Variant" title.
    pub title: String,
    pub levels: Vec<LevelQuantity>,
    /// Sum over `levels`.
    pub available: i64,
}

/// Result of looking a SKU up in one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkuInventory {
    pub sku: String,
    /// At least one variant matched.
    pub found: bool,
    /// The catalog was scanned to the end (or the cached entry came from
    /// such a scan). `found = false, complete = false` means "not seen
    /// within the page cap", not "absent".
    pub complete: bool,
    /// Catalog pages fetched for this lookup; 0 on a cache hit.
    pub pages_scanned: u32,
    /// Sum of `available` over every variant and location.
    pub total_available: i64,
    /// Matching variants in catalog order.
    pub variants: Vec<VariantInventory>,
}

impl SkuInventory {
    /// The variant that receives pushed quantities: the first match.
    #[must_use]
    pub fn canonical_variant(&self) -> Option<&VariantInventory> {
        self.variants.first()
    }
}

/// Add every SKU-bearing variant of `products` to `index`, keyed by the
/// lowercase SKU.
pub(crate) fn index_page(index: &mut HashMap<String, Vec<CachedVariant>>, products: &[RestProduct]) {
    for product in products {
        for variant in &product.variants {
            let Some(key) = variant
                .sku
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase)
            else {
                continue;
            };
            let title = if variant.title.is_empty() || variant.title == "Default Title" {
                product.title.clone()
            } else {
                format!("{} / {}", product.title, variant.title)
            };
            index.entry(key).or_default().push(CachedVariant {
                product_id: product.id,
                variant_id: variant.id,
                inventory_item_id: variant.inventory_item_id,
                title,
            });
        }
    }
}

/// Combine variants with their levels into the lookup result.
pub(crate) fn assemble(
    sku: &Sku,
    variants: &[CachedVariant],
    levels: &[InventoryLevel],
    complete: bool,
    pages_scanned: u32,
) -> SkuInventory {
    let variants: Vec<VariantInventory> = variants
        .iter()
        .map(|v| {
            let levels: Vec<LevelQuantity> = levels
                .iter()
                .filter(|l| l.inventory_item_id == v.inventory_item_id)
                .map(|l| LevelQuantity {
                    location_id: l.location_id,
                    available: l.available.unwrap_or(0),
                })
                .collect();
            let available = levels.iter().map(|l| l.available).sum();
            VariantInventory {
                product_id: v.product_id,
                variant_id: v.variant_id,
                inventory_item_id: v.inventory_item_id,
                title: v.title.clone(),
                levels,
                available,
            }
        })
        .collect();

    SkuInventory {
        sku: sku.as_str().to_string(),
        found: !variants.is_empty(),
        complete,
        pages_scanned,
        total_available: variants.iter().map(|v| v.available).sum(),
        variants,
    }
}

impl ShopifyClient {
    /// Look a SKU up and report its stock at every location.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError` if any catalog page or inventory request fails
    /// after retries. A partial scan is never reported as "not found".
    #[instrument(skip(self), fields(shop = %self.inner.domain, sku = %sku))]
    pub async fn find_sku(&self, sku: &Sku) -> Result<SkuInventory, ShopifyError> {
        let key = sku.key();

        let (variants, complete, pages_scanned) =
            if let Some(hit) = self.inner.sku_cache.get(&key).await {
                debug!("SKU cache hit");
                (hit.variants.clone(), hit.complete, 0)
            } else {
                self.scan_catalog(&key).await?
            };

        if variants.is_empty() {
            return Ok(assemble(sku, &[], &[], complete, pages_scanned));
        }

        let item_ids: Vec<i64> = variants.iter().map(|v| v.inventory_item_id).collect();
        let levels = self.inventory_levels(&item_ids).await?;
        Ok(assemble(sku, &variants, &levels, complete, pages_scanned))
    }

    /// Current available quantity of one item at one location.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError` if the request fails.
    pub async fn available_at(
        &self,
        inventory_item_id: i64,
        location_id: i64,
    ) -> Result<Option<i64>, ShopifyError> {
        let levels = self.inventory_levels(&[inventory_item_id]).await?;
        Ok(levels
            .iter()
            .find(|l| l.location_id == location_id)
            .and_then(|l| l.available))
    }

    /// Page through the catalog, cache every SKU seen and return the
    /// variants for `wanted`.
    async fn scan_catalog(
        &self,
        wanted: &str,
    ) -> Result<(Vec<CachedVariant>, bool, u32), ShopifyError> {
        let mut index: HashMap<String, Vec<CachedVariant>> = HashMap::new();
        let mut cursor: Option<String> = None;
        let mut pages: u32 = 0;

        let complete = loop {
            let (products, next) = self.products_page(cursor.as_deref()).await?;
            pages += 1;
            index_page(&mut index, &products);

            match next {
                None => break true,
                Some(_) if pages >= self.inner.max_pages => break false,
                Some(next) => cursor = Some(next),
            }
        };

        info!(
            pages,
            complete,
            skus_indexed = index.len(),
            "Catalog scan finished"
        );

        // Misses are cached too, keeping the complete flag of this scan.
        let found = index.entry(wanted.to_string()).or_default().clone();
        for (key, variants) in index {
            self.inner
                .sku_cache
                .insert(key, Arc::new(CachedSku { variants, complete }))
                .await;
        }

        Ok((found, complete, pages))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shopify::types::RestVariant;

    fn product(id: i64, title: &str, variants: &[(i64, &str, Option<&str>, i64)]) -> RestProduct {
        RestProduct {
            id,
            title: title.to_string(),
            variants: variants
                .iter()
                .map(|(vid, vtitle, sku, item)| RestVariant {
                    id: *vid,
                    title: (*vtitle).to_string(),
                    sku: sku.map(ToString::to_string),
                    inventory_item_id: *item,
                })
                .collect(),
        }
    }

    fn level(item: i64, location: i64, available: Option<i64>) -> InventoryLevel {
        InventoryLevel {
            inventory_item_id: item,
            location_id: location,
            available,
        }
    }

    #[test]
    fn test_index_page_keys_by_lowercase_sku() {
        let mut index = HashMap::new();
        index_page(
            &mut index,
            &[
                product(1, "Tee", &[(11, "S", Some(" TEE-S "), 111), (12, "M", None, 112)]),
                product(2, "Mug", &[(21, "Default Title", Some("mug-1"), 211)]),
            ],
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index["tee-s"][0].title, "Tee / S");
        assert_eq!(index["mug-1"][0].title, "Mug");
    }

    #[test]
    fn test_index_page_keeps_duplicate_skus_in_order() {
        let mut index = HashMap::new();
        index_page(&mut index, &[product(1, "A", &[(11, "", Some("DUP"), 111)])]);
        index_page(&mut index, &[product(2, "B", &[(21, "", Some("dup"), 211)])]);
        let ids: Vec<i64> = index["dup"].iter().map(|v| v.variant_id).collect();
        assert_eq!(ids, vec![11, 21]);
    }

    #[test]
    fn test_assemble_sums_across_locations() {
        let sku = Sku::parse("TEE-S").unwrap();
        let variants = vec![
            CachedVariant {
                product_id: 1,
                variant_id: 11,
                inventory_item_id: 111,
                title: "Tee / S".to_string(),
            },
            CachedVariant {
                product_id: 2,
                variant_id: 21,
                inventory_item_id: 211,
                title: "Tee copy".to_string(),
            },
        ];
        let levels = vec![
            level(111, 9, Some(3)),
            level(111, 10, Some(4)),
            level(211, 9, None),
            level(999, 9, Some(50)),
        ];

        let result = assemble(&sku, &variants, &levels, true, 2);
        assert!(result.found);
        assert!(result.complete);
        assert_eq!(result.total_available, 7);
        assert_eq!(result.variants[0].available, 7);
        assert_eq!(result.variants[1].available, 0);
        assert_eq!(result.canonical_variant().unwrap().variant_id, 11);
    }

    /// Serves a two-page catalog (AAA then BBB) with stock 3 and 4.
    async fn fake_shop() -> String {
        use axum::extract::Query;
        use axum::http::header::LINK;
        use axum::response::IntoResponse;
        use axum::routing::get;
        use axum::{Json, Router};
        use serde_json::json;

        async fn products(Query(query): Query<HashMap<String, String>>) -> axum::response::Response {
            if query.get("page_info").map(String::as_str) == Some("p2") {
                Json(json!({"products": [
                    {"id": 2, "title": "Bag", "variants": [
                        {"id": 21, "title": "Default Title", "sku": "BBB", "inventory_item_id": 2}
                    ]}
                ]}))
                .into_response()
            } else {
                (
                    [(LINK, "<http://fake/products.json?limit=1&page_info=p2>; rel=\"next\"")],
                    Json(json!({"products": [
                        {"id": 1, "title": "Apron", "variants": [
                            {"id": 11, "title": "Default Title", "sku": "AAA", "inventory_item_id": 1}
                        ]}
                    ]})),
                )
                    .into_response()
            }
        }

        async fn levels() -> Json<serde_json::Value> {
            Json(json!({"inventory_levels": [
                {"inventory_item_id": 1, "location_id": 9, "available": 3},
                {"inventory_item_id": 2, "location_id": 9, "available": 4}
            ]}))
        }

        let app = Router::new()
            .route("/admin/api/2025-01/products.json", get(products))
            .route("/admin/api/2025-01/inventory_levels.json", get(levels));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}/admin/api/2025-01")
    }

    fn client(base_url: String, max_pages: u32) -> ShopifyClient {
        let config = crate::config::ShopifyConfig {
            api_version: "2025-01".to_string(),
            requests_per_second: 1000,
            max_retries: 0,
            page_size: 1,
            max_pages,
            ..crate::config::ShopifyConfig::default()
        };
        ShopifyClient::with_base_url(
            reqwest::Client::new(),
            base_url,
            stockmirror_core::ShopDomain::parse("fake.myshopify.com").unwrap(),
            secrecy::SecretString::from("token"),
            &config,
        )
    }

    #[tokio::test]
    async fn test_capped_scan_reports_incomplete_and_caches_what_it_saw() {
        let capped = client(fake_shop().await, 1);

        let miss = capped.find_sku(&Sku::parse("BBB").unwrap()).await.unwrap();
        assert!(!miss.found);
        assert!(!miss.complete);
        assert_eq!(miss.pages_scanned, 1);

        let hit = capped.find_sku(&Sku::parse("AAA").unwrap()).await.unwrap();
        assert!(hit.found);
        assert!(!hit.complete);
        assert_eq!(hit.pages_scanned, 0);
        assert_eq!(hit.total_available, 3);
    }

    #[tokio::test]
    async fn test_full_scan_caches_misses_and_every_sku_seen() {
        let full = client(fake_shop().await, 5);

        let miss = full.find_sku(&Sku::parse("ZZZ").unwrap()).await.unwrap();
        assert!(!miss.found);
        assert!(miss.complete);
        assert_eq!(miss.pages_scanned, 2);

        let again = full.find_sku(&Sku::parse("ZZZ").unwrap()).await.unwrap();
        assert!(again.complete);
        assert_eq!(again.pages_scanned, 0);

        let hit = full.find_sku(&Sku::parse("BbB").unwrap()).await.unwrap();
        assert!(hit.found);
        assert!(hit.complete);
        assert_eq!(hit.pages_scanned, 0);
        assert_eq!(hit.total_available, 4);
    }

    #[test]
    fn test_assemble_not_found() {
        let sku = Sku::parse("NOPE").unwrap();
        let result = assemble(&sku, &[], &[], false, 40);
        assert!(!result.found);
        assert!(!result.complete);
        assert_eq!(result.pages_scanned, 40);
        assert!(result.canonical_variant().is_none());
    }
}
