//! Product catalog endpoints.
//!
//! Reads are open to any authenticated user; writes need `manage_products`.
//! Quantities only change through the stock endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use stockmirror_core::{Permission, ProductId, Sku};

use super::{Pagination, non_empty};
use crate::db::ProductRepository;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::Page;
use crate::models::product::{NewProduct, Product, ProductChanges, ProductFilter};
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 255;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub needs_sync: Option<bool>,
    /// Only products at or below the configured low-stock threshold.
    #[serde(default)]
    pub low_stock: bool,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub product_name: String,
    pub category: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub quantity: i32,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub sku: Option<String>,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

fn parse_sku(raw: &str) -> Result<Sku, AppError> {
    Sku::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn parse_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "product_name must be 1-{MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

fn check_price(price: Decimal) -> Result<Decimal, AppError> {
    if price.is_sign_negative() {
        return Err(AppError::BadRequest("price must not be negative".to_string()));
    }
    Ok(price)
}

impl CreateProductRequest {
    fn validate(self) -> Result<NewProduct, AppError> {
        if self.quantity < 0 {
            return Err(AppError::BadRequest(
                "quantity must not be negative".to_string(),
            ));
        }
        Ok(NewProduct {
            sku: parse_sku(&self.sku)?,
            product_name: parse_name(&self.product_name)?,
            category: non_empty(self.category),
            price: check_price(self.price)?,
            quantity: self.quantity,
            description: non_empty(self.description),
            image_url: non_empty(self.image_url),
        })
    }
}

impl UpdateProductRequest {
    fn validate(self) -> Result<ProductChanges, AppError> {
        Ok(ProductChanges {
            sku: self.sku.as_deref().map(parse_sku).transpose()?,
            product_name: self.product_name.as_deref().map(parse_name).transpose()?,
            category: non_empty(self.category),
            price: self.price.map(check_price).transpose()?,
            description: non_empty(self.description),
            image_url: non_empty(self.image_url),
            is_active: self.is_active,
        })
    }
}

/// `GET /api/products`
pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ProductQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Product>>, AppError> {
    let (page, per_page) = pagination.bounds();
    let filter = ProductFilter {
        search: non_empty(query.search),
        category: non_empty(query.category),
        needs_sync: query.needs_sync,
        low_stock_threshold: query
            .low_stock
            .then_some(state.config().low_stock_threshold),
        include_inactive: query.include_inactive,
    };

    let (items, total) = ProductRepository::new(state.pool())
        .list(&filter, page, per_page)
        .await?;

    Ok(Json(Page {
        items,
        page,
        per_page,
        total,
    }))
}

/// `GET /api/products/categories`
pub async fn categories(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(ProductRepository::new(state.pool()).categories().await?))
}

/// `GET /api/products/{id}`
pub async fn show(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// `GET /api/products/sku/{sku}` (case-insensitive)
pub async fn show_by_sku(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(sku): Path<String>,
) -> Result<Json<Product>, AppError> {
    ProductRepository::new(state.pool())
        .get_by_sku(sku.trim())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product with SKU {sku}")))
}

/// `POST /api/products`
pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    current.require(Permission::ManageProducts)?;
    let new_product = req.validate()?;

    let product = ProductRepository::new(state.pool())
        .create(&new_product, Some(current.id()))
        .await?;

    info!(
        product_id = %product.id,
        sku = %product.sku,
        quantity = product.quantity,
        user_id = %current.id(),
        "Product created"
    );
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /api/products/{id}`
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<ProductId>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    current.require(Permission::ManageProducts)?;
    let changes = req.validate()?;

    let product = ProductRepository::new(state.pool())
        .update(id, &changes)
        .await?;

    info!(product_id = %id, user_id = %current.id(), "Product updated");
    Ok(Json(product))
}

/// `DELETE /api/products/{id}`: soft delete.
pub async fn deactivate(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    current.require(Permission::ManageProducts)?;
    ProductRepository::new(state.pool()).deactivate(id).await?;
    info!(product_id = %id, user_id = %current.id(), "Product deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn request(sku: &str, quantity: i32, price: &str) -> CreateProductRequest {
        CreateProductRequest {
            sku: sku.to_string(),
            product_name: " Tee ".to_string(),
            category: Some("  ".to_string()),
            price: Decimal::from_str(price).unwrap(),
            quantity,
            description: None,
            image_url: None,
        }
    }

    #[test]
    fn test_create_request_normalises_fields() {
        let product = request(" TEE-S ", 4, "19.90").validate().unwrap();
        assert_eq!(product.sku.as_str(), "TEE-S");
        assert_eq!(product.product_name, "Tee");
        assert_eq!(product.category, None);
        assert_eq!(product.quantity, 4);
    }

    #[test]
    fn test_create_request_rejections() {
        assert!(request("", 0, "1").validate().is_err());
        assert!(request("A B", 0, "1").validate().is_err());
        assert!(request("TEE", -1, "1").validate().is_err());
        assert!(request("TEE", 0, "-0.01").validate().is_err());
    }

    #[test]
    fn test_update_request_leaves_absent_fields() {
        let req: UpdateProductRequest =
            serde_json::from_str(r#"{"price": "12.50"}"#).unwrap();
        let changes = req.validate().unwrap();
        assert!(changes.sku.is_none());
        assert_eq!(changes.price, Some(Decimal::from_str("12.50").unwrap()));
    }

    #[test]
    fn test_query_flags_default_off() {
        let query: ProductQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.low_stock);
        assert!(!query.include_inactive);
    }
}
