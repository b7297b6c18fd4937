//! Stock movements and the ledger (`manage_stock`).

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use sqlx::PgPool;

use stockmirror_core::{Movement, MovementKind, Permission, ProductId, UserId};

use super::{Pagination, non_empty};
use crate::db::stock::MovementOutcome;
use crate::db::{ProductRepository, StockRepository};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::Page;
use crate::models::product::Product;
use crate::models::stock::{StockLogEntry, StockLogFilter};
use crate::state::AppState;

/// A product named by ID or SKU; the ID wins when both are given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductRef {
    pub product_id: Option<ProductId>,
    pub sku: Option<String>,
}

impl ProductRef {
    /// Load the active product this reference names.
    ///
    /// # Errors
    ///
    /// `BadRequest` when neither field is set, `NotFound` when no active
    /// product matches.
    pub async fn resolve(&self, pool: &PgPool) -> Result<Product, AppError> {
        let products = ProductRepository::new(pool);
        let product = match (self.product_id, non_empty(self.sku.clone())) {
            (Some(id), _) => products.get_by_id(id).await?,
            (None, Some(sku)) => products.get_by_sku(&sku).await?,
            (None, None) => {
                return Err(AppError::BadRequest(
                    "product_id or sku is required".to_string(),
                ));
            }
        };
        product
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("product".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    #[serde(flatten)]
    pub product: ProductRef,
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub product_id: Option<ProductId>,
    pub movement: Option<MovementKind>,
    pub user_id: Option<UserId>,
}

async fn apply(
    state: &AppState,
    current: &CurrentUser,
    req: MovementRequest,
    movement: fn(i32) -> Movement,
) -> Result<Json<MovementOutcome>, AppError> {
    current.require(Permission::ManageStock)?;
    let product = req.product.resolve(state.pool()).await?;
    let movement = movement(req.quantity);
    let notes = non_empty(req.notes);

    let outcome = StockRepository::new(state.pool())
        .apply(product.id, movement, notes.as_deref(), Some(current.id()))
        .await?;
    Ok(Json(outcome))
}

/// `POST /api/stock/in`
pub async fn stock_in(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<MovementRequest>,
) -> Result<Json<MovementOutcome>, AppError> {
    apply(&state, &current, req, Movement::StockIn).await
}

/// `POST /api/stock/out`: 409 with `available`/`requested` when short.
pub async fn stock_out(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<MovementRequest>,
) -> Result<Json<MovementOutcome>, AppError> {
    apply(&state, &current, req, Movement::StockOut).await
}

/// `POST /api/stock/adjust`: sets the absolute quantity.
pub async fn adjust(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<MovementRequest>,
) -> Result<Json<MovementOutcome>, AppError> {
    apply(&state, &current, req, Movement::Adjust).await
}

/// `GET /api/stock/logs`
pub async fn logs(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<LogQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<StockLogEntry>>, AppError> {
    current.require(Permission::ManageStock)?;
    let (page, per_page) = pagination.bounds();
    let filter = StockLogFilter {
        product_id: query.product_id,
        movement: query.movement,
        user_id: query.user_id,
    };

    let (items, total) = StockRepository::new(state.pool())
        .list_logs(filter, page, per_page)
        .await?;

    Ok(Json(Page {
        items,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_request_accepts_id_or_sku() {
        let req: MovementRequest =
            serde_json::from_str(r#"{"product_id": 4, "quantity": 2}"#).unwrap();
        assert_eq!(req.product.product_id, Some(ProductId::new(4)));

        let req: MovementRequest =
            serde_json::from_str(r#"{"sku": "TEE-S", "quantity": 1, "notes": "recount"}"#)
                .unwrap();
        assert_eq!(req.product.sku.as_deref(), Some("TEE-S"));
        assert_eq!(req.notes.as_deref(), Some("recount"));
    }

    #[test]
    fn test_log_query_parses_movement_kind() {
        let query: LogQuery = serde_json::from_str(r#"{"movement": "stock_out"}"#).unwrap();
        assert_eq!(query.movement, Some(MovementKind::StockOut));
    }
}
