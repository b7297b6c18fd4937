//! Barcode scanning (`manage_stock`).
//!
//! A barcode is resolved as a SKU. Every scan is logged, including scans of
//! unknown barcodes and scans whose movement is refused.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockmirror_core::{Movement, Permission, ScanAction, UserId};

use super::Pagination;
use crate::db::scans::NewScan;
use crate::db::{ProductRepository, ScanRepository, StockRepository};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::Page;
use crate::models::product::Product;
use crate::models::scan::ScanLog;
use crate::models::stock::StockLog;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub barcode: String,
    pub action: ScanAction,
    /// Units for `stock_in`/`stock_out`; defaults to 1.
    pub quantity: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub scan: ScanLog,
    pub product: Product,
    /// Ledger row when the scan moved stock.
    pub movement: Option<StockLog>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanLogQuery {
    pub user_id: Option<UserId>,
}

const fn scan_movement(action: ScanAction, quantity: i32) -> Option<Movement> {
    match action {
        ScanAction::Lookup => None,
        ScanAction::StockIn => Some(Movement::StockIn(quantity)),
        ScanAction::StockOut => Some(Movement::StockOut(quantity)),
    }
}

/// `POST /api/scan`
pub async fn scan(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, AppError> {
    current.require(Permission::ManageStock)?;
    let barcode = req.barcode.trim();
    if barcode.is_empty() {
        return Err(AppError::BadRequest("barcode is required".to_string()));
    }

    let scans = ScanRepository::new(state.pool());
    let movement = scan_movement(req.action, req.quantity.unwrap_or(1));

    let product = ProductRepository::new(state.pool())
        .get_by_sku(barcode)
        .await?
        .filter(|p| p.is_active);

    let Some(product) = product else {
        scans
            .record(&NewScan {
                barcode,
                product_id: None,
                action: req.action,
                quantity: movement.map(Movement::quantity),
                found: false,
                user_id: Some(current.id()),
            })
            .await?;
        warn!(barcode, user_id = %current.id(), "Unknown barcode scanned");
        return Err(AppError::NotFound(format!("no product for barcode {barcode}")));
    };

    let applied = match movement {
        Some(movement) => Some(
            StockRepository::new(state.pool())
                .apply(product.id, movement, Some("scan"), Some(current.id()))
                .await,
        ),
        None => None,
    };

    let scan = scans
        .record(&NewScan {
            barcode,
            product_id: Some(product.id),
            action: req.action,
            quantity: movement.map(Movement::quantity),
            found: true,
            user_id: Some(current.id()),
        })
        .await?;

    let (product, movement) = match applied {
        Some(result) => {
            let outcome = result?;
            (outcome.product, Some(outcome.log))
        }
        None => (product, None),
    };

    info!(
        barcode,
        action = ?req.action,
        product_id = %product.id,
        user_id = %current.id(),
        "Barcode scanned"
    );
    Ok(Json(ScanResponse {
        scan,
        product,
        movement,
    }))
}

/// `GET /api/scan/logs`
pub async fn logs(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ScanLogQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<ScanLog>>, AppError> {
    current.require(Permission::ManageStock)?;
    let (page, per_page) = pagination.bounds();
    let (items, total) = ScanRepository::new(state.pool())
        .list(query.user_id, page, per_page)
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
    fn test_scan_movement() {
        assert_eq!(scan_movement(ScanAction::Lookup, 3), None);
        assert_eq!(
            scan_movement(ScanAction::StockIn, 1),
            Some(Movement::StockIn(1))
        );
        assert_eq!(
            scan_movement(ScanAction::StockOut, 2),
            Some(Movement::StockOut(2))
        );
    }

    #[test]
    fn test_scan_request_quantity_optional() {
        let req: ScanRequest =
            serde_json::from_str(r#"{"barcode": "TEE-S", "action": "stock_out"}"#).unwrap();
        assert_eq!(req.action, ScanAction::StockOut);
        assert_eq!(req.quantity, None);
    }
}
