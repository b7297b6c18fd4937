//! Mobile app workflow: stock requests awaiting approval and the activity
//! feed.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;

use stockmirror_core::{
    MobileTransactionId, Permission, StockDirection, TransactionStatus, UserId,
};

use super::stock::ProductRef;
use super::{Pagination, non_empty};
use crate::db::MobileRepository;
use crate::db::mobile::Review;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::Page;
use crate::models::mobile::{MobileActivity, MobileTransaction};
use crate::state::AppState;

const MAX_ACTIVITY_LENGTH: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub sku: String,
    pub direction: StockDirection,
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub activity: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Whose rows a listing may show: approvers choose (or see everyone),
/// everyone else sees only their own.
fn visible_user(current: &CurrentUser, requested: Option<UserId>) -> Option<UserId> {
    if current.can(Permission::ApproveMobile) {
        requested
    } else {
        Some(current.id())
    }
}

/// `POST /api/mobile/transactions`
pub async fn create_transaction(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<MobileTransaction>), AppError> {
    current.require(Permission::ManageStock)?;
    if req.quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be positive".to_string()));
    }

    let product = ProductRef {
        product_id: None,
        sku: Some(req.sku),
    }
    .resolve(state.pool())
    .await?;

    let notes = non_empty(req.notes);
    let transaction = MobileRepository::new(state.pool())
        .create_transaction(
            product.id,
            req.direction,
            req.quantity,
            notes.as_deref(),
            current.id(),
        )
        .await?;

    info!(
        transaction_id = %transaction.id,
        product_id = %product.id,
        user_id = %current.id(),
        "Mobile transaction requested"
    );
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// `GET /api/mobile/transactions`
pub async fn list_transactions(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<TransactionQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<MobileTransaction>>, AppError> {
    let (page, per_page) = pagination.bounds();
    let (items, total) = MobileRepository::new(state.pool())
        .list_transactions(query.status, visible_user(&current, None), page, per_page)
        .await?;

    Ok(Json(Page {
        items,
        page,
        per_page,
        total,
    }))
}

/// A bodyless review is the same as one without notes.
fn review_body(body: Option<Json<ReviewRequest>>) -> ReviewRequest {
    body.map(|Json(req)| req).unwrap_or_default()
}

async fn review(
    state: &AppState,
    current: &CurrentUser,
    id: MobileTransactionId,
    decision: TransactionStatus,
    req: ReviewRequest,
) -> Result<Json<Review>, AppError> {
    current.require(Permission::ApproveMobile)?;
    let notes = non_empty(req.notes);
    let review = MobileRepository::new(state.pool())
        .review(id, decision, current.id(), notes.as_deref())
        .await?;
    Ok(Json(review))
}

/// `POST /api/mobile/transactions/{id}/approve`: applies the movement in
/// the same database transaction; 409 when stock is short.
pub async fn approve(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<MobileTransactionId>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<Review>, AppError> {
    review(&state, &current, id, TransactionStatus::Approved, review_body(body)).await
}

/// `POST /api/mobile/transactions/{id}/reject`
pub async fn reject(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<MobileTransactionId>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<Review>, AppError> {
    review(&state, &current, id, TransactionStatus::Rejected, review_body(body)).await
}

/// `GET /api/mobile/activities`
pub async fn list_activities(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ActivityQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<MobileActivity>>, AppError> {
    let (page, per_page) = pagination.bounds();
    let (items, total) = MobileRepository::new(state.pool())
        .list_activities(visible_user(&current, query.user_id), page, per_page)
        .await?;

    Ok(Json(Page {
        items,
        page,
        per_page,
        total,
    }))
}

/// `POST /api/mobile/activities`
pub async fn record_activity(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<ActivityRequest>,
) -> Result<(StatusCode, Json<MobileActivity>), AppError> {
    let activity = req.activity.trim();
    if activity.is_empty() || activity.len() > MAX_ACTIVITY_LENGTH {
        return Err(AppError::BadRequest(format!(
            "activity must be 1-{MAX_ACTIVITY_LENGTH} characters"
        )));
    }
    let details = req
        .details
        .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

    let recorded = MobileRepository::new(state.pool())
        .record_activity(current.id(), activity, &details)
        .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use stockmirror_core::Role;

    use super::*;
    use crate::models::user::User;

    fn current(role: Role) -> CurrentUser {
        CurrentUser(User {
            id: UserId::new(3),
            username: "kai".to_string(),
            email: None,
            role,
            permissions: vec![],
            is_active: true,
            created_by: None,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn test_staff_only_see_their_own_rows() {
        let staff = current(Role::Staff);
        assert_eq!(visible_user(&staff, None), Some(UserId::new(3)));
        assert_eq!(visible_user(&staff, Some(UserId::new(9))), Some(UserId::new(3)));
    }

    #[test]
    fn test_approvers_choose() {
        let manager = current(Role::Manager);
        assert_eq!(visible_user(&manager, None), None);
        assert_eq!(
            visible_user(&manager, Some(UserId::new(9))),
            Some(UserId::new(9))
        );
    }

    #[test]
    fn test_review_body_may_be_empty_object() {
        let req: ReviewRequest = serde_json::from_str("{}").unwrap();
        assert!(req.notes.is_none());
    }

    #[tokio::test]
    async fn test_review_accepts_a_missing_body() {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::Request;

        let bare = Request::post("/api/mobile/transactions/1/approve")
            .body(Body::empty())
            .unwrap();
        let body = Option::<Json<ReviewRequest>>::from_request(bare, &())
            .await
            .unwrap();
        assert!(body.is_none());
        assert!(review_body(body).notes.is_none());

        let noted = Request::post("/api/mobile/transactions/1/approve")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"notes":"counted twice"}"#))
            .unwrap();
        let body = Option::<Json<ReviewRequest>>::from_request(noted, &())
            .await
            .unwrap();
        assert_eq!(review_body(body).notes.as_deref(), Some("counted twice"));
    }
}
