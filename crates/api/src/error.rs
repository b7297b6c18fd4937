//! Unified error handling for the API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use stockmirror_core::{InvalidTransition, StockError};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::db::mobile::ReviewError;
use crate::db::stock::MovementError;
use crate::services::auth::AuthError;
use crate::services::reconcile::ReconcileError;
use crate::shopify::ShopifyError;

/// Application-level error type for API handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Shopify API operation failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    /// A stock movement was refused.
    #[error("{0}")]
    Stock(#[from] StockError),

    /// A mobile transaction was already reviewed.
    #[error("{0}")]
    Transition(#[from] InvalidTransition),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with existing state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_))
            | Self::Conflict(_)
            | Self::Transition(_)
            | Self::Stock(StockError::Insufficient { .. }) => StatusCode::CONFLICT,
            Self::Stock(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Shopify(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::InvalidCredentials => {
                Self::Unauthorized(err.to_string())
            }
            AuthError::WeakPassword(_) => Self::BadRequest(err.to_string()),
            AuthError::Hash(_) | AuthError::Signing(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<MovementError> for AppError {
    fn from(err: MovementError) -> Self {
        match err {
            MovementError::Repository(e) => Self::Database(e),
            MovementError::Stock(e) => Self::Stock(e),
        }
    }
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::Movement(e) => e.into(),
            ReviewError::Transition(e) => Self::Transition(e),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Repository(e) => Self::Database(e),
            ReconcileError::Shopify(e) => Self::Shopify(e),
            ReconcileError::Movement(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        let mut body = json!({ "error": self.client_message() });
        if let Self::Stock(StockError::Insufficient {
            available,
            requested,
        }) = &self
        {
            body["available"] = json!(available);
            body["requested"] = json!(requested);
        }

        (status, Json(body)).into_response()
    }
}

impl AppError {
    // Don't expose internal error details to clients
    fn client_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => format!("Conflict: {msg}"),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Shopify(ShopifyError::Unauthorized) => {
                "Shopify rejected the store's access token".to_string()
            }
            Self::Shopify(_) => "External service error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Set the Sentry user context for the authenticated user.
pub fn set_sentry_user(user_id: i32, username: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 12".to_string());
        assert_eq!(err.to_string(), "Not found: product 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_by_kind() {
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict(
                "sku".to_string()
            ))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::DataCorruption(
                "bad role".to_string()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_stock_errors() {
        assert_eq!(
            get_status(AppError::Stock(StockError::Insufficient {
                available: 1,
                requested: 3
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Stock(StockError::NonPositiveQuantity)),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_layer_errors_keep_their_status() {
        let err: AppError = MovementError::Stock(StockError::Insufficient {
            available: 0,
            requested: 1,
        })
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: AppError = ReviewError::Transition(InvalidTransition {
            from: stockmirror_core::TransactionStatus::Approved,
            to: stockmirror_core::TransactionStatus::Rejected,
        })
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: AppError = ReconcileError::Repository(RepositoryError::NotFound).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_shopify_errors_are_bad_gateway() {
        assert_eq!(
            get_status(AppError::Shopify(ShopifyError::Unauthorized)),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption("role=root".to_string()));
        assert_eq!(err.client_message(), "Internal server error");
        let err = AppError::Internal("pool exhausted".to_string());
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[tokio::test]
    async fn test_insufficient_stock_body() {
        let response = AppError::Stock(StockError::Insufficient {
            available: 2,
            requested: 5,
        })
        .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["available"], 2);
        assert_eq!(body["requested"], 5);
        assert!(body["error"].as_str().is_some_and(|s| s.contains("insufficient")));
    }
}
