//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use inventory::InventoryError;

/// API-level error type that maps to HTTP responses.
///
/// Every error renders as a `{"error_kind": ..., "message": ...}` JSON
/// body; `error_kind` is a stable machine-readable string.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout execution error.
    Checkout(CheckoutError),
    /// Inventory ledger error.
    Inventory(InventoryError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Checkout(err) => (checkout_status(&err), err.kind(), err.to_string()),
            ApiError::Inventory(err) => {
                let (status, kind) = inventory_status(&err);
                (status, kind, err.to_string())
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
            }
        };

        let body = serde_json::json!({ "error_kind": kind, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
        CheckoutError::InsufficientStock { .. } => StatusCode::CONFLICT,
        CheckoutError::PaymentDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::Cancelled => StatusCode::CONFLICT,
        CheckoutError::DownstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        CheckoutError::InconsistentState { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn inventory_status(err: &InventoryError) -> (StatusCode, &'static str) {
    match err {
        InventoryError::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
        InventoryError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        InventoryError::AlreadyTerminal { .. } => (StatusCode::CONFLICT, "already_terminal"),
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}
