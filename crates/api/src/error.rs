//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CatalogError, CheckoutError, StoreError};
use domain::{CartError, DomainError, SessionError};
use inventory::InventoryError;

/// API-level error type that maps to HTTP responses.
///
/// Every response body is `{"error": message, "code": code}`.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Resource not found.
    NotFound(String),
    /// Cart or checkout error.
    Checkout(CheckoutError),
}

impl ApiError {
    /// Status code and taxonomy code for this error.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Checkout(err) => checkout_status(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        let message = match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg,
            ApiError::Checkout(err) => err.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(%status, code, error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_status(err: &CheckoutError) -> (StatusCode, &'static str) {
    match err {
        CheckoutError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        CheckoutError::OutOfStock { .. } => (StatusCode::CONFLICT, "out_of_stock"),
        CheckoutError::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
        CheckoutError::ProductUnavailable { .. } => (StatusCode::CONFLICT, "product_unavailable"),
        CheckoutError::UnknownCoupon(_) => (StatusCode::NOT_FOUND, "unknown_coupon"),
        CheckoutError::CartNotFound(_) => (StatusCode::NOT_FOUND, "cart_not_found"),
        CheckoutError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "session_not_found"),
        CheckoutError::SessionAlreadyActive { .. } => {
            (StatusCode::CONFLICT, "session_already_active")
        }
        CheckoutError::SessionAbandoned(_) => (StatusCode::GONE, "session_abandoned"),
        CheckoutError::ReservationExpired(_) => (StatusCode::GONE, "reservation_expired"),
        CheckoutError::PaymentDeclined { .. } => (StatusCode::PAYMENT_REQUIRED, "payment_declined"),
        CheckoutError::PaymentGateway { .. } => (StatusCode::BAD_GATEWAY, "gateway_error"),
        CheckoutError::CommitRejected { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "commit_rejected")
        }
        CheckoutError::Domain(err) => domain_status(err),
        CheckoutError::Inventory(err) => inventory_status(err),
        CheckoutError::Catalog(CatalogError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, "product_not_found")
        }
        CheckoutError::Catalog(CatalogError::Unavailable(_)) | CheckoutError::Service(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
        }
        CheckoutError::Store(StoreError::ConcurrencyConflict { .. }) => {
            (StatusCode::CONFLICT, "concurrency_conflict")
        }
    }
}

fn domain_status(err: &DomainError) -> (StatusCode, &'static str) {
    match err {
        DomainError::Cart(cart_err) => match cart_err {
            CartError::InvalidQuantity { .. } | CartError::InvalidCouponCode { .. } => {
                (StatusCode::BAD_REQUEST, "validation_error")
            }
            CartError::LineNotFound { .. } => (StatusCode::NOT_FOUND, "line_not_found"),
            CartError::NotActive { .. } => (StatusCode::CONFLICT, "cart_not_active"),
            CartError::AlreadyCreated => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        },
        DomainError::Session(session_err) => match session_err {
            SessionError::EmptyCart => (StatusCode::BAD_REQUEST, "empty_cart"),
            SessionError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "invalid_transition")
            }
            SessionError::AlreadyCreated => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        },
        DomainError::LineKey(_) => (StatusCode::BAD_REQUEST, "validation_error"),
    }
}

fn inventory_status(err: &InventoryError) -> (StatusCode, &'static str) {
    match err {
        InventoryError::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
        InventoryError::InvalidQuantity { .. } | InventoryError::EmptyReservation => {
            (StatusCode::BAD_REQUEST, "validation_error")
        }
        InventoryError::UnknownSku(_) => (StatusCode::NOT_FOUND, "product_not_found"),
        InventoryError::ReservationExpired(_) => (StatusCode::GONE, "reservation_expired"),
        InventoryError::ReservationNotFound(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "reservation_not_found")
        }
        InventoryError::ReservationReleased(_) | InventoryError::AlreadyCommitted(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "reservation_state")
        }
        InventoryError::Invariant(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Checkout(CheckoutError::Domain(err))
    }
}
