//! Checkout error types.

use common::SessionId;
use domain::{
    CartError, DomainError, LineKey, OwnerRef, SessionError, SessionFailure, SkuId, StockShortage,
};
use inventory::InventoryError;
use thiserror::Error;

/// Errors reported by the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The catalog does not list the SKU (or variant).
    #[error("Product not found: {0}")]
    NotFound(LineKey),

    /// The catalog could not be reached.
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by the payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The provider refused the payment.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// The provider failed to answer.
    #[error("Payment gateway error: {0}")]
    Gateway(String),
}

/// A collaborator other than catalog or payment failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service} service unavailable: {message}")]
pub struct ServiceError {
    pub service: &'static str,
    pub message: String,
}

impl ServiceError {
    /// Creates a service error.
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

/// Errors raised by the aggregate store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Another writer appended first.
    #[error(
        "Concurrency conflict on {aggregate_type} {aggregate_id}: expected version {expected}, actual {actual}"
    )]
    ConcurrencyConflict {
        aggregate_type: &'static str,
        aggregate_id: String,
        expected: u64,
        actual: u64,
    },
}

/// Errors that can occur during cart and checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Malformed or unacceptable input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Advisory availability check failed while editing a cart.
    #[error("Out of stock: {sku} (requested {requested}, available {available})")]
    OutOfStock {
        sku: SkuId,
        requested: u64,
        available: u64,
    },

    /// The reservation could not be taken; the session is Failed.
    #[error("Insufficient stock for session {session_id}")]
    InsufficientStock {
        session_id: SessionId,
        shortages: Vec<StockShortage>,
    },

    /// Catalog no longer lists some SKUs; the session is Failed.
    #[error("Products unavailable for session {session_id}")]
    ProductUnavailable {
        session_id: SessionId,
        skus: Vec<SkuId>,
    },

    /// No coupon with this code exists.
    #[error("Unknown coupon: {0}")]
    UnknownCoupon(String),

    /// The owner has no active cart.
    #[error("No active cart for {0}")]
    CartNotFound(OwnerRef),

    /// No such checkout session.
    #[error("Checkout session not found: {0}")]
    SessionNotFound(SessionId),

    /// The cart already has a non-terminal session.
    #[error("Cart already has an active checkout session: {session_id}")]
    SessionAlreadyActive { session_id: SessionId },

    /// The Draft session sat idle past its deadline and was abandoned.
    #[error("Checkout session abandoned: {0}")]
    SessionAbandoned(SessionId),

    /// The reservation lapsed; the session is Expired or Failed.
    #[error("Reservation expired for session {0}")]
    ReservationExpired(SessionId),

    /// The provider declined; the session is Failed and its stock released.
    #[error("Payment declined for session {session_id}: {message}")]
    PaymentDeclined {
        session_id: SessionId,
        message: String,
    },

    /// The provider failed; the session is Failed and its stock released.
    #[error("Payment gateway error for session {session_id}: {message}")]
    PaymentGateway {
        session_id: SessionId,
        message: String,
    },

    /// The ledger refused to commit; the session is Failed.
    #[error("Stock commit rejected for session {session_id}: {message}")]
    CommitRejected {
        session_id: SessionId,
        message: String,
    },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Stock ledger error.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Catalog error.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A collaborator is unavailable.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Aggregate store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<CartError> for CheckoutError {
    fn from(e: CartError) -> Self {
        CheckoutError::Domain(DomainError::Cart(e))
    }
}

impl From<SessionError> for CheckoutError {
    fn from(e: SessionError) -> Self {
        CheckoutError::Domain(DomainError::Session(e))
    }
}

impl CheckoutError {
    /// The error a caller sees for a session that ended in `failure`.
    pub fn from_failure(session_id: SessionId, failure: &SessionFailure) -> Self {
        match failure {
            SessionFailure::InsufficientStock { shortages } => CheckoutError::InsufficientStock {
                session_id,
                shortages: shortages.clone(),
            },
            SessionFailure::ProductUnavailable { skus } => CheckoutError::ProductUnavailable {
                session_id,
                skus: skus.clone(),
            },
            SessionFailure::PaymentDeclined { message } => CheckoutError::PaymentDeclined {
                session_id,
                message: message.clone(),
            },
            SessionFailure::PaymentGateway { message } => CheckoutError::PaymentGateway {
                session_id,
                message: message.clone(),
            },
            SessionFailure::ReservationExpired | SessionFailure::FinalizationTimedOut => {
                CheckoutError::ReservationExpired(session_id)
            }
            SessionFailure::CommitRejected { message } => CheckoutError::CommitRejected {
                session_id,
                message: message.clone(),
            },
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_mapping() {
        let id = SessionId::new();

        let err = CheckoutError::from_failure(
            id,
            &SessionFailure::PaymentDeclined {
                message: "card expired".into(),
            },
        );
        assert!(matches!(
            err,
            CheckoutError::PaymentDeclined { session_id, ref message }
                if session_id == id && message == "card expired"
        ));

        let err = CheckoutError::from_failure(id, &SessionFailure::FinalizationTimedOut);
        assert!(matches!(err, CheckoutError::ReservationExpired(s) if s == id));
    }

    #[test]
    fn test_cart_error_converts_through_domain() {
        let err: CheckoutError = CartError::InvalidQuantity { quantity: -1 }.into();
        assert!(matches!(
            err,
            CheckoutError::Domain(DomainError::Cart(CartError::InvalidQuantity { quantity: -1 }))
        ));
    }
}
