//! Checkout session aggregate and related types.

mod aggregate;
mod events;
mod state;

pub use aggregate::CheckoutSession;
pub use events::{
    OrderCreationFailedData, PaymentAuthorizedData, PaymentPendingData, SessionAbandonedData,
    SessionEvent, SessionExpiredData, SessionFailedData, SessionFinalizedData,
    SessionInitiatedData, StockCommittedData, StockReservedData,
};
pub use state::SessionState;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::values::{SkuId, StockShortage};

/// A checkout step, recorded once completed so repeated requests can be
/// answered from the session instead of acting again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    Reserve,
    Authorize,
    Commit,
    Finalize,
}

/// Why a session ended in Failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SessionFailure {
    /// One or more SKUs could not be reserved.
    InsufficientStock { shortages: Vec<StockShortage> },

    /// The catalog no longer lists these SKUs.
    ProductUnavailable { skus: Vec<SkuId> },

    /// The payment provider declined.
    PaymentDeclined { message: String },

    /// The payment provider failed; a new checkout may succeed.
    PaymentGateway { message: String },

    /// The reservation lapsed before it could be committed.
    ReservationExpired,

    /// The ledger refused the commit for another reason.
    CommitRejected { message: String },

    /// The session passed its deadline while paid but uncommitted.
    FinalizationTimedOut,
}

impl SessionFailure {
    /// Returns the failure code.
    pub fn code(&self) -> &'static str {
        match self {
            SessionFailure::InsufficientStock { .. } => "insufficient_stock",
            SessionFailure::ProductUnavailable { .. } => "product_unavailable",
            SessionFailure::PaymentDeclined { .. } => "payment_declined",
            SessionFailure::PaymentGateway { .. } => "payment_gateway",
            SessionFailure::ReservationExpired => "reservation_expired",
            SessionFailure::CommitRejected { .. } => "commit_rejected",
            SessionFailure::FinalizationTimedOut => "finalization_timed_out",
        }
    }
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionFailure::InsufficientStock { shortages } => {
                write!(f, "Insufficient stock for ")?;
                for (i, shortage) in shortages.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{shortage}")?;
                }
                Ok(())
            }
            SessionFailure::ProductUnavailable { skus } => {
                let skus: Vec<&str> = skus.iter().map(SkuId::as_str).collect();
                write!(f, "Products no longer available: {}", skus.join(", "))
            }
            SessionFailure::PaymentDeclined { message } => write!(f, "Payment declined: {message}"),
            SessionFailure::PaymentGateway { message } => {
                write!(f, "Payment gateway error: {message}")
            }
            SessionFailure::ReservationExpired => write!(f, "Stock reservation expired"),
            SessionFailure::CommitRejected { message } => {
                write!(f, "Stock commit rejected: {message}")
            }
            SessionFailure::FinalizationTimedOut => {
                write!(f, "Session expired before stock was committed")
            }
        }
    }
}

/// Errors that can occur during checkout session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Session is already initiated.
    #[error("Session already initiated")]
    AlreadyCreated,

    /// The cart has no lines.
    #[error("Cannot check out an empty cart")]
    EmptyCart,

    /// Session is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current} state")]
    InvalidTransition {
        current: SessionState,
        action: &'static str,
    },
}
