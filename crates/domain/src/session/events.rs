//! Checkout session domain events.

use chrono::{DateTime, Utc};
use common::{CartId, ReservationId, SessionId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::pricing::Totals;
use crate::values::{CartLineItem, OwnerRef};

use super::SessionFailure;

/// Events that can occur on a checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    /// Session was created from a cart.
    SessionInitiated(SessionInitiatedData),

    /// Stock was reserved and totals computed.
    StockReserved(StockReservedData),

    /// Payment authorization was accepted but not yet settled.
    PaymentPending(PaymentPendingData),

    /// Payment was approved.
    PaymentAuthorized(PaymentAuthorizedData),

    /// Reserved stock was committed.
    StockCommitted(StockCommittedData),

    /// The order collaborator rejected the order request; the session stays Paid.
    OrderCreationFailed(OrderCreationFailedData),

    /// Order was created.
    SessionFinalized(SessionFinalizedData),

    /// Session failed.
    SessionFailed(SessionFailedData),

    /// Reservation timed out.
    SessionExpired(SessionExpiredData),

    /// Draft timed out.
    SessionAbandoned(SessionAbandonedData),
}

impl DomainEvent for SessionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::SessionInitiated(_) => "SessionInitiated",
            SessionEvent::StockReserved(_) => "StockReserved",
            SessionEvent::PaymentPending(_) => "PaymentPending",
            SessionEvent::PaymentAuthorized(_) => "PaymentAuthorized",
            SessionEvent::StockCommitted(_) => "StockCommitted",
            SessionEvent::OrderCreationFailed(_) => "OrderCreationFailed",
            SessionEvent::SessionFinalized(_) => "SessionFinalized",
            SessionEvent::SessionFailed(_) => "SessionFailed",
            SessionEvent::SessionExpired(_) => "SessionExpired",
            SessionEvent::SessionAbandoned(_) => "SessionAbandoned",
        }
    }
}

impl SessionEvent {
    /// When the event happened.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SessionEvent::SessionInitiated(d) => d.initiated_at,
            SessionEvent::StockReserved(d) => d.reserved_at,
            SessionEvent::PaymentPending(d) => d.pending_at,
            SessionEvent::PaymentAuthorized(d) => d.authorized_at,
            SessionEvent::StockCommitted(d) => d.committed_at,
            SessionEvent::OrderCreationFailed(d) => d.failed_at,
            SessionEvent::SessionFinalized(d) => d.finalized_at,
            SessionEvent::SessionFailed(d) => d.failed_at,
            SessionEvent::SessionExpired(d) => d.expired_at,
            SessionEvent::SessionAbandoned(d) => d.abandoned_at,
        }
    }
}

/// Data for SessionInitiated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInitiatedData {
    pub session_id: SessionId,
    pub cart_id: CartId,
    pub owner: OwnerRef,
    /// Cart lines frozen at initiation.
    pub lines: Vec<CartLineItem>,
    pub coupon_code: Option<String>,
    pub initiated_at: DateTime<Utc>,
    /// Deadline for reserving stock before the draft is abandoned.
    pub expires_at: DateTime<Utc>,
}

/// Data for StockReserved event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReservedData {
    pub reservation_id: ReservationId,
    /// Authoritative totals computed just before reserving.
    pub totals: Totals,
    pub reserved_at: DateTime<Utc>,
    /// The reservation's expiry, which becomes the session deadline.
    pub expires_at: DateTime<Utc>,
}

/// Data for PaymentPending event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPendingData {
    pub payment_ref: String,
    pub pending_at: DateTime<Utc>,
}

/// Data for PaymentAuthorized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAuthorizedData {
    pub payment_ref: String,
    pub authorized_at: DateTime<Utc>,
}

/// Data for StockCommitted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCommittedData {
    pub reservation_id: ReservationId,
    pub committed_at: DateTime<Utc>,
}

/// Data for OrderCreationFailed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreationFailedData {
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

/// Data for SessionFinalized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFinalizedData {
    pub order_id: String,
    pub finalized_at: DateTime<Utc>,
}

/// Data for SessionFailed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailedData {
    pub failure: SessionFailure,
    pub failed_at: DateTime<Utc>,
}

/// Data for SessionExpired event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionExpiredData {
    pub expired_at: DateTime<Utc>,
}

/// Data for SessionAbandoned event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAbandonedData {
    pub abandoned_at: DateTime<Utc>,
}

// Convenience constructors for events
impl SessionEvent {
    /// Creates a StockReserved event.
    pub fn stock_reserved(
        reservation_id: ReservationId,
        totals: Totals,
        at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        SessionEvent::StockReserved(StockReservedData {
            reservation_id,
            totals,
            reserved_at: at,
            expires_at,
        })
    }

    /// Creates a PaymentPending event.
    pub fn payment_pending(payment_ref: impl Into<String>, at: DateTime<Utc>) -> Self {
        SessionEvent::PaymentPending(PaymentPendingData {
            payment_ref: payment_ref.into(),
            pending_at: at,
        })
    }

    /// Creates a PaymentAuthorized event.
    pub fn payment_authorized(payment_ref: impl Into<String>, at: DateTime<Utc>) -> Self {
        SessionEvent::PaymentAuthorized(PaymentAuthorizedData {
            payment_ref: payment_ref.into(),
            authorized_at: at,
        })
    }

    /// Creates a StockCommitted event.
    pub fn stock_committed(reservation_id: ReservationId, at: DateTime<Utc>) -> Self {
        SessionEvent::StockCommitted(StockCommittedData {
            reservation_id,
            committed_at: at,
        })
    }

    /// Creates an OrderCreationFailed event.
    pub fn order_creation_failed(message: impl Into<String>, at: DateTime<Utc>) -> Self {
        SessionEvent::OrderCreationFailed(OrderCreationFailedData {
            message: message.into(),
            failed_at: at,
        })
    }

    /// Creates a SessionFinalized event.
    pub fn session_finalized(order_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        SessionEvent::SessionFinalized(SessionFinalizedData {
            order_id: order_id.into(),
            finalized_at: at,
        })
    }

    /// Creates a SessionFailed event.
    pub fn session_failed(failure: SessionFailure, at: DateTime<Utc>) -> Self {
        SessionEvent::SessionFailed(SessionFailedData {
            failure,
            failed_at: at,
        })
    }

    /// Creates a SessionExpired event.
    pub fn session_expired(at: DateTime<Utc>) -> Self {
        SessionEvent::SessionExpired(SessionExpiredData { expired_at: at })
    }

    /// Creates a SessionAbandoned event.
    pub fn session_abandoned(at: DateTime<Utc>) -> Self {
        SessionEvent::SessionAbandoned(SessionAbandonedData { abandoned_at: at })
    }
}
