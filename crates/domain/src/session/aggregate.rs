//! Checkout session aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CartId, ReservationId, SessionId};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::pricing::Totals;
use crate::values::{CartLineItem, OwnerRef};

use super::{
    CheckoutStep, SessionError, SessionEvent, SessionFailure, SessionState,
    events::{SessionInitiatedData, StockReservedData},
};

/// Checkout session aggregate root.
///
/// Drives one cart from a draft through reservation and payment to an order.
/// Every transition is one-way; terminal sessions accept no commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    id: Option<SessionId>,
    cart_id: Option<CartId>,
    owner: Option<OwnerRef>,
    state: SessionState,
    lines: Vec<CartLineItem>,
    coupon_code: Option<String>,
    reservation_id: Option<ReservationId>,
    totals: Option<Totals>,
    payment_ref: Option<String>,
    payment_pending: bool,
    order_id: Option<String>,
    failure: Option<SessionFailure>,
    last_error: Option<String>,
    completed_steps: Vec<CheckoutStep>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl Aggregate for CheckoutSession {
    type Id = SessionId;
    type Event = SessionEvent;
    type Error = SessionError;

    fn aggregate_type() -> &'static str {
        "CheckoutSession"
    }

    fn id(&self) -> Option<SessionId> {
        self.id
    }

    fn apply(&mut self, event: Self::Event) {
        self.updated_at = Some(event.occurred_at());
        match event {
            SessionEvent::SessionInitiated(data) => self.apply_initiated(data),
            SessionEvent::StockReserved(data) => self.apply_stock_reserved(data),
            SessionEvent::PaymentPending(data) => {
                self.payment_ref = Some(data.payment_ref);
                self.payment_pending = true;
            }
            SessionEvent::PaymentAuthorized(data) => {
                self.payment_ref = Some(data.payment_ref);
                self.payment_pending = false;
                self.state = SessionState::Paid;
                self.complete(CheckoutStep::Authorize);
            }
            SessionEvent::StockCommitted(_) => self.complete(CheckoutStep::Commit),
            SessionEvent::OrderCreationFailed(data) => self.last_error = Some(data.message),
            SessionEvent::SessionFinalized(data) => {
                self.order_id = Some(data.order_id);
                self.last_error = None;
                self.state = SessionState::Finalized;
                self.complete(CheckoutStep::Finalize);
            }
            SessionEvent::SessionFailed(data) => {
                self.failure = Some(data.failure);
                self.payment_pending = false;
                self.state = SessionState::Failed;
            }
            SessionEvent::SessionExpired(_) => {
                self.payment_pending = false;
                self.state = SessionState::Expired;
            }
            SessionEvent::SessionAbandoned(_) => self.state = SessionState::Abandoned,
        }
    }
}

// Query methods
impl CheckoutSession {
    /// Returns the cart this session checks out.
    pub fn cart_id(&self) -> Option<CartId> {
        self.cart_id
    }

    /// Returns the cart owner.
    pub fn owner(&self) -> Option<&OwnerRef> {
        self.owner.as_ref()
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the cart lines frozen at initiation.
    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    /// Returns the coupon code carried over from the cart.
    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    /// Returns the stock reservation, once reserved.
    pub fn reservation_id(&self) -> Option<ReservationId> {
        self.reservation_id
    }

    /// Returns the authoritative totals, once reserved.
    pub fn totals(&self) -> Option<&Totals> {
        self.totals.as_ref()
    }

    /// Returns the payment reference, once authorization was attempted.
    pub fn payment_ref(&self) -> Option<&str> {
        self.payment_ref.as_deref()
    }

    /// Returns true while an authorization awaits settlement.
    pub fn is_payment_pending(&self) -> bool {
        self.payment_pending
    }

    /// Returns the order id, once finalized.
    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }

    /// Returns why the session failed.
    pub fn failure(&self) -> Option<&SessionFailure> {
        self.failure.as_ref()
    }

    /// Returns the last non-fatal error, such as a rejected order request.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the steps completed so far, in order.
    pub fn completed_steps(&self) -> &[CheckoutStep] {
        &self.completed_steps
    }

    /// Returns true if the step already ran.
    pub fn has_completed(&self, step: CheckoutStep) -> bool {
        self.completed_steps.contains(&step)
    }

    /// When the session was created.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// When the session last changed.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Deadline after which an idle session is timed out.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the session is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns true if the session is live but past its deadline.
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.id.is_some() && !self.is_terminal() && self.expires_at.is_some_and(|at| now >= at)
    }
}

// Command methods (return events)
impl CheckoutSession {
    /// Creates a session from the cart's current lines.
    #[allow(clippy::too_many_arguments)]
    pub fn initiate(
        &self,
        session_id: SessionId,
        cart_id: CartId,
        owner: OwnerRef,
        lines: Vec<CartLineItem>,
        coupon_code: Option<String>,
        at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        if self.id.is_some() {
            return Err(SessionError::AlreadyCreated);
        }
        if lines.is_empty() {
            return Err(SessionError::EmptyCart);
        }

        Ok(vec![SessionEvent::SessionInitiated(SessionInitiatedData {
            session_id,
            cart_id,
            owner,
            lines,
            coupon_code,
            initiated_at: at,
            expires_at,
        })])
    }

    /// Records a successful stock reservation. Draft → Reserved.
    pub fn reserve(
        &self,
        reservation_id: ReservationId,
        totals: Totals,
        at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure(self.state.can_reserve(), "reserve stock")?;
        Ok(vec![SessionEvent::stock_reserved(
            reservation_id,
            totals,
            at,
            expires_at,
        )])
    }

    /// Records an authorization the provider has not settled yet.
    ///
    /// The session stays Reserved; a repeat with the same reference is a no-op.
    pub fn mark_payment_pending(
        &self,
        payment_ref: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure(self.state.can_authorize(), "record pending payment")?;
        if self.payment_pending && self.payment_ref.as_deref() == Some(payment_ref) {
            return Ok(vec![]);
        }
        Ok(vec![SessionEvent::payment_pending(payment_ref, at)])
    }

    /// Records an approved payment. Reserved → Paid.
    pub fn authorize(
        &self,
        payment_ref: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure(self.state.can_authorize(), "authorize payment")?;
        Ok(vec![SessionEvent::payment_authorized(payment_ref, at)])
    }

    /// Records that the reserved stock was committed. No-op if already recorded.
    pub fn commit_stock(&self, at: DateTime<Utc>) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure(self.state.can_finalize(), "commit stock")?;
        if self.has_completed(CheckoutStep::Commit) {
            return Ok(vec![]);
        }
        let reservation_id = self.reservation_id.ok_or(SessionError::InvalidTransition {
            current: self.state,
            action: "commit stock without a reservation",
        })?;
        Ok(vec![SessionEvent::stock_committed(reservation_id, at)])
    }

    /// Records a rejected order request. The session stays Paid for a retry.
    pub fn record_order_failure(
        &self,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure(self.state.can_finalize(), "record order failure")?;
        Ok(vec![SessionEvent::order_creation_failed(message, at)])
    }

    /// Records the created order. Paid → Finalized; requires committed stock.
    pub fn finalize(
        &self,
        order_id: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure(self.state.can_finalize(), "finalize")?;
        self.ensure(
            self.has_completed(CheckoutStep::Commit),
            "finalize before stock commit",
        )?;
        Ok(vec![SessionEvent::session_finalized(order_id, at)])
    }

    /// Moves the session to Failed.
    pub fn fail(
        &self,
        failure: SessionFailure,
        at: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure(self.state.can_fail(), "fail")?;
        Ok(vec![SessionEvent::session_failed(failure, at)])
    }

    /// Times out a reserved session. Reserved → Expired.
    pub fn expire(&self, at: DateTime<Utc>) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure(self.state.can_expire(), "expire")?;
        Ok(vec![SessionEvent::session_expired(at)])
    }

    /// Times out a draft session. Draft → Abandoned.
    pub fn abandon(&self, at: DateTime<Utc>) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure(self.state.can_abandon(), "abandon")?;
        Ok(vec![SessionEvent::session_abandoned(at)])
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), SessionError> {
        if self.id.is_none() || !allowed {
            return Err(SessionError::InvalidTransition {
                current: self.state,
                action,
            });
        }
        Ok(())
    }
}

// Apply event helpers
impl CheckoutSession {
    fn apply_initiated(&mut self, data: SessionInitiatedData) {
        self.id = Some(data.session_id);
        self.cart_id = Some(data.cart_id);
        self.owner = Some(data.owner);
        self.lines = data.lines;
        self.coupon_code = data.coupon_code;
        self.state = SessionState::Draft;
        self.created_at = Some(data.initiated_at);
        self.expires_at = Some(data.expires_at);
    }

    fn apply_stock_reserved(&mut self, data: StockReservedData) {
        self.reservation_id = Some(data.reservation_id);
        self.totals = Some(data.totals);
        self.expires_at = Some(data.expires_at);
        self.state = SessionState::Reserved;
        self.complete(CheckoutStep::Reserve);
    }

    fn complete(&mut self, step: CheckoutStep) {
        if !self.completed_steps.contains(&step) {
            self.completed_steps.push(step);
        }
    }
}
