//! Checkout coordinator: drives sessions from a cart to an order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{CartId, KeyedLocks, SessionId};
use domain::{
    Aggregate, Cart, CheckoutSession, CheckoutStep, OwnerRef, SessionError, SessionEvent,
    SessionFailure, SessionState, SkuId,
};
use inventory::{InventoryError, ReservationLine};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cart_service::CartService;
use crate::config::CheckoutConfig;
use crate::environment::CheckoutEnvironment;
use crate::error::{CheckoutError, PaymentError, Result};
use crate::pricing::Repricer;
use crate::repository::{AggregateStore, InMemoryAggregateStore, Versioned};
use crate::services::{AuthorizationStatus, OrderRequest, PaymentRequest};

/// Sessions moved by one idle sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Draft sessions moved to Abandoned.
    pub abandoned: Vec<SessionId>,
    /// Reserved sessions moved to Expired.
    pub expired: Vec<SessionId>,
    /// Paid but uncommitted sessions compensated and moved to Failed.
    pub failed: Vec<SessionId>,
}

impl SweepReport {
    /// Total number of sessions moved.
    pub fn len(&self) -> usize {
        self.abandoned.len() + self.expired.len() + self.failed.len()
    }

    /// Returns true if the sweep moved nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Orchestrates checkout sessions.
///
/// Transitions of one session are serialized by a per-session lock. A
/// repeated request for a step the session already passed returns the
/// session as it is; a request against a failed session returns the failure.
/// Every failure branch compensates before it returns: the reservation is
/// released and any authorization is voided.
pub struct CheckoutCoordinator {
    env: CheckoutEnvironment,
    config: CheckoutConfig,
    carts: Arc<CartService>,
    store: Arc<dyn AggregateStore<CheckoutSession>>,
    repricer: Repricer,
    active_by_cart: Mutex<HashMap<CartId, SessionId>>,
    locks: KeyedLocks<SessionId>,
}

impl CheckoutCoordinator {
    /// Creates a coordinator over the given session store.
    pub fn new(
        env: CheckoutEnvironment,
        config: CheckoutConfig,
        carts: Arc<CartService>,
        store: Arc<dyn AggregateStore<CheckoutSession>>,
    ) -> Self {
        let repricer = Repricer::new(env.clone(), config.jurisdiction.clone());
        Self {
            env,
            config,
            carts,
            store,
            repricer,
            active_by_cart: Mutex::new(HashMap::new()),
            locks: KeyedLocks::new(),
        }
    }

    /// Creates a coordinator backed by an in-memory session store.
    pub fn in_memory(
        env: CheckoutEnvironment,
        config: CheckoutConfig,
        carts: Arc<CartService>,
    ) -> Self {
        Self::new(
            env,
            config,
            carts,
            Arc::new(InMemoryAggregateStore::<CheckoutSession>::new()),
        )
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Loads a session.
    pub async fn get(&self, session_id: SessionId) -> Result<CheckoutSession> {
        Ok(self.load(session_id).await?.aggregate)
    }

    /// Returns a session's event history.
    pub async fn events(&self, session_id: SessionId) -> Result<Vec<SessionEvent>> {
        let events = self.store.history(session_id).await?;
        if events.is_empty() {
            return Err(CheckoutError::SessionNotFound(session_id));
        }
        Ok(events)
    }

    /// Returns the non-terminal session of a cart, if any.
    pub async fn active_session(&self, cart_id: CartId) -> Option<SessionId> {
        self.active_by_cart.lock().await.get(&cart_id).copied()
    }

    /// Frees a cart from checkout before its contents move elsewhere.
    ///
    /// A Draft session of the cart is abandoned. A session that holds stock
    /// or payment keeps the cart: `SessionAlreadyActive`. Callers hold the
    /// cart owner's lock, so the session lock is only tried.
    #[tracing::instrument(skip(self))]
    pub async fn detach_cart(&self, cart_id: CartId) -> Result<()> {
        let mut active = self.active_by_cart.lock().await;
        let Some(session_id) = active.get(&cart_id).copied() else {
            return Ok(());
        };
        let Some(_guard) = self.locks.try_lock(&session_id).await else {
            return Err(CheckoutError::SessionAlreadyActive { session_id });
        };

        let Some(current) = self.store.load(session_id).await? else {
            active.remove(&cart_id);
            return Ok(());
        };
        match current.aggregate.state() {
            SessionState::Draft => {
                let now = self.env.clock.now();
                self.abandon(current, now).await?;
            }
            state if state.is_terminal() => {}
            _ => return Err(CheckoutError::SessionAlreadyActive { session_id }),
        }
        active.remove(&cart_id);
        Ok(())
    }

    /// Opens a Draft session for the owner's active cart.
    ///
    /// The cart's lines and coupon are frozen into the session. Fails with
    /// `EmptyCart` for a missing or empty cart and `SessionAlreadyActive` if
    /// the cart already has a non-terminal session past Draft.
    ///
    /// A Draft session of the same owner that still matches the cart is
    /// returned as is, so a reservation that failed on a transient error can
    /// be retried. A Draft that went stale (past its deadline, or the cart
    /// changed since) is abandoned and replaced.
    #[tracing::instrument(skip(self))]
    pub async fn initiate(&self, owner: &OwnerRef) -> Result<CheckoutSession> {
        let _owner_guard = self.carts.lock(owner).await;
        let cart = self
            .carts
            .cart_for(owner)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(SessionError::EmptyCart)?;
        let cart_id = cart.id().ok_or(SessionError::EmptyCart)?;

        let mut active = self.active_by_cart.lock().await;
        let now = self.env.clock.now();
        if let Some(existing) = active.get(&cart_id).copied()
            && let Some(session) = self.resume_draft(existing, owner, &cart, now).await?
        {
            tracing::info!(session_id = %existing, %cart_id, "resuming draft checkout session");
            return Ok(session);
        }

        let session_id = SessionId::new();
        let events = CheckoutSession::default().initiate(
            session_id,
            cart_id,
            owner.clone(),
            cart.items().to_vec(),
            cart.applied_coupon().map(str::to_string),
            now,
            now + self.config.draft_ttl,
        )?;
        let session = self.store.append(session_id, 0, events).await?.aggregate;
        active.insert(cart_id, session_id);

        metrics::counter!("checkout_sessions_initiated_total").increment(1);
        tracing::info!(%session_id, %cart_id, lines = session.lines().len(), "checkout session initiated");
        Ok(session)
    }

    /// Reprices the session and reserves its stock. Draft → Reserved.
    ///
    /// A shortage or a delisted product fails the session. A transient
    /// collaborator error leaves it in Draft for a retry.
    #[tracing::instrument(skip(self))]
    pub async fn reserve_stock(&self, session_id: SessionId) -> Result<CheckoutSession> {
        let _guard = self.locks.lock(&session_id).await;
        let current = self.load(session_id).await?;
        if current.aggregate.has_completed(CheckoutStep::Reserve) {
            return Ok(current.aggregate);
        }
        Self::ensure(&current.aggregate, SessionState::can_reserve, "reserve stock")?;

        let now = self.env.clock.now();
        if current.aggregate.is_past_deadline(now) {
            let session = self.abandon(current, now).await?;
            self.finish(&session).await;
            return Err(CheckoutError::SessionAbandoned(session_id));
        }

        let repricing = self
            .repricer
            .reprice(
                current.aggregate.lines(),
                current.aggregate.coupon_code(),
                now,
            )
            .await?;

        if !repricing.unavailable.is_empty() {
            let mut skus: Vec<SkuId> = repricing.unavailable.into_iter().map(|k| k.sku).collect();
            skus.dedup();
            return self
                .fail(current, SessionFailure::ProductUnavailable { skus }, now)
                .await;
        }

        let lines: Vec<ReservationLine> = current
            .aggregate
            .lines()
            .iter()
            .map(|line| ReservationLine::new(line.sku.clone(), u64::from(line.quantity)))
            .collect();

        match self
            .env
            .ledger
            .reserve(session_id, &lines, self.config.reservation_ttl)
            .await
        {
            Ok(reservation) => {
                let events = current.aggregate.reserve(
                    reservation.id,
                    repricing.totals,
                    now,
                    reservation.expires_at,
                )?;
                let session = self.append(current, events).await?.aggregate;
                tracing::info!(
                    %session_id,
                    reservation_id = %reservation.id,
                    expires_at = %reservation.expires_at,
                    "stock reserved"
                );
                Ok(session)
            }
            Err(InventoryError::InsufficientStock { shortages }) => {
                self.fail(current, SessionFailure::InsufficientStock { shortages }, now)
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Asks the payment provider to authorize the session total.
    ///
    /// Approval moves the session to Paid. A pending authorization keeps it
    /// Reserved with the payment reference recorded. A decline or gateway
    /// error fails the session and releases its stock. The session stays
    /// Reserved while the provider is awaited; its deadline still applies.
    #[tracing::instrument(skip(self))]
    pub async fn authorize_payment(
        &self,
        session_id: SessionId,
        method: &str,
    ) -> Result<CheckoutSession> {
        if method.trim().is_empty() {
            return Err(CheckoutError::Validation("payment method is required".into()));
        }

        let _guard = self.locks.lock(&session_id).await;
        let current = self.load(session_id).await?;
        if current.aggregate.has_completed(CheckoutStep::Authorize) {
            return Ok(current.aggregate);
        }
        Self::ensure(&current.aggregate, SessionState::can_authorize, "authorize payment")?;

        let now = self.env.clock.now();
        if current.aggregate.is_past_deadline(now) {
            self.expire(current, now).await?;
            return Err(CheckoutError::ReservationExpired(session_id));
        }

        let amount = current
            .aggregate
            .totals()
            .map(|totals| totals.total)
            .ok_or(SessionError::InvalidTransition {
                current: current.aggregate.state(),
                action: "authorize payment without totals",
            })?;
        let request = PaymentRequest {
            session_id,
            amount,
            method: method.to_string(),
            idempotency_key: format!("{session_id}:authorize"),
        };

        let result = self.env.payment.authorize(request).await;
        let at = self.env.clock.now();
        match result {
            Ok(authorization) => {
                let events = match authorization.status {
                    AuthorizationStatus::Approved => current
                        .aggregate
                        .authorize(&authorization.payment_ref, at)?,
                    AuthorizationStatus::Pending => current
                        .aggregate
                        .mark_payment_pending(&authorization.payment_ref, at)?,
                };
                let session = self.append(current, events).await?.aggregate;
                tracing::info!(
                    %session_id,
                    payment_ref = %authorization.payment_ref,
                    status = ?authorization.status,
                    "payment authorization recorded"
                );
                Ok(session)
            }
            Err(PaymentError::Declined(message)) => {
                self.fail(current, SessionFailure::PaymentDeclined { message }, at)
                    .await
            }
            Err(PaymentError::Gateway(message)) => {
                self.fail(current, SessionFailure::PaymentGateway { message }, at)
                    .await
            }
        }
    }

    /// Resolves a pending authorization reported later by the provider.
    #[tracing::instrument(skip(self))]
    pub async fn settle_payment(
        &self,
        session_id: SessionId,
        approved: bool,
        message: Option<String>,
    ) -> Result<CheckoutSession> {
        let _guard = self.locks.lock(&session_id).await;
        let current = self.load(session_id).await?;
        if current.aggregate.has_completed(CheckoutStep::Authorize) {
            return Ok(current.aggregate);
        }
        Self::ensure(&current.aggregate, SessionState::can_authorize, "settle payment")?;

        let Some(payment_ref) = current
            .aggregate
            .payment_ref()
            .filter(|_| current.aggregate.is_payment_pending())
            .map(str::to_string)
        else {
            return Err(SessionError::InvalidTransition {
                current: current.aggregate.state(),
                action: "settle payment without a pending authorization",
            }
            .into());
        };

        let now = self.env.clock.now();
        if current.aggregate.is_past_deadline(now) {
            self.expire(current, now).await?;
            return Err(CheckoutError::ReservationExpired(session_id));
        }

        if approved {
            let events = current.aggregate.authorize(&payment_ref, now)?;
            let session = self.append(current, events).await?.aggregate;
            tracing::info!(%session_id, %payment_ref, "pending payment approved");
            Ok(session)
        } else {
            let message = message.unwrap_or_else(|| "declined by provider".to_string());
            self.fail(current, SessionFailure::PaymentDeclined { message }, now)
                .await
        }
    }

    /// Commits the stock and hands the order request to the order system.
    /// Paid → Finalized.
    ///
    /// A commit rejected by the ledger fails the session and voids the
    /// payment. An order-creation failure after the commit leaves the session
    /// Paid; a retry skips the commit.
    #[tracing::instrument(skip(self))]
    pub async fn finalize(&self, session_id: SessionId) -> Result<CheckoutSession> {
        let _guard = self.locks.lock(&session_id).await;
        let mut current = self.load(session_id).await?;
        if current.aggregate.state() == SessionState::Finalized {
            return Ok(current.aggregate);
        }
        Self::ensure(&current.aggregate, SessionState::can_finalize, "finalize")?;
        let started = std::time::Instant::now();

        let reservation_id =
            current
                .aggregate
                .reservation_id()
                .ok_or(SessionError::InvalidTransition {
                    current: current.aggregate.state(),
                    action: "finalize without a reservation",
                })?;

        if !current.aggregate.has_completed(CheckoutStep::Commit) {
            let now = self.env.clock.now();
            match self.env.ledger.commit(reservation_id).await {
                Ok(_) | Err(InventoryError::AlreadyCommitted(_)) => {
                    let events = current.aggregate.commit_stock(now)?;
                    current = self.append(current, events).await?;
                    tracing::info!(%session_id, %reservation_id, "stock committed");
                }
                Err(InventoryError::ReservationExpired(_)) => {
                    return self
                        .fail(current, SessionFailure::ReservationExpired, now)
                        .await;
                }
                Err(
                    e @ (InventoryError::ReservationReleased(_)
                    | InventoryError::ReservationNotFound(_)),
                ) => {
                    let failure = SessionFailure::CommitRejected {
                        message: e.to_string(),
                    };
                    return self.fail(current, failure, now).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let request = self.order_request(&current.aggregate, reservation_id)?;
        let result = self.env.orders.create_order(request).await;
        let at = self.env.clock.now();
        let order_id = match result {
            Ok(order_id) => order_id,
            Err(e) => {
                let events = current.aggregate.record_order_failure(e.to_string(), at)?;
                self.append(current, events).await?;
                tracing::warn!(%session_id, error = %e, "order creation failed; session stays paid");
                return Err(e.into());
            }
        };

        let events = current.aggregate.finalize(order_id.clone(), at)?;
        let session = self.append(current, events).await?.aggregate;
        self.finish(&session).await;
        self.after_finalize(&session).await;

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("checkout_finalize_duration_seconds").record(duration);
        metrics::counter!("checkout_sessions_finalized_total").increment(1);
        tracing::info!(%session_id, %order_id, duration, "checkout session finalized");
        Ok(session)
    }

    /// Authorizes payment and, on approval, finalizes.
    ///
    /// A pending authorization returns the session still Reserved.
    pub async fn pay(&self, session_id: SessionId, method: &str) -> Result<CheckoutSession> {
        let session = self.authorize_payment(session_id, method).await?;
        if session.state() == SessionState::Paid {
            return self.finalize(session_id).await;
        }
        Ok(session)
    }

    /// Moves every non-terminal session past its deadline to its timeout branch.
    ///
    /// Sessions whose lock is held by an in-flight request are skipped and
    /// picked up by a later sweep. Paid sessions that already committed their
    /// stock are left for a finalize retry.
    #[tracing::instrument(skip(self))]
    pub async fn expire_idle_sessions(&self) -> SweepReport {
        let candidates: Vec<SessionId> =
            self.active_by_cart.lock().await.values().copied().collect();
        let mut report = SweepReport::default();

        for session_id in candidates {
            let Some(_guard) = self.locks.try_lock(&session_id).await else {
                continue;
            };
            if let Err(e) = self.sweep_session(session_id, &mut report).await {
                tracing::warn!(%session_id, error = %e, "failed to time out session");
            }
        }

        if !report.is_empty() {
            tracing::info!(
                abandoned = report.abandoned.len(),
                expired = report.expired.len(),
                failed = report.failed.len(),
                "idle sessions swept"
            );
        }
        report
    }

    async fn sweep_session(&self, session_id: SessionId, report: &mut SweepReport) -> Result<()> {
        let Some(current) = self.store.load(session_id).await? else {
            return Ok(());
        };
        let now = self.env.clock.now();
        if !current.aggregate.is_past_deadline(now) {
            return Ok(());
        }

        match current.aggregate.state() {
            SessionState::Draft => {
                let session = self.abandon(current, now).await?;
                self.finish(&session).await;
                report.abandoned.push(session_id);
            }
            SessionState::Reserved => {
                self.expire(current, now).await?;
                report.expired.push(session_id);
            }
            SessionState::Paid if !current.aggregate.has_completed(CheckoutStep::Commit) => {
                self.record_failure(current, SessionFailure::FinalizationTimedOut, now)
                    .await?;
                report.failed.push(session_id);
            }
            _ => {}
        }
        Ok(())
    }
}

// Internal helpers
impl CheckoutCoordinator {
    async fn load(&self, session_id: SessionId) -> Result<Versioned<CheckoutSession>> {
        self.store
            .load(session_id)
            .await?
            .ok_or(CheckoutError::SessionNotFound(session_id))
    }

    async fn append(
        &self,
        current: Versioned<CheckoutSession>,
        events: Vec<SessionEvent>,
    ) -> Result<Versioned<CheckoutSession>> {
        if events.is_empty() {
            return Ok(current);
        }
        let session_id = current
            .aggregate
            .id()
            .ok_or(SessionError::AlreadyCreated)?;
        Ok(self
            .store
            .append(session_id, current.version, events)
            .await?)
    }

    /// Rejects a command the session cannot accept, reporting a recorded
    /// failure or an expiry in preference to the state error.
    fn ensure(
        session: &CheckoutSession,
        allowed: fn(&SessionState) -> bool,
        action: &'static str,
    ) -> Result<()> {
        if let (Some(failure), Some(session_id)) = (session.failure(), session.id()) {
            return Err(CheckoutError::from_failure(session_id, failure));
        }
        match (session.state(), session.id()) {
            (SessionState::Expired, Some(session_id)) => {
                return Err(CheckoutError::ReservationExpired(session_id));
            }
            (SessionState::Abandoned, Some(session_id)) => {
                return Err(CheckoutError::SessionAbandoned(session_id));
            }
            _ => {}
        }
        if !allowed(&session.state()) {
            return Err(SessionError::InvalidTransition {
                current: session.state(),
                action,
            }
            .into());
        }
        Ok(())
    }

    /// Records a failure, compensates, and returns the matching error.
    async fn fail(
        &self,
        current: Versioned<CheckoutSession>,
        failure: SessionFailure,
        at: DateTime<Utc>,
    ) -> Result<CheckoutSession> {
        let session = self.record_failure(current, failure, at).await?;
        match (session.id(), session.failure()) {
            (Some(session_id), Some(failure)) => {
                Err(CheckoutError::from_failure(session_id, failure))
            }
            _ => Ok(session),
        }
    }

    async fn record_failure(
        &self,
        current: Versioned<CheckoutSession>,
        failure: SessionFailure,
        at: DateTime<Utc>,
    ) -> Result<CheckoutSession> {
        let events = current.aggregate.fail(failure.clone(), at)?;
        let session = self.append(current, events).await?.aggregate;

        self.release_reservation(&session).await;
        self.void_payment(&session).await;
        self.finish(&session).await;

        metrics::counter!("checkout_sessions_failed_total", "reason" => failure.code()).increment(1);
        tracing::warn!(session_id = ?session.id(), reason = failure.code(), %failure, "checkout session failed");
        Ok(session)
    }

    async fn expire(
        &self,
        current: Versioned<CheckoutSession>,
        at: DateTime<Utc>,
    ) -> Result<CheckoutSession> {
        let events = current.aggregate.expire(at)?;
        let session = self.append(current, events).await?.aggregate;

        self.release_reservation(&session).await;
        self.void_payment(&session).await;
        self.finish(&session).await;

        metrics::counter!("checkout_sessions_expired_total").increment(1);
        tracing::info!(session_id = ?session.id(), "checkout session expired");
        Ok(session)
    }

    /// Abandons a Draft session. The caller drops it from the cart index.
    async fn abandon(
        &self,
        current: Versioned<CheckoutSession>,
        at: DateTime<Utc>,
    ) -> Result<CheckoutSession> {
        let events = current.aggregate.abandon(at)?;
        let session = self.append(current, events).await?.aggregate;
        tracing::info!(session_id = ?session.id(), "draft session abandoned");
        Ok(session)
    }

    /// Decides what `initiate` does with the cart's indexed session.
    ///
    /// Returns the Draft to resume, or `None` when a new session should be
    /// opened. Called with the owner lock and the cart index held, so the
    /// session lock is only tried, never awaited.
    async fn resume_draft(
        &self,
        existing: SessionId,
        owner: &OwnerRef,
        cart: &Cart,
        now: DateTime<Utc>,
    ) -> Result<Option<CheckoutSession>> {
        let already_active = || CheckoutError::SessionAlreadyActive {
            session_id: existing,
        };
        let Some(current) = self.store.load(existing).await? else {
            return Ok(None);
        };
        if current.aggregate.is_terminal() {
            return Ok(None);
        }
        if current.aggregate.state() != SessionState::Draft
            || current.aggregate.owner() != Some(owner)
        {
            return Err(already_active());
        }

        let matches_cart = current.aggregate.lines() == cart.items()
            && current.aggregate.coupon_code() == cart.applied_coupon();
        if matches_cart && !current.aggregate.is_past_deadline(now) {
            return Ok(Some(current.aggregate));
        }

        let Some(_guard) = self.locks.try_lock(&existing).await else {
            return Err(already_active());
        };
        let current = self.load(existing).await?;
        match current.aggregate.state() {
            SessionState::Draft => {
                self.abandon(current, now).await?;
                Ok(None)
            }
            state if state.is_terminal() => Ok(None),
            _ => Err(already_active()),
        }
    }

    async fn release_reservation(&self, session: &CheckoutSession) {
        let Some(reservation_id) = session.reservation_id() else {
            return;
        };
        match self.env.ledger.release(reservation_id).await {
            Ok(outcome) => {
                tracing::debug!(%reservation_id, ?outcome, "reservation released");
            }
            Err(e) => {
                tracing::warn!(%reservation_id, error = %e, "failed to release reservation");
            }
        }
    }

    async fn void_payment(&self, session: &CheckoutSession) {
        let Some(payment_ref) = session.payment_ref() else {
            return;
        };
        if let Err(e) = self.env.payment.void(payment_ref).await {
            tracing::warn!(%payment_ref, error = %e, "failed to void payment");
        }
    }

    /// Drops a terminal session from the per-cart index.
    async fn finish(&self, session: &CheckoutSession) {
        let (Some(cart_id), Some(session_id)) = (session.cart_id(), session.id()) else {
            return;
        };
        let mut active = self.active_by_cart.lock().await;
        if active.get(&cart_id) == Some(&session_id) {
            active.remove(&cart_id);
        }
    }

    fn order_request(
        &self,
        session: &CheckoutSession,
        reservation_id: common::ReservationId,
    ) -> Result<OrderRequest> {
        let invalid = |action| SessionError::InvalidTransition {
            current: session.state(),
            action,
        };
        Ok(OrderRequest {
            session_id: session.id().ok_or(invalid("finalize without an id"))?,
            cart_id: session.cart_id().ok_or(invalid("finalize without a cart"))?,
            owner: session
                .owner()
                .cloned()
                .ok_or(invalid("finalize without an owner"))?,
            lines: session.lines().to_vec(),
            totals: session
                .totals()
                .cloned()
                .ok_or(invalid("finalize without totals"))?,
            reservation_id,
            payment_ref: session
                .payment_ref()
                .map(str::to_string)
                .ok_or(invalid("finalize without a payment"))?,
        })
    }

    /// Converts the cart and counts the coupon redemption. Failures here do
    /// not undo the order and are only logged.
    async fn after_finalize(&self, session: &CheckoutSession) {
        let (Some(owner), Some(cart_id), Some(session_id)) =
            (session.owner(), session.cart_id(), session.id())
        else {
            return;
        };
        if let Err(e) = self.carts.convert(owner, cart_id, session_id).await {
            tracing::warn!(%cart_id, error = %e, "failed to convert cart");
        }

        if let Some(totals) = session.totals().filter(|t| t.coupon_applied())
            && let Some(code) = totals.coupon_code.as_deref()
            && let Err(e) = self.env.coupons.record_redemption(code).await
        {
            tracing::warn!(code, error = %e, "failed to record coupon redemption");
        }
    }
}
