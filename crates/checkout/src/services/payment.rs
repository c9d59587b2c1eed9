//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::SessionId;
use domain::Money;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::PaymentError;

/// An authorization request. The idempotency key makes retries safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub session_id: SessionId,
    pub amount: Money,
    pub method: String,
    pub idempotency_key: String,
}

/// Whether the provider settled the authorization immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Approved,
    Pending,
}

/// Result of an accepted authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub payment_ref: String,
    pub status: AuthorizationStatus,
}

/// Trait for payment provider operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Authorizes an amount. A repeated idempotency key returns the first
    /// authorization instead of charging again.
    async fn authorize(&self, request: PaymentRequest) -> Result<Authorization, PaymentError>;

    /// Voids an authorization (or refunds a captured one).
    async fn void(&self, payment_ref: &str) -> Result<(), PaymentError>;
}

/// Behavior of the in-memory gateway for the next authorizations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GatewayMode {
    #[default]
    Approve,
    Pending,
    Decline(String),
    Fail(String),
}

/// Status of an in-memory payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Authorized,
    Pending,
    Voided,
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<String, (Money, PaymentStatus)>,
    by_key: HashMap<String, Authorization>,
    next_id: u32,
    mode: GatewayMode,
    fail_on_void: bool,
}

/// In-memory payment gateway for tests and the default server wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a gateway that approves everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how subsequent authorizations are answered.
    pub async fn set_mode(&self, mode: GatewayMode) {
        self.state.write().await.mode = mode;
    }

    /// Makes `void` fail.
    pub async fn set_fail_on_void(&self, fail: bool) {
        self.state.write().await.fail_on_void = fail;
    }

    /// Returns the status of a payment.
    pub async fn status(&self, payment_ref: &str) -> Option<PaymentStatus> {
        self.state
            .read()
            .await
            .payments
            .get(payment_ref)
            .map(|(_, status)| *status)
    }

    /// Returns the number of payments ever accepted.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn authorize(&self, request: PaymentRequest) -> Result<Authorization, PaymentError> {
        let mut state = self.state.write().await;

        if let Some(existing) = state.by_key.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let status = match &state.mode {
            GatewayMode::Approve => AuthorizationStatus::Approved,
            GatewayMode::Pending => AuthorizationStatus::Pending,
            GatewayMode::Decline(message) => return Err(PaymentError::Declined(message.clone())),
            GatewayMode::Fail(message) => return Err(PaymentError::Gateway(message.clone())),
        };

        state.next_id += 1;
        let payment_ref = format!("PAY-{:04}", state.next_id);
        let payment_status = match status {
            AuthorizationStatus::Approved => PaymentStatus::Authorized,
            AuthorizationStatus::Pending => PaymentStatus::Pending,
        };
        state
            .payments
            .insert(payment_ref.clone(), (request.amount, payment_status));

        let authorization = Authorization {
            payment_ref,
            status,
        };
        state
            .by_key
            .insert(request.idempotency_key, authorization.clone());
        Ok(authorization)
    }

    async fn void(&self, payment_ref: &str) -> Result<(), PaymentError> {
        let mut state = self.state.write().await;
        if state.fail_on_void {
            return Err(PaymentError::Gateway("void failed".into()));
        }
        if let Some((_, status)) = state.payments.get_mut(payment_ref) {
            *status = PaymentStatus::Voided;
        }
        Ok(())
    }
}
