//! Order collaborator: receives the immutable order request of a finalized session.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CartId, ReservationId, SessionId};
use domain::{CartLineItem, OwnerRef, Totals};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ServiceError;

/// Everything the order system needs to create an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub session_id: SessionId,
    pub cart_id: CartId,
    pub owner: OwnerRef,
    pub lines: Vec<CartLineItem>,
    pub totals: Totals,
    pub reservation_id: ReservationId,
    pub payment_ref: String,
}

/// Trait for order creation.
#[async_trait]
pub trait Orders: Send + Sync {
    /// Creates an order and returns its id.
    ///
    /// Must be idempotent per session: a retry after a lost response returns
    /// the same order id.
    async fn create_order(&self, request: OrderRequest) -> Result<String, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryOrdersState {
    orders: HashMap<SessionId, (String, OrderRequest)>,
    next_id: u32,
    fail_on_create: bool,
}

/// In-memory order sink for tests and the default server wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrders {
    state: Arc<RwLock<InMemoryOrdersState>>,
}

impl InMemoryOrders {
    /// Creates an empty order sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sink to fail order creation.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Returns the number of orders created.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the request an order was created from.
    pub async fn order_for(&self, session_id: SessionId) -> Option<(String, OrderRequest)> {
        self.state.read().await.orders.get(&session_id).cloned()
    }
}

#[async_trait]
impl Orders for InMemoryOrders {
    async fn create_order(&self, request: OrderRequest) -> Result<String, ServiceError> {
        let mut state = self.state.write().await;

        if state.fail_on_create {
            return Err(ServiceError::new("orders", "order creation rejected"));
        }
        if let Some((order_id, _)) = state.orders.get(&request.session_id) {
            return Ok(order_id.clone());
        }

        state.next_id += 1;
        let order_id = format!("ORD-{:06}", state.next_id);
        state
            .orders
            .insert(request.session_id, (order_id.clone(), request));
        Ok(order_id)
    }
}
