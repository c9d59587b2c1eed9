//! HTTP route handlers.

pub mod cart;
pub mod checkout;
pub mod health;
pub mod identity;
pub mod metrics;

use std::sync::Arc;

use ::checkout::{CartMergeService, CartService, CheckoutCoordinator};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub carts: Arc<CartService>,
    pub merge: CartMergeService,
    pub checkout: Arc<CheckoutCoordinator>,
}
