//! HTTP API server for the cart and checkout core.
//!
//! Provides REST endpoints for carts, guest-cart merge and checkout
//! sessions, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::{
    CartMergeService, CartService, CheckoutConfig, CheckoutCoordinator, InMemoryCollaborators,
    Sweeper,
};
use common::Clock;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::get).delete(routes::cart::clear))
        .route("/cart/items", post(routes::cart::add_item))
        .route(
            "/cart/items/{line_key}",
            axum::routing::patch(routes::cart::update_quantity).delete(routes::cart::remove_item),
        )
        .route(
            "/cart/coupon",
            put(routes::cart::apply_coupon).delete(routes::cart::remove_coupon),
        )
        .route("/cart/merge", post(routes::cart::merge))
        .route("/checkout/initiate", post(routes::checkout::initiate))
        .route("/checkout/pay", post(routes::checkout::pay))
        .route("/checkout/session/{id}", get(routes::checkout::get))
        .route(
            "/checkout/session/{id}/finalize",
            post(routes::checkout::finalize),
        )
        .route(
            "/checkout/session/{id}/payment",
            post(routes::checkout::settle_payment),
        )
        .route("/checkout/session/{id}/events", get(routes::checkout::events))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Application state wired to in-memory collaborators.
///
/// The collaborators are returned alongside so callers can seed them and
/// hand the ledger to a [`Sweeper`].
pub fn create_default_state(
    config: CheckoutConfig,
    clock: Arc<dyn Clock>,
) -> (Arc<AppState>, InMemoryCollaborators) {
    let collaborators = InMemoryCollaborators::new(clock);
    let env = collaborators.environment();

    let carts = Arc::new(CartService::in_memory(env.clone(), &config));
    let checkout = Arc::new(CheckoutCoordinator::in_memory(
        env,
        config,
        Arc::clone(&carts),
    ));
    let merge = CartMergeService::new(Arc::clone(&carts), Arc::clone(&checkout));

    let state = Arc::new(AppState {
        carts,
        merge,
        checkout,
    });
    (state, collaborators)
}

/// Builds the background sweeper for the state's sessions and the
/// collaborators' ledger.
pub fn create_sweeper(state: &AppState, collaborators: &InMemoryCollaborators) -> Sweeper {
    Sweeper::new(
        Arc::clone(&state.checkout),
        collaborators.environment().ledger,
        state.checkout.config().sweep_interval,
    )
}
