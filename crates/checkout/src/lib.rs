//! Cart and checkout services.
//!
//! This crate wires the domain aggregates to the stock ledger and the
//! external collaborators:
//! - `CartService`: owner-scoped carts with advisory stock checks
//! - `CartMergeService`: guest-cart merge at login
//! - `CheckoutCoordinator`: the checkout session state machine
//! - `Sweeper`: background expiry of idle sessions and reservations

pub mod cart_service;
pub mod config;
pub mod coordinator;
pub mod environment;
pub mod error;
pub mod merge;
pub mod pricing;
pub mod repository;
pub mod services;
pub mod sweeper;

pub use cart_service::{CartService, CartSnapshot};
pub use config::CheckoutConfig;
pub use coordinator::{CheckoutCoordinator, SweepReport};
pub use environment::{CheckoutEnvironment, InMemoryCollaborators};
pub use error::{CatalogError, CheckoutError, PaymentError, Result, ServiceError, StoreError};
pub use merge::{CartMergeService, MergeOutcome};
pub use pricing::{Repricer, Repricing};
pub use repository::{AggregateStore, InMemoryAggregateStore, Versioned};
pub use services::{
    Authorization, AuthorizationStatus, Catalog, CatalogPrice, CouponDirectory, FlatRateShipping,
    GatewayMode, InMemoryCatalog, InMemoryCoupons, InMemoryOrders, InMemoryPaymentGateway,
    InMemoryTaxRates, OrderRequest, Orders, PaymentGateway, PaymentRequest, PaymentStatus,
    ShippingQuotes, TaxRates,
};
pub use sweeper::{SweepOutcome, Sweeper};
