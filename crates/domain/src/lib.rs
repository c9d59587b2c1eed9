//! Domain layer for the cart and checkout core.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-driven entities
//! - The pricing and coupon engine (pure)
//! - The cart aggregate with line merging and guest-cart absorption
//! - The checkout session state machine

pub mod aggregate;
pub mod cart;
pub mod error;
pub mod pricing;
pub mod session;
pub mod values;

pub use aggregate::{Aggregate, DomainEvent};
pub use cart::{
    Cart, CartError, CartEvent, CartStatus, ClampedLine, MAX_LINE_QUANTITY, MergeReport,
};
pub use error::DomainError;
pub use pricing::{
    Coupon, CouponConstraints, CouponKind, CouponRejection, LineTotals, PricedLine,
    PricingContext, Totals, compute_totals,
};
pub use session::{
    CheckoutSession, CheckoutStep, SessionError, SessionEvent, SessionFailure, SessionState,
};
pub use values::{
    CartLineItem, InvalidLineKey, LineKey, Money, OwnerRef, Rate, SkuId, StockShortage,
    TaxCategory, VariantId,
};
