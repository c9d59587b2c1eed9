//! Pricing and coupon engine.
//!
//! Everything here is pure: prices, rates and the pricing instant are
//! inputs, and nothing is cached between calls.

mod coupon;
mod totals;

pub use coupon::{Coupon, CouponConstraints, CouponKind, CouponRejection};
pub use totals::{LineTotals, PricedLine, PricingContext, Totals, compute_totals};
