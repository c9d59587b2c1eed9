//! Coupons and their eligibility rules.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::values::{Money, Rate, SkuId};

use super::PricedLine;

/// How a coupon reduces the price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CouponKind {
    /// A percentage of the applicable lines' subtotal.
    Percentage(Rate),
    /// A fixed amount taken off once.
    Fixed(Money),
}

/// Eligibility constraints attached to a coupon. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponConstraints {
    /// Minimum cart subtotal.
    pub min_subtotal: Option<Money>,

    /// Maximum cart subtotal.
    pub max_subtotal: Option<Money>,

    /// Restricts the coupon to these SKUs; None means every SKU.
    pub applicable_skus: Option<BTreeSet<SkuId>>,

    /// Total redemptions allowed across all customers.
    pub max_uses: Option<u32>,

    /// First instant the coupon may be used.
    pub valid_from: Option<DateTime<Utc>>,

    /// Instant after which the coupon is no longer accepted.
    pub expires_at: Option<DateTime<Utc>>,

    /// Upper bound on the discount of a percentage coupon.
    pub max_discount: Option<Money>,
}

/// A coupon as supplied by the coupon directory. Read-only to this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub kind: CouponKind,
    #[serde(default)]
    pub constraints: CouponConstraints,
    /// Redemptions recorded so far, compared against `max_uses`.
    #[serde(default)]
    pub times_redeemed: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Why a coupon was not applied. Never fatal: totals are still computed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("Coupon {code} does not exist")]
    UnknownCode { code: String },

    #[error("Coupon is inactive")]
    Inactive,

    #[error("Coupon is not valid until {valid_from}")]
    NotYetValid { valid_from: DateTime<Utc> },

    #[error("Coupon expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    #[error("Coupon usage limit of {max_uses} reached")]
    UsageLimitReached { max_uses: u32 },

    #[error("Minimum subtotal of {minimum} required (subtotal is {subtotal})")]
    BelowMinimumSubtotal { minimum: Money, subtotal: Money },

    #[error("Maximum subtotal of {maximum} exceeded (subtotal is {subtotal})")]
    AboveMaximumSubtotal { maximum: Money, subtotal: Money },

    #[error("Coupon does not apply to any item in the cart")]
    NoApplicableItems,
}

impl Coupon {
    /// Creates an unconstrained percentage coupon.
    pub fn percentage(code: impl Into<String>, rate: Rate) -> Self {
        Self {
            code: code.into(),
            kind: CouponKind::Percentage(rate),
            constraints: CouponConstraints::default(),
            times_redeemed: 0,
            active: true,
        }
    }

    /// Creates an unconstrained fixed-amount coupon.
    pub fn fixed(code: impl Into<String>, amount: Money) -> Self {
        Self {
            code: code.into(),
            kind: CouponKind::Fixed(amount),
            constraints: CouponConstraints::default(),
            times_redeemed: 0,
            active: true,
        }
    }

    /// Replaces the constraints.
    pub fn with_constraints(mut self, constraints: CouponConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Returns true if the coupon discounts the given SKU.
    pub fn applies_to(&self, sku: &SkuId) -> bool {
        self.constraints
            .applicable_skus
            .as_ref()
            .is_none_or(|skus| skus.contains(sku))
    }

    /// Checks every constraint against the current subtotal, lines and instant.
    ///
    /// Constraints are checked in a fixed order so the reported reason is
    /// stable for a given input.
    pub fn validate(
        &self,
        subtotal: Money,
        lines: &[PricedLine],
        at: DateTime<Utc>,
    ) -> Result<(), CouponRejection> {
        let c = &self.constraints;

        if !self.active {
            return Err(CouponRejection::Inactive);
        }
        if let Some(valid_from) = c.valid_from.filter(|from| at < *from) {
            return Err(CouponRejection::NotYetValid { valid_from });
        }
        if let Some(expired_at) = c.expires_at.filter(|until| at > *until) {
            return Err(CouponRejection::Expired { expired_at });
        }
        if let Some(max_uses) = c.max_uses.filter(|max| self.times_redeemed >= *max) {
            return Err(CouponRejection::UsageLimitReached { max_uses });
        }
        if let Some(minimum) = c.min_subtotal.filter(|min| subtotal < *min) {
            return Err(CouponRejection::BelowMinimumSubtotal { minimum, subtotal });
        }
        if let Some(maximum) = c.max_subtotal.filter(|max| subtotal > *max) {
            return Err(CouponRejection::AboveMaximumSubtotal { maximum, subtotal });
        }
        if !lines.iter().any(|line| self.applies_to(&line.sku)) {
            return Err(CouponRejection::NoApplicableItems);
        }
        Ok(())
    }

    /// Discount granted on the subtotal of the applicable lines.
    ///
    /// Never exceeds that subtotal, so the total cannot go negative.
    pub fn discount_for(&self, applicable_subtotal: Money) -> Money {
        let raw = match &self.kind {
            CouponKind::Percentage(rate) => {
                let discount = applicable_subtotal.apply_rate(*rate);
                match self.constraints.max_discount {
                    Some(cap) => discount.min(cap),
                    None => discount,
                }
            }
            CouponKind::Fixed(amount) => *amount,
        };
        raw.clamp(Money::zero(), applicable_subtotal.max(Money::zero()))
    }
}
