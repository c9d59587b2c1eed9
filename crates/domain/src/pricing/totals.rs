//! Totals computation: subtotal, coupon discount, tax and shipping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::values::{LineKey, Money, Rate, SkuId, TaxCategory, VariantId};

use super::{Coupon, CouponRejection};

/// A cart line with a freshly fetched unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub sku: SkuId,
    pub variant: Option<VariantId>,
    pub quantity: u32,
    pub unit_price: Money,
    pub tax_category: TaxCategory,
}

impl PricedLine {
    /// Creates a priced line.
    pub fn new(
        sku: impl Into<SkuId>,
        variant: Option<VariantId>,
        quantity: u32,
        unit_price: Money,
        tax_category: TaxCategory,
    ) -> Self {
        Self {
            sku: sku.into(),
            variant,
            quantity,
            unit_price,
            tax_category,
        }
    }

    /// Returns the identity of this line.
    pub fn key(&self) -> LineKey {
        LineKey::new(self.sku.clone(), self.variant.clone())
    }

    /// Quantity times unit price.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Everything besides lines and coupon that pricing depends on.
///
/// The pricing instant is explicit so a computation can be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingContext {
    /// Tax rate per category. A category without a rate is taxed at zero.
    pub tax_rates: BTreeMap<TaxCategory, Rate>,
    pub shipping_estimate: Option<Money>,
    pub priced_at: DateTime<Utc>,
}

impl PricingContext {
    /// A context with no taxes and no shipping.
    pub fn untaxed(priced_at: DateTime<Utc>) -> Self {
        Self {
            tax_rates: BTreeMap::new(),
            shipping_estimate: None,
            priced_at,
        }
    }

    /// Sets the rate for one category.
    pub fn with_rate(mut self, category: TaxCategory, rate: Rate) -> Self {
        self.tax_rates.insert(category, rate);
        self
    }

    /// Sets the shipping estimate.
    pub fn with_shipping(mut self, estimate: Money) -> Self {
        self.shipping_estimate = Some(estimate);
        self
    }

    fn rate_for(&self, category: &TaxCategory) -> Rate {
        self.tax_rates.get(category).copied().unwrap_or(Rate::ZERO)
    }
}

/// Per-line breakdown of a computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTotals {
    pub sku: SkuId,
    pub variant: Option<VariantId>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
    /// Share of the coupon discount allocated to this line.
    pub discount: Money,
    pub tax_category: TaxCategory,
    pub tax_rate: Rate,
    pub tax: Money,
}

/// Result of a pricing computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub shipping_estimate: Option<Money>,
    pub total: Money,
    /// Code of the coupon that was evaluated, applied or not.
    pub coupon_code: Option<String>,
    pub coupon_rejected: Option<CouponRejection>,
    pub lines: Vec<LineTotals>,
    pub priced_at: DateTime<Utc>,
}

impl Totals {
    /// Records that the requested coupon code could not be found.
    ///
    /// Used when the coupon directory has no entry for an applied code; the
    /// totals themselves are unaffected.
    pub fn with_unknown_coupon(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        self.coupon_rejected = Some(CouponRejection::UnknownCode { code: code.clone() });
        self.coupon_code = Some(code);
        self
    }

    /// Returns true if a coupon was evaluated and granted a discount.
    pub fn coupon_applied(&self) -> bool {
        self.coupon_code.is_some() && self.coupon_rejected.is_none()
    }
}

/// Computes totals for a set of priced lines and an optional coupon.
///
/// Pure: the same lines, coupon and context always produce the same totals.
/// Tax is charged on each line's amount net of its share of the discount,
/// so lines in different tax categories are taxed on what the buyer pays.
pub fn compute_totals(
    lines: &[PricedLine],
    coupon: Option<&Coupon>,
    context: &PricingContext,
) -> Totals {
    let line_totals: Vec<Money> = lines.iter().map(PricedLine::line_total).collect();
    let subtotal: Money = line_totals.iter().copied().sum();

    let (discount, coupon_rejected) = match coupon {
        None => (Money::zero(), None),
        Some(coupon) => match coupon.validate(subtotal, lines, context.priced_at) {
            Ok(()) => {
                let applicable: Money = lines
                    .iter()
                    .zip(&line_totals)
                    .filter(|(line, _)| coupon.applies_to(&line.sku))
                    .map(|(_, total)| *total)
                    .sum();
                (coupon.discount_for(applicable), None)
            }
            Err(rejection) => (Money::zero(), Some(rejection)),
        },
    };

    let allocations = allocate_discount(lines, &line_totals, coupon, discount);

    let breakdown: Vec<LineTotals> = lines
        .iter()
        .zip(line_totals.iter().zip(&allocations))
        .map(|(line, (line_total, line_discount))| {
            let tax_rate = context.rate_for(&line.tax_category);
            LineTotals {
                sku: line.sku.clone(),
                variant: line.variant.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: *line_total,
                discount: *line_discount,
                tax_category: line.tax_category.clone(),
                tax_rate,
                tax: (*line_total - *line_discount).apply_rate(tax_rate),
            }
        })
        .collect();

    let tax: Money = breakdown.iter().map(|line| line.tax).sum();
    let shipping = context.shipping_estimate.unwrap_or_default();

    Totals {
        subtotal,
        discount,
        tax,
        shipping_estimate: context.shipping_estimate,
        total: subtotal - discount + tax + shipping,
        coupon_code: coupon.map(|c| c.code.clone()),
        coupon_rejected,
        lines: breakdown,
        priced_at: context.priced_at,
    }
}

/// Splits `discount` across the lines the coupon applies to, in proportion to
/// their totals. The last applicable line absorbs the rounding remainder so
/// the allocations sum exactly to `discount`.
fn allocate_discount(
    lines: &[PricedLine],
    line_totals: &[Money],
    coupon: Option<&Coupon>,
    discount: Money,
) -> Vec<Money> {
    let mut allocations = vec![Money::zero(); lines.len()];
    let Some(coupon) = coupon else {
        return allocations;
    };
    if discount.is_zero() {
        return allocations;
    }

    let applicable: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| coupon.applies_to(&line.sku))
        .map(|(i, _)| i)
        .collect();
    let base: Money = applicable.iter().map(|&i| line_totals[i]).sum();

    let mut remaining = discount;
    if let Some((&last, rest)) = applicable.split_last() {
        for &i in rest {
            let share = discount.share(line_totals[i], base);
            allocations[i] = share;
            remaining -= share;
        }
        allocations[last] = remaining;
    }
    allocations
}
