//! Shipping estimates.

use async_trait::async_trait;
use domain::{Money, PricedLine};

use crate::error::ServiceError;

/// Estimates shipping for a set of lines.
#[async_trait]
pub trait ShippingQuotes: Send + Sync {
    /// Returns an estimate, or None when no estimate can be given yet.
    async fn estimate(&self, lines: &[PricedLine]) -> Result<Option<Money>, ServiceError>;
}

/// Flat-rate shipping, free above an optional threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatRateShipping {
    rate: Option<Money>,
    free_over: Option<Money>,
}

impl FlatRateShipping {
    /// No shipping estimate at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Charges `rate` on every non-empty order.
    pub fn new(rate: Money) -> Self {
        Self {
            rate: Some(rate),
            free_over: None,
        }
    }

    /// Waives shipping when the merchandise subtotal reaches `threshold`.
    pub fn free_over(mut self, threshold: Money) -> Self {
        self.free_over = Some(threshold);
        self
    }
}

#[async_trait]
impl ShippingQuotes for FlatRateShipping {
    async fn estimate(&self, lines: &[PricedLine]) -> Result<Option<Money>, ServiceError> {
        let Some(rate) = self.rate else {
            return Ok(None);
        };
        if lines.is_empty() {
            return Ok(None);
        }
        let subtotal: Money = lines.iter().map(PricedLine::line_total).sum();
        match self.free_over {
            Some(threshold) if subtotal >= threshold => Ok(Some(Money::zero())),
            _ => Ok(Some(rate)),
        }
    }
}
