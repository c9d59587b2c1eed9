//! Coupon directory.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::Coupon;
use tokio::sync::RwLock;

use crate::error::ServiceError;

/// Read access to coupons, plus redemption counting.
#[async_trait]
pub trait CouponDirectory: Send + Sync {
    /// Looks up a coupon by its exact code.
    async fn find(&self, code: &str) -> Result<Option<Coupon>, ServiceError>;

    /// Counts one redemption against the coupon's usage limit.
    async fn record_redemption(&self, code: &str) -> Result<(), ServiceError>;
}

/// In-memory coupon directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCoupons {
    coupons: Arc<RwLock<HashMap<String, Coupon>>>,
}

impl InMemoryCoupons {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a coupon.
    pub async fn insert(&self, coupon: Coupon) {
        self.coupons
            .write()
            .await
            .insert(coupon.code.clone(), coupon);
    }
}

#[async_trait]
impl CouponDirectory for InMemoryCoupons {
    async fn find(&self, code: &str) -> Result<Option<Coupon>, ServiceError> {
        Ok(self.coupons.read().await.get(code).cloned())
    }

    async fn record_redemption(&self, code: &str) -> Result<(), ServiceError> {
        let mut coupons = self.coupons.write().await;
        let coupon = coupons
            .get_mut(code)
            .ok_or_else(|| ServiceError::new("coupons", format!("unknown coupon {code}")))?;
        coupon.times_redeemed = coupon.times_redeemed.saturating_add(1);
        Ok(())
    }
}
