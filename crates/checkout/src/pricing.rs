//! Authoritative repricing of cart lines.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use domain::{
    CartLineItem, LineKey, PricedLine, PricingContext, TaxCategory, Totals, compute_totals,
};
use serde::{Deserialize, Serialize};

use crate::environment::CheckoutEnvironment;
use crate::error::{CatalogError, CheckoutError};

/// Totals of the lines that could be priced, plus the lines that could not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repricing {
    pub totals: Totals,
    /// Lines the catalog no longer lists; excluded from `totals`.
    pub unavailable: Vec<LineKey>,
}

/// Fetches current prices, tax rates, coupon and shipping estimate, then runs
/// the pure totals computation.
///
/// Unit price snapshots on cart lines are ignored.
#[derive(Clone)]
pub struct Repricer {
    env: CheckoutEnvironment,
    jurisdiction: String,
}

impl Repricer {
    /// Creates a repricer for a tax jurisdiction.
    pub fn new(env: CheckoutEnvironment, jurisdiction: impl Into<String>) -> Self {
        Self {
            env,
            jurisdiction: jurisdiction.into(),
        }
    }

    /// Prices `lines` at `at` with an optional coupon code.
    ///
    /// Transient collaborator failures are returned as errors; a SKU missing
    /// from the catalog is reported in `unavailable` instead.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn reprice(
        &self,
        lines: &[CartLineItem],
        coupon_code: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Repricing, CheckoutError> {
        let mut priced = Vec::with_capacity(lines.len());
        let mut unavailable = Vec::new();

        for line in lines {
            match self
                .env
                .catalog
                .current_price(&line.sku, line.variant.as_ref())
                .await
            {
                Ok(price) => priced.push(PricedLine::new(
                    line.sku.clone(),
                    line.variant.clone(),
                    line.quantity,
                    price.price,
                    price.tax_category,
                )),
                Err(CatalogError::NotFound(key)) => unavailable.push(key),
                Err(e) => return Err(e.into()),
            }
        }

        let categories: BTreeSet<&TaxCategory> =
            priced.iter().map(|line| &line.tax_category).collect();
        let mut tax_rates = BTreeMap::new();
        for category in categories {
            let rate = self
                .env
                .tax
                .tax_rate(&self.jurisdiction, category)
                .await?;
            tax_rates.insert(category.clone(), rate);
        }

        let context = PricingContext {
            tax_rates,
            shipping_estimate: self.env.shipping.estimate(&priced).await?,
            priced_at: at,
        };

        let totals = match coupon_code {
            None => compute_totals(&priced, None, &context),
            Some(code) => match self.env.coupons.find(code).await? {
                Some(coupon) => compute_totals(&priced, Some(&coupon), &context),
                None => compute_totals(&priced, None, &context).with_unknown_coupon(code),
            },
        };

        Ok(Repricing {
            totals,
            unavailable,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::ManualClock;
    use domain::{Coupon, CouponRejection, Money, Rate, VariantId};

    use super::*;
    use crate::environment::InMemoryCollaborators;
    use crate::services::FlatRateShipping;

    fn line(sku: &str, quantity: u32, snapshot: i64) -> CartLineItem {
        CartLineItem::new(sku, None, quantity, Money::from_cents(snapshot), Utc::now())
    }

    async fn collaborators() -> InMemoryCollaborators {
        let collaborators = InMemoryCollaborators::new(Arc::new(ManualClock::default()));
        collaborators
            .catalog
            .set_price("X", None, Money::from_cents(1000), TaxCategory::standard())
            .await;
        collaborators
            .catalog
            .set_price("BOOK", None, Money::from_cents(2000), TaxCategory::new("books"))
            .await;
        collaborators
            .tax
            .set_rate("default", TaxCategory::standard(), Rate::from_percent(10))
            .await;
        collaborators
            .coupons
            .insert(Coupon::percentage("SAVE10", Rate::from_percent(10)))
            .await;
        collaborators
    }

    #[tokio::test]
    async fn test_uses_catalog_price_not_snapshot() {
        let collaborators = collaborators().await;
        let repricer = Repricer::new(collaborators.environment(), "default");

        let result = repricer
            .reprice(&[line("X", 2, 1)], Some("SAVE10"), Utc::now())
            .await
            .unwrap();

        assert_eq!(result.totals.subtotal, Money::from_cents(2000));
        assert_eq!(result.totals.discount, Money::from_cents(200));
        assert_eq!(result.totals.tax, Money::from_cents(180));
        assert_eq!(result.totals.total, Money::from_cents(1980));
        assert!(result.unavailable.is_empty());
    }

    #[tokio::test]
    async fn test_rates_per_category_and_shipping() {
        let collaborators = collaborators()
            .await
            .with_shipping(FlatRateShipping::new(Money::from_cents(500)));
        let repricer = Repricer::new(collaborators.environment(), "default");

        let result = repricer
            .reprice(&[line("X", 1, 0), line("BOOK", 1, 0)], None, Utc::now())
            .await
            .unwrap();

        // Books have no rate in this jurisdiction.
        assert_eq!(result.totals.tax, Money::from_cents(100));
        assert_eq!(result.totals.shipping_estimate, Some(Money::from_cents(500)));
        assert_eq!(result.totals.total, Money::from_cents(3600));
    }

    #[tokio::test]
    async fn test_delisted_lines_are_reported() {
        let collaborators = collaborators().await;
        let repricer = Repricer::new(collaborators.environment(), "default");
        let variant = CartLineItem::new(
            "GONE",
            Some(VariantId::new("red")),
            1,
            Money::from_cents(100),
            Utc::now(),
        );

        let result = repricer
            .reprice(&[line("X", 1, 0), variant], None, Utc::now())
            .await
            .unwrap();

        assert_eq!(result.unavailable, vec![LineKey::new("GONE", Some(VariantId::new("red")))]);
        assert_eq!(result.totals.subtotal, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_unknown_coupon_is_non_fatal() {
        let collaborators = collaborators().await;
        let repricer = Repricer::new(collaborators.environment(), "default");

        let result = repricer
            .reprice(&[line("X", 1, 0)], Some("NOPE"), Utc::now())
            .await
            .unwrap();

        assert_eq!(result.totals.discount, Money::zero());
        assert_eq!(
            result.totals.coupon_rejected,
            Some(CouponRejection::UnknownCode {
                code: "NOPE".into()
            })
        );
    }

    #[tokio::test]
    async fn test_catalog_outage_is_an_error() {
        let collaborators = collaborators().await;
        collaborators.catalog.set_fail_lookups(true).await;
        let repricer = Repricer::new(collaborators.environment(), "default");

        let result = repricer.reprice(&[line("X", 1, 0)], None, Utc::now()).await;
        assert!(matches!(
            result,
            Err(CheckoutError::Catalog(CatalogError::Unavailable(_)))
        ));
    }
}
