//! Start-up data for the in-memory collaborators.

use std::path::Path;

use checkout::InMemoryCollaborators;
use domain::{Coupon, Money, Rate, SkuId, TaxCategory, VariantId};
use inventory::{InventoryError, StockLedger};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading seed data.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to stock seed product: {0}")]
    Inventory(#[from] InventoryError),
}

/// Catalog prices, stock levels, tax rates and coupons.
///
/// ```json
/// {
///   "products": [{"sku": "X", "price_cents": 1000, "stock": 5}],
///   "tax_rates": [{"category": "standard", "basis_points": 825}],
///   "coupons": [{"code": "SAVE10", "kind": {"type": "percentage", "value": 1000}}]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub tax_rates: Vec<SeedTaxRate>,
    #[serde(default)]
    pub coupons: Vec<Coupon>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedProduct {
    pub sku: String,
    #[serde(default)]
    pub variant: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub tax_category: Option<String>,
    /// Units received into the ledger. Stock is tracked per SKU, so variants
    /// of one SKU share it.
    #[serde(default)]
    pub stock: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedTaxRate {
    /// Falls back to the configured jurisdiction.
    #[serde(default)]
    pub jurisdiction: Option<String>,
    pub category: String,
    pub basis_points: u32,
}

impl Seed {
    /// Reads a seed file.
    pub async fn load(path: &Path) -> Result<Self, SeedError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Loads the seed into the collaborators.
    pub async fn apply(
        &self,
        collaborators: &InMemoryCollaborators,
        jurisdiction: &str,
    ) -> Result<(), SeedError> {
        for product in &self.products {
            let category = product
                .tax_category
                .as_deref()
                .map(TaxCategory::new)
                .unwrap_or_else(TaxCategory::standard);
            collaborators
                .catalog
                .set_price(
                    product.sku.as_str(),
                    product.variant.as_deref().map(VariantId::new),
                    Money::from_cents(product.price_cents),
                    category,
                )
                .await;
            if product.stock > 0 {
                collaborators
                    .ledger
                    .receive(&SkuId::new(product.sku.as_str()), product.stock)
                    .await?;
            }
        }

        for rate in &self.tax_rates {
            collaborators
                .tax
                .set_rate(
                    rate.jurisdiction.as_deref().unwrap_or(jurisdiction),
                    TaxCategory::new(rate.category.as_str()),
                    Rate::from_basis_points(rate.basis_points),
                )
                .await;
        }

        for coupon in &self.coupons {
            collaborators.coupons.insert(coupon.clone()).await;
        }

        tracing::info!(
            products = self.products.len(),
            tax_rates = self.tax_rates.len(),
            coupons = self.coupons.len(),
            "seed data loaded"
        );
        Ok(())
    }
}
