//! Catalog trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{LineKey, Money, SkuId, TaxCategory, VariantId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::CatalogError;

/// Current price and tax category of a SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPrice {
    pub price: Money,
    #[serde(default)]
    pub tax_category: TaxCategory,
}

/// Read access to product prices.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns the current price of a SKU, or of one of its variants.
    async fn current_price(
        &self,
        sku: &SkuId,
        variant: Option<&VariantId>,
    ) -> Result<CatalogPrice, CatalogError>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    prices: HashMap<LineKey, CatalogPrice>,
    fail_lookups: bool,
}

/// In-memory catalog for tests and the default server wiring.
///
/// A variant without its own entry falls back to the SKU's base price.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists a SKU (or variant) at a price.
    pub async fn set_price(
        &self,
        sku: impl Into<SkuId>,
        variant: Option<VariantId>,
        price: Money,
        tax_category: TaxCategory,
    ) {
        self.state.write().await.prices.insert(
            LineKey::new(sku, variant),
            CatalogPrice {
                price,
                tax_category,
            },
        );
    }

    /// Delists a SKU (or variant).
    pub async fn remove(&self, sku: impl Into<SkuId>, variant: Option<VariantId>) {
        self.state
            .write()
            .await
            .prices
            .remove(&LineKey::new(sku, variant));
    }

    /// Makes every lookup fail as if the catalog were down.
    pub async fn set_fail_lookups(&self, fail: bool) {
        self.state.write().await.fail_lookups = fail;
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn current_price(
        &self,
        sku: &SkuId,
        variant: Option<&VariantId>,
    ) -> Result<CatalogPrice, CatalogError> {
        let state = self.state.read().await;
        if state.fail_lookups {
            return Err(CatalogError::Unavailable("catalog lookups disabled".into()));
        }

        let key = LineKey::new(sku.clone(), variant.cloned());
        state
            .prices
            .get(&key)
            .or_else(|| {
                variant.and_then(|_| state.prices.get(&LineKey::new(sku.clone(), None)))
            })
            .cloned()
            .ok_or(CatalogError::NotFound(key))
    }
}
