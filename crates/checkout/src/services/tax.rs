//! Tax rate lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{Rate, TaxCategory};
use tokio::sync::RwLock;

use crate::error::ServiceError;

/// Supplies tax rates per jurisdiction and category.
#[async_trait]
pub trait TaxRates: Send + Sync {
    /// Returns the rate for a category. Unknown categories are untaxed.
    async fn tax_rate(&self, jurisdiction: &str, category: &TaxCategory)
    -> Result<Rate, ServiceError>;
}

/// In-memory rate table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaxRates {
    rates: Arc<RwLock<HashMap<(String, TaxCategory), Rate>>>,
}

impl InMemoryTaxRates {
    /// Creates an empty table; every category is untaxed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a rate.
    pub async fn set_rate(
        &self,
        jurisdiction: impl Into<String>,
        category: TaxCategory,
        rate: Rate,
    ) {
        self.rates
            .write()
            .await
            .insert((jurisdiction.into(), category), rate);
    }
}

#[async_trait]
impl TaxRates for InMemoryTaxRates {
    async fn tax_rate(
        &self,
        jurisdiction: &str,
        category: &TaxCategory,
    ) -> Result<Rate, ServiceError> {
        let rates = self.rates.read().await;
        Ok(rates
            .get(&(jurisdiction.to_string(), category.clone()))
            .copied()
            .unwrap_or(Rate::ZERO))
    }
}
