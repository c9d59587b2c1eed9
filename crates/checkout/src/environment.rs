//! Collaborators shared by the cart and checkout services.

use std::sync::Arc;

use common::{Clock, SystemClock};
use inventory::{InMemoryStockLedger, StockLedger};

use crate::services::{
    Catalog, CouponDirectory, FlatRateShipping, InMemoryCatalog, InMemoryCoupons,
    InMemoryOrders, InMemoryPaymentGateway, InMemoryTaxRates, Orders, PaymentGateway,
    ShippingQuotes, TaxRates,
};

/// Every external dependency of the services, injected at construction.
///
/// Cloning is cheap; all fields are shared handles.
#[derive(Clone)]
pub struct CheckoutEnvironment {
    pub ledger: Arc<dyn StockLedger>,
    pub catalog: Arc<dyn Catalog>,
    pub tax: Arc<dyn TaxRates>,
    pub payment: Arc<dyn PaymentGateway>,
    pub orders: Arc<dyn Orders>,
    pub coupons: Arc<dyn CouponDirectory>,
    pub shipping: Arc<dyn ShippingQuotes>,
    pub clock: Arc<dyn Clock>,
}

/// In-memory collaborators with their concrete handles kept for seeding and
/// inspection.
#[derive(Clone)]
pub struct InMemoryCollaborators {
    pub ledger: InMemoryStockLedger,
    pub catalog: InMemoryCatalog,
    pub tax: InMemoryTaxRates,
    pub payment: InMemoryPaymentGateway,
    pub orders: InMemoryOrders,
    pub coupons: InMemoryCoupons,
    pub shipping: FlatRateShipping,
    pub clock: Arc<dyn Clock>,
}

impl InMemoryCollaborators {
    /// Creates empty collaborators sharing one clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: InMemoryStockLedger::with_clock(Arc::clone(&clock)),
            catalog: InMemoryCatalog::new(),
            tax: InMemoryTaxRates::new(),
            payment: InMemoryPaymentGateway::new(),
            orders: InMemoryOrders::new(),
            coupons: InMemoryCoupons::new(),
            shipping: FlatRateShipping::none(),
            clock,
        }
    }

    /// Replaces the shipping estimator.
    pub fn with_shipping(mut self, shipping: FlatRateShipping) -> Self {
        self.shipping = shipping;
        self
    }

    /// Builds the environment the services consume.
    pub fn environment(&self) -> CheckoutEnvironment {
        CheckoutEnvironment {
            ledger: Arc::new(self.ledger.clone()),
            catalog: Arc::new(self.catalog.clone()),
            tax: Arc::new(self.tax.clone()),
            payment: Arc::new(self.payment.clone()),
            orders: Arc::new(self.orders.clone()),
            coupons: Arc::new(self.coupons.clone()),
            shipping: Arc::new(self.shipping),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl Default for InMemoryCollaborators {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
