//! External collaborator traits and in-memory implementations.

pub mod catalog;
pub mod coupons;
pub mod orders;
pub mod payment;
pub mod shipping;
pub mod tax;

pub use catalog::{Catalog, CatalogPrice, InMemoryCatalog};
pub use coupons::{CouponDirectory, InMemoryCoupons};
pub use orders::{InMemoryOrders, OrderRequest, Orders};
pub use payment::{
    Authorization, AuthorizationStatus, GatewayMode, InMemoryPaymentGateway, PaymentGateway,
    PaymentRequest, PaymentStatus,
};
pub use shipping::{FlatRateShipping, ShippingQuotes};
pub use tax::{InMemoryTaxRates, TaxRates};
