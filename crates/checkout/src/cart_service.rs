//! Cart service: owner-scoped cart commands with advisory stock checks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{CartId, KeyedLocks, SessionId};
use domain::{
    Aggregate, Cart, CartError, CartEvent, CartLineItem, CartStatus, LineKey, OwnerRef, SkuId,
    Totals, VariantId,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedMutexGuard, RwLock};

use crate::config::CheckoutConfig;
use crate::environment::CheckoutEnvironment;
use crate::error::{CatalogError, CheckoutError, Result};
use crate::pricing::Repricer;
use crate::repository::{AggregateStore, InMemoryAggregateStore, Versioned};

/// A cart's lines together with freshly computed totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// None until the owner adds a first item.
    pub cart_id: Option<CartId>,
    pub owner: OwnerRef,
    pub status: CartStatus,
    pub items: Vec<CartLineItem>,
    pub applied_coupon: Option<String>,
    pub totals: Totals,
    /// Lines the catalog no longer lists; excluded from `totals`.
    pub unavailable: Vec<LineKey>,
    pub last_mutated_at: Option<DateTime<Utc>>,
}

/// Service for managing carts.
///
/// Each owner has at most one active cart. Commands for one owner are
/// serialized; different owners never contend.
pub struct CartService {
    env: CheckoutEnvironment,
    store: Arc<dyn AggregateStore<Cart>>,
    owners: RwLock<HashMap<OwnerRef, CartId>>,
    locks: KeyedLocks<OwnerRef>,
    repricer: Repricer,
}

impl CartService {
    /// Creates a cart service over the given store.
    pub fn new(
        env: CheckoutEnvironment,
        store: Arc<dyn AggregateStore<Cart>>,
        config: &CheckoutConfig,
    ) -> Self {
        let repricer = Repricer::new(env.clone(), config.jurisdiction.clone());
        Self {
            env,
            store,
            owners: RwLock::new(HashMap::new()),
            locks: KeyedLocks::new(),
            repricer,
        }
    }

    /// Creates a cart service backed by an in-memory store.
    pub fn in_memory(env: CheckoutEnvironment, config: &CheckoutConfig) -> Self {
        Self::new(env, Arc::new(InMemoryAggregateStore::<Cart>::new()), config)
    }

    /// Returns the owner's active cart, if any.
    pub async fn cart_for(&self, owner: &OwnerRef) -> Result<Option<Cart>> {
        Ok(self.active_cart(owner).await?.map(|v| v.aggregate))
    }

    /// Returns a cart by id, whatever its status.
    pub async fn get_cart(&self, cart_id: CartId) -> Result<Option<Cart>> {
        Ok(self.store.load(cart_id).await?.map(|v| v.aggregate))
    }

    /// Returns the event history of a cart.
    pub async fn history(&self, cart_id: CartId) -> Result<Vec<CartEvent>> {
        Ok(self.store.history(cart_id).await?)
    }

    /// Returns the owner's cart with totals repriced from the catalog.
    #[tracing::instrument(skip(self))]
    pub async fn snapshot(&self, owner: &OwnerRef) -> Result<CartSnapshot> {
        let cart = self.cart_for(owner).await?.unwrap_or_default();
        self.snapshot_of(owner, &cart).await
    }

    /// Adds an item, summing into an existing line with the same key.
    ///
    /// The unit price snapshot comes from the catalog. The resulting line
    /// quantity is checked against available stock, advisorily.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        owner: &OwnerRef,
        sku: SkuId,
        variant: Option<VariantId>,
        quantity: u32,
    ) -> Result<CartSnapshot> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity: 0 }.into());
        }
        let price = match self
            .env
            .catalog
            .current_price(&sku, variant.as_ref())
            .await
        {
            Ok(price) => price,
            Err(CatalogError::NotFound(key)) => {
                return Err(CheckoutError::Validation(format!("Unknown product: {key}")));
            }
            Err(e) => return Err(e.into()),
        };

        let _guard = self.lock(owner).await;
        let now = self.env.clock.now();
        let current = match self.active_cart(owner).await? {
            Some(current) => current,
            None => self.open_cart(owner, now).await?,
        };

        let key = LineKey::new(sku.clone(), variant.clone());
        let resulting = u64::from(current.aggregate.quantity_of(&key)) + u64::from(quantity);
        self.ensure_available(&sku, resulting).await?;

        let line = CartLineItem::new(sku, variant, quantity, price.price, now);
        let events = current.aggregate.add_item(line)?;
        let cart = self.persist(current, events).await?;

        metrics::counter!("cart_mutations_total", "operation" => "add_item").increment(1);
        tracing::info!(%owner, %key, quantity, "item added to cart");
        self.snapshot_of(owner, &cart).await
    }

    /// Sets a line's quantity. Zero removes the line; increases are checked
    /// against available stock.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        owner: &OwnerRef,
        key: &LineKey,
        new_quantity: i64,
    ) -> Result<CartSnapshot> {
        let _guard = self.lock(owner).await;
        let current = self.require_active(owner).await?;

        let events =
            current
                .aggregate
                .update_quantity(key, new_quantity, self.env.clock.now())?;
        let held = i64::from(current.aggregate.quantity_of(key));
        if new_quantity > held {
            self.ensure_available(&key.sku, new_quantity.unsigned_abs())
                .await?;
        }
        let cart = self.persist(current, events).await?;

        metrics::counter!("cart_mutations_total", "operation" => "update_quantity").increment(1);
        self.snapshot_of(owner, &cart).await
    }

    /// Removes a line.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, owner: &OwnerRef, key: &LineKey) -> Result<CartSnapshot> {
        let _guard = self.lock(owner).await;
        let current = self.require_active(owner).await?;

        let events = current.aggregate.remove_item(key, self.env.clock.now())?;
        let cart = self.persist(current, events).await?;

        metrics::counter!("cart_mutations_total", "operation" => "remove_item").increment(1);
        self.snapshot_of(owner, &cart).await
    }

    /// Removes every line and the coupon. Clearing a missing cart is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, owner: &OwnerRef) -> Result<CartSnapshot> {
        let _guard = self.lock(owner).await;
        let Some(current) = self.active_cart(owner).await? else {
            return self.snapshot_of(owner, &Cart::default()).await;
        };

        let events = current.aggregate.clear(self.env.clock.now())?;
        let cart = self.persist(current, events).await?;

        metrics::counter!("cart_mutations_total", "operation" => "clear").increment(1);
        self.snapshot_of(owner, &cart).await
    }

    /// Attaches a coupon code that exists in the coupon directory.
    ///
    /// Eligibility is not checked here; a coupon that does not apply shows up
    /// as a rejection reason in the totals.
    #[tracing::instrument(skip(self))]
    pub async fn apply_coupon(&self, owner: &OwnerRef, code: &str) -> Result<CartSnapshot> {
        let code = code.trim();
        if self.env.coupons.find(code).await?.is_none() {
            return Err(CheckoutError::UnknownCoupon(code.to_string()));
        }

        let _guard = self.lock(owner).await;
        let current = self.require_active(owner).await?;
        let events = current.aggregate.apply_coupon(code, self.env.clock.now())?;
        let cart = self.persist(current, events).await?;

        metrics::counter!("cart_mutations_total", "operation" => "apply_coupon").increment(1);
        self.snapshot_of(owner, &cart).await
    }

    /// Detaches the coupon.
    #[tracing::instrument(skip(self))]
    pub async fn remove_coupon(&self, owner: &OwnerRef) -> Result<CartSnapshot> {
        let _guard = self.lock(owner).await;
        let current = self.require_active(owner).await?;

        let events = current.aggregate.remove_coupon(self.env.clock.now())?;
        let cart = self.persist(current, events).await?;

        metrics::counter!("cart_mutations_total", "operation" => "remove_coupon").increment(1);
        self.snapshot_of(owner, &cart).await
    }

    /// Marks a cart as turned into an order by `session_id`.
    ///
    /// A cart that is no longer active (merged away meanwhile) is left alone.
    #[tracing::instrument(skip(self))]
    pub async fn convert(
        &self,
        owner: &OwnerRef,
        cart_id: CartId,
        session_id: SessionId,
    ) -> Result<()> {
        let _guard = self.lock(owner).await;
        let Some(current) = self.store.load(cart_id).await? else {
            return Err(CheckoutError::CartNotFound(owner.clone()));
        };
        if !current.aggregate.is_active() {
            tracing::warn!(%cart_id, status = %current.aggregate.status(), "cart not active at conversion");
            return Ok(());
        }

        let events = current.aggregate.convert(session_id, self.env.clock.now())?;
        self.persist(current, events).await?;
        self.forget_owner(owner, cart_id).await;

        metrics::counter!("cart_mutations_total", "operation" => "convert").increment(1);
        tracing::info!(%cart_id, %session_id, "cart converted");
        Ok(())
    }
}

// Helpers shared with the merge service and coordinator
impl CartService {
    pub(crate) async fn lock(&self, owner: &OwnerRef) -> OwnedMutexGuard<()> {
        self.locks.lock(owner).await
    }

    pub(crate) async fn lock_owners(&self, owners: [&OwnerRef; 2]) -> Vec<OwnedMutexGuard<()>> {
        self.locks.lock_many(owners.into_iter().cloned()).await
    }

    pub(crate) fn env(&self) -> &CheckoutEnvironment {
        &self.env
    }

    pub(crate) async fn active_cart(&self, owner: &OwnerRef) -> Result<Option<Versioned<Cart>>> {
        let Some(cart_id) = self.owners.read().await.get(owner).copied() else {
            return Ok(None);
        };
        Ok(self
            .store
            .load(cart_id)
            .await?
            .filter(|v| v.aggregate.is_active()))
    }

    pub(crate) async fn open_cart(
        &self,
        owner: &OwnerRef,
        at: DateTime<Utc>,
    ) -> Result<Versioned<Cart>> {
        let cart_id = CartId::new();
        let events = Cart::default().open(cart_id, owner.clone(), at)?;
        let opened = self.store.append(cart_id, 0, events).await?;
        self.owners.write().await.insert(owner.clone(), cart_id);
        tracing::debug!(%owner, %cart_id, "cart opened");
        Ok(opened)
    }

    pub(crate) async fn persist(
        &self,
        current: Versioned<Cart>,
        events: Vec<CartEvent>,
    ) -> Result<Cart> {
        if events.is_empty() {
            return Ok(current.aggregate);
        }
        let id = current.aggregate.id().ok_or(CartError::NotActive {
            status: current.aggregate.status(),
        })?;
        Ok(self
            .store
            .append(id, current.version, events)
            .await?
            .aggregate)
    }

    pub(crate) async fn forget_owner(&self, owner: &OwnerRef, cart_id: CartId) {
        let mut owners = self.owners.write().await;
        if owners.get(owner) == Some(&cart_id) {
            owners.remove(owner);
        }
    }

    pub(crate) async fn snapshot_of(&self, owner: &OwnerRef, cart: &Cart) -> Result<CartSnapshot> {
        let repricing = self
            .repricer
            .reprice(cart.items(), cart.applied_coupon(), self.env.clock.now())
            .await?;
        Ok(CartSnapshot {
            cart_id: cart.id(),
            owner: owner.clone(),
            status: cart.status(),
            items: cart.items().to_vec(),
            applied_coupon: cart.applied_coupon().map(str::to_string),
            totals: repricing.totals,
            unavailable: repricing.unavailable,
            last_mutated_at: cart.last_mutated_at(),
        })
    }

    async fn require_active(&self, owner: &OwnerRef) -> Result<Versioned<Cart>> {
        self.active_cart(owner)
            .await?
            .ok_or_else(|| CheckoutError::CartNotFound(owner.clone()))
    }

    async fn ensure_available(&self, sku: &SkuId, quantity: u64) -> Result<()> {
        if self.env.ledger.check_available(sku, quantity).await {
            return Ok(());
        }
        let available = self
            .env
            .ledger
            .level(sku)
            .await
            .map_or(0, |level| level.available);
        Err(CheckoutError::OutOfStock {
            sku: sku.clone(),
            requested: quantity,
            available,
        })
    }
}

#[cfg(test)]
mod tests {
    use common::ManualClock;
    use domain::{Coupon, CouponRejection, DomainError, Money, Rate, TaxCategory};
    use inventory::StockLedger;

    use super::*;
    use crate::environment::InMemoryCollaborators;

    async fn setup() -> (CartService, InMemoryCollaborators) {
        let collaborators = InMemoryCollaborators::new(Arc::new(ManualClock::default()));
        collaborators
            .catalog
            .set_price("X", None, Money::from_cents(1000), TaxCategory::standard())
            .await;
        collaborators
            .catalog
            .set_price("Y", None, Money::from_cents(250), TaxCategory::standard())
            .await;
        collaborators
            .ledger
            .receive(&SkuId::new("X"), 5)
            .await
            .unwrap();
        collaborators
            .ledger
            .receive(&SkuId::new("Y"), 100)
            .await
            .unwrap();
        let service = CartService::in_memory(collaborators.environment(), &CheckoutConfig::default());
        (service, collaborators)
    }

    fn guest() -> OwnerRef {
        OwnerRef::Guest("g-1".into())
    }

    #[tokio::test]
    async fn test_add_item_opens_cart_and_merges_lines() {
        let (service, _) = setup().await;

        service
            .add_item(&guest(), SkuId::new("X"), None, 1)
            .await
            .unwrap();
        let snapshot = service
            .add_item(&guest(), SkuId::new("X"), None, 2)
            .await
            .unwrap();

        assert!(snapshot.cart_id.is_some());
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].quantity, 3);
        assert_eq!(snapshot.totals.subtotal, Money::from_cents(3000));
    }

    #[tokio::test]
    async fn test_add_item_checks_resulting_quantity() {
        let (service, _) = setup().await;
        service
            .add_item(&guest(), SkuId::new("X"), None, 4)
            .await
            .unwrap();

        let result = service.add_item(&guest(), SkuId::new("X"), None, 2).await;
        assert!(matches!(
            result,
            Err(CheckoutError::OutOfStock {
                requested: 6,
                available: 5,
                ..
            })
        ));
        let cart = service.cart_for(&guest()).await.unwrap().unwrap();
        assert_eq!(cart.quantity_of(&LineKey::new("X", None)), 4);
    }

    #[tokio::test]
    async fn test_add_zero_and_unknown_product() {
        let (service, _) = setup().await;

        let zero = service.add_item(&guest(), SkuId::new("X"), None, 0).await;
        assert!(matches!(
            zero,
            Err(CheckoutError::Domain(DomainError::Cart(
                CartError::InvalidQuantity { quantity: 0 }
            )))
        ));

        let unknown = service.add_item(&guest(), SkuId::new("NOPE"), None, 1).await;
        assert!(matches!(unknown, Err(CheckoutError::Validation(_))));
        assert!(service.cart_for(&guest()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_quantity_rules() {
        let (service, _) = setup().await;
        let key = LineKey::new("X", None);
        service
            .add_item(&guest(), SkuId::new("X"), None, 1)
            .await
            .unwrap();

        let negative = service.update_quantity(&guest(), &key, -1).await;
        assert!(matches!(
            negative,
            Err(CheckoutError::Domain(DomainError::Cart(
                CartError::InvalidQuantity { quantity: -1 }
            )))
        ));

        let too_many = service.update_quantity(&guest(), &key, 9).await;
        assert!(matches!(too_many, Err(CheckoutError::OutOfStock { .. })));

        let snapshot = service.update_quantity(&guest(), &key, 5).await.unwrap();
        assert_eq!(snapshot.items[0].quantity, 5);

        let snapshot = service.update_quantity(&guest(), &key, 0).await.unwrap();
        assert!(snapshot.items.is_empty());

        let missing = service.remove_item(&guest(), &key).await;
        assert!(matches!(
            missing,
            Err(CheckoutError::Domain(DomainError::Cart(CartError::LineNotFound { .. })))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_reprices_from_catalog() {
        let (service, collaborators) = setup().await;
        service
            .add_item(&guest(), SkuId::new("X"), None, 2)
            .await
            .unwrap();
        collaborators
            .catalog
            .set_price("X", None, Money::from_cents(1200), TaxCategory::standard())
            .await;

        let snapshot = service.snapshot(&guest()).await.unwrap();
        assert_eq!(snapshot.items[0].unit_price_snapshot, Money::from_cents(1000));
        assert_eq!(snapshot.totals.subtotal, Money::from_cents(2400));
    }

    #[tokio::test]
    async fn test_snapshot_without_cart_is_empty() {
        let (service, _) = setup().await;
        let snapshot = service.snapshot(&guest()).await.unwrap();
        assert_eq!(snapshot.cart_id, None);
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.totals.total, Money::zero());
    }

    #[tokio::test]
    async fn test_coupon_apply_and_remove() {
        let (service, collaborators) = setup().await;
        let mut coupon = Coupon::percentage("BIG", Rate::from_percent(10));
        coupon.constraints.min_subtotal = Some(Money::from_dollars(100));
        collaborators.coupons.insert(coupon).await;
        service
            .add_item(&guest(), SkuId::new("X"), None, 1)
            .await
            .unwrap();

        let unknown = service.apply_coupon(&guest(), "NOPE").await;
        assert!(matches!(unknown, Err(CheckoutError::UnknownCoupon(code)) if code == "NOPE"));

        let snapshot = service.apply_coupon(&guest(), "BIG").await.unwrap();
        assert_eq!(snapshot.applied_coupon.as_deref(), Some("BIG"));
        assert!(matches!(
            snapshot.totals.coupon_rejected,
            Some(CouponRejection::BelowMinimumSubtotal { .. })
        ));

        let snapshot = service.remove_coupon(&guest()).await.unwrap();
        assert_eq!(snapshot.applied_coupon, None);
    }

    #[tokio::test]
    async fn test_clear_and_history() {
        let (service, _) = setup().await;
        let snapshot = service
            .add_item(&guest(), SkuId::new("Y"), None, 3)
            .await
            .unwrap();
        let cart_id = snapshot.cart_id.unwrap();

        let snapshot = service.clear(&guest()).await.unwrap();
        assert!(snapshot.items.is_empty());

        let history = service.history(cart_id).await.unwrap();
        assert!(matches!(history.first(), Some(CartEvent::CartOpened(_))));
        assert!(matches!(history.last(), Some(CartEvent::CartCleared(_))));
    }

    #[tokio::test]
    async fn test_converted_cart_is_replaced_on_next_add() {
        let (service, _) = setup().await;
        let first = service
            .add_item(&guest(), SkuId::new("Y"), None, 1)
            .await
            .unwrap()
            .cart_id
            .unwrap();

        service
            .convert(&guest(), first, SessionId::new())
            .await
            .unwrap();
        assert!(service.cart_for(&guest()).await.unwrap().is_none());
        assert_eq!(
            service.get_cart(first).await.unwrap().unwrap().status(),
            CartStatus::Converted
        );

        let second = service
            .add_item(&guest(), SkuId::new("Y"), None, 1)
            .await
            .unwrap()
            .cart_id
            .unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_for_one_owner_are_serialized() {
        let (service, _) = setup().await;
        let service = Arc::new(service);

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .add_item(&guest(), SkuId::new("Y"), None, 1)
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let cart = service.cart_for(&guest()).await.unwrap().unwrap();
        assert_eq!(cart.quantity_of(&LineKey::new("Y", None)), 20);
    }
}
