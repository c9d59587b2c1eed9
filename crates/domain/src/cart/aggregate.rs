//! Cart aggregate implementation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{CartId, SessionId};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::values::{CartLineItem, LineKey, OwnerRef, SkuId};

use super::{
    CartError, CartEvent, CartStatus, MAX_LINE_QUANTITY,
    events::{CartOpenedData, ItemQuantityChangedData},
};

/// Cart aggregate root.
///
/// Lines are kept in insertion order and never share a `(sku, variant)` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: Option<CartId>,
    owner: Option<OwnerRef>,
    status: CartStatus,
    items: Vec<CartLineItem>,
    applied_coupon: Option<String>,
    created_at: Option<DateTime<Utc>>,
    last_mutated_at: Option<DateTime<Utc>>,
}

/// A merged line whose summed quantity was cut down to available stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClampedLine {
    pub key: LineKey,
    /// Sum of the user and guest quantities.
    pub requested: u32,
    /// Quantity actually kept.
    pub accepted: u32,
}

/// What a guest-cart merge did to the user cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Lines present in both carts whose quantities were summed.
    pub merged: Vec<LineKey>,
    /// Guest lines appended to the user cart.
    pub appended: Vec<LineKey>,
    pub clamped: Vec<ClampedLine>,
    /// Guest coupon taken over because the user cart had none.
    pub coupon_carried: Option<String>,
}

impl MergeReport {
    /// Returns true if the merge changed nothing.
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty() && self.appended.is_empty() && self.coupon_carried.is_none()
    }
}

impl Aggregate for Cart {
    type Id = CartId;
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn id(&self) -> Option<CartId> {
        self.id
    }

    fn apply(&mut self, event: Self::Event) {
        self.last_mutated_at = Some(event.occurred_at());
        match event {
            CartEvent::CartOpened(data) => self.apply_cart_opened(data),
            CartEvent::ItemAdded(data) => self.items.push(data.line),
            CartEvent::ItemQuantityChanged(data) => self.apply_quantity_changed(data),
            CartEvent::ItemRemoved(data) => self.items.retain(|line| !line.matches(&data.key)),
            CartEvent::CartCleared(_) => {
                self.items.clear();
                self.applied_coupon = None;
            }
            CartEvent::CouponApplied(data) => self.applied_coupon = Some(data.code),
            CartEvent::CouponRemoved(_) => self.applied_coupon = None,
            CartEvent::GuestCartAbsorbed(_) => {}
            CartEvent::CartMerged(_) => {
                self.items.clear();
                self.applied_coupon = None;
                self.status = CartStatus::Merged;
            }
            CartEvent::CartConverted(_) => {
                self.items.clear();
                self.applied_coupon = None;
                self.status = CartStatus::Converted;
            }
        }
    }
}

// Query methods
impl Cart {
    /// Returns the owner.
    pub fn owner(&self) -> Option<&OwnerRef> {
        self.owner.as_ref()
    }

    /// Returns the status.
    pub fn status(&self) -> CartStatus {
        self.status
    }

    /// Returns true if the cart accepts edits.
    pub fn is_active(&self) -> bool {
        self.id.is_some() && self.status == CartStatus::Active
    }

    /// Returns the lines in insertion order.
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Returns the line with the given key.
    pub fn line(&self, key: &LineKey) -> Option<&CartLineItem> {
        self.items.iter().find(|line| line.matches(key))
    }

    /// Quantity currently held for a key, zero if absent.
    pub fn quantity_of(&self, key: &LineKey) -> u32 {
        self.line(key).map_or(0, |line| line.quantity)
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the applied coupon code.
    pub fn applied_coupon(&self) -> Option<&str> {
        self.applied_coupon.as_deref()
    }

    /// When the cart was opened.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// When the cart last changed.
    pub fn last_mutated_at(&self) -> Option<DateTime<Utc>> {
        self.last_mutated_at
    }
}

// Command methods (return events)
impl Cart {
    /// Opens a new cart for an owner.
    pub fn open(
        &self,
        cart_id: CartId,
        owner: OwnerRef,
        at: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        if self.id.is_some() {
            return Err(CartError::AlreadyCreated);
        }
        Ok(vec![CartEvent::cart_opened(cart_id, owner, at)])
    }

    /// Adds a line, summing into an existing line with the same key.
    ///
    /// The resulting line quantity must stay within `MAX_LINE_QUANTITY`.
    pub fn add_item(&self, line: CartLineItem) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active()?;

        let existing = self.line(&line.key());
        let current = existing.map_or(0, |l| l.quantity);
        let total = i64::from(current) + i64::from(line.quantity);
        if line.quantity == 0 || total > i64::from(MAX_LINE_QUANTITY) {
            return Err(CartError::InvalidQuantity {
                quantity: i64::from(line.quantity),
            });
        }

        match existing {
            Some(existing) => {
                let new_quantity = existing.quantity + line.quantity;
                Ok(vec![CartEvent::item_quantity_changed(
                    line.key(),
                    existing.quantity,
                    new_quantity,
                    line.added_at,
                )])
            }
            None => Ok(vec![CartEvent::item_added(line)]),
        }
    }

    /// Sets the quantity of an existing line. Zero removes the line.
    pub fn update_quantity(
        &self,
        key: &LineKey,
        new_quantity: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active()?;

        let quantity = u32::try_from(new_quantity)
            .ok()
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .ok_or(CartError::InvalidQuantity {
                quantity: new_quantity,
            })?;

        let existing = self
            .line(key)
            .ok_or_else(|| CartError::LineNotFound { key: key.clone() })?;

        if quantity == 0 {
            Ok(vec![CartEvent::item_removed(key.clone(), at)])
        } else if quantity != existing.quantity {
            Ok(vec![CartEvent::item_quantity_changed(
                key.clone(),
                existing.quantity,
                quantity,
                at,
            )])
        } else {
            Ok(vec![])
        }
    }

    /// Removes a line.
    pub fn remove_item(&self, key: &LineKey, at: DateTime<Utc>) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active()?;

        if self.line(key).is_none() {
            return Err(CartError::LineNotFound { key: key.clone() });
        }
        Ok(vec![CartEvent::item_removed(key.clone(), at)])
    }

    /// Removes every line and the coupon.
    pub fn clear(&self, at: DateTime<Utc>) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active()?;

        if self.items.is_empty() && self.applied_coupon.is_none() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::cart_cleared(at)])
    }

    /// Attaches a coupon code. Whether the coupon exists is checked by the caller;
    /// eligibility is evaluated at every pricing.
    pub fn apply_coupon(&self, code: &str, at: DateTime<Utc>) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active()?;

        let code = code.trim();
        if code.is_empty() || code.chars().any(char::is_whitespace) {
            return Err(CartError::InvalidCouponCode {
                code: code.to_string(),
            });
        }
        if self.applied_coupon.as_deref() == Some(code) {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::coupon_applied(code, at)])
    }

    /// Detaches the coupon, if any.
    pub fn remove_coupon(&self, at: DateTime<Utc>) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active()?;

        Ok(self
            .applied_coupon
            .iter()
            .map(|code| CartEvent::coupon_removed(code.clone(), at))
            .collect())
    }

    /// Folds a guest cart's lines into this cart.
    ///
    /// Lines with a key already present are summed; the sum is capped at
    /// `available[sku]` and `MAX_LINE_QUANTITY`, but never below the quantity
    /// this cart already held.
    /// SKUs missing from `available` are not capped. Other guest lines are
    /// appended with their original snapshot. The guest coupon is carried over
    /// only when this cart has none.
    pub fn absorb(
        &self,
        guest: &Cart,
        available: &BTreeMap<SkuId, u64>,
        at: DateTime<Utc>,
    ) -> Result<(Vec<CartEvent>, MergeReport), CartError> {
        self.ensure_active()?;

        let mut events = Vec::new();
        let mut report = MergeReport::default();
        let (Some(guest_id), Some(guest_owner)) = (guest.id, guest.owner.clone()) else {
            return Ok((events, report));
        };
        if !guest.is_active() || (guest.is_empty() && guest.applied_coupon.is_none()) {
            return Ok((events, report));
        }

        for guest_line in &guest.items {
            let key = guest_line.key();
            match self.line(&key) {
                Some(existing) => {
                    let requested = existing.quantity.saturating_add(guest_line.quantity);
                    let limit = available
                        .get(&key.sku)
                        .map_or(MAX_LINE_QUANTITY, |&limit| {
                            u32::try_from(limit).unwrap_or(u32::MAX).min(MAX_LINE_QUANTITY)
                        });
                    let accepted = requested.min(limit).max(existing.quantity);
                    if accepted != existing.quantity {
                        events.push(CartEvent::item_quantity_changed(
                            key.clone(),
                            existing.quantity,
                            accepted,
                            at,
                        ));
                    }
                    if accepted < requested {
                        report.clamped.push(ClampedLine {
                            key: key.clone(),
                            requested,
                            accepted,
                        });
                    }
                    report.merged.push(key);
                }
                None => {
                    events.push(CartEvent::item_added(guest_line.clone()));
                    report.appended.push(key);
                }
            }
        }

        if let (None, Some(code)) = (&self.applied_coupon, &guest.applied_coupon) {
            events.push(CartEvent::coupon_applied(code.clone(), at));
            report.coupon_carried = Some(code.clone());
        }

        events.push(CartEvent::guest_cart_absorbed(guest_id, guest_owner, at));
        Ok((events, report))
    }

    /// Marks this guest cart as merged into another cart and empties it.
    pub fn mark_merged(&self, into: CartId, at: DateTime<Utc>) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active()?;
        Ok(vec![CartEvent::cart_merged(into, at)])
    }

    /// Marks the cart as turned into an order and empties it.
    pub fn convert(&self, session_id: SessionId, at: DateTime<Utc>) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_active()?;
        Ok(vec![CartEvent::cart_converted(session_id, at)])
    }

    fn ensure_active(&self) -> Result<(), CartError> {
        if self.id.is_none() || self.status != CartStatus::Active {
            return Err(CartError::NotActive {
                status: self.status,
            });
        }
        Ok(())
    }
}

// Apply event helpers
impl Cart {
    fn apply_cart_opened(&mut self, data: CartOpenedData) {
        self.id = Some(data.cart_id);
        self.owner = Some(data.owner);
        self.status = CartStatus::Active;
        self.created_at = Some(data.opened_at);
    }

    fn apply_quantity_changed(&mut self, data: ItemQuantityChangedData) {
        if let Some(line) = self.items.iter_mut().find(|line| line.matches(&data.key)) {
            line.quantity = data.new_quantity;
        }
    }
}
