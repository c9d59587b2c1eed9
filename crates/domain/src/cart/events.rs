//! Cart domain events.

use chrono::{DateTime, Utc};
use common::{CartId, SessionId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::values::{CartLineItem, LineKey, OwnerRef};

/// Events that can occur on a cart aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// Cart was opened for an owner.
    CartOpened(CartOpenedData),

    /// A new line was appended.
    ItemAdded(ItemAddedData),

    /// The quantity of an existing line changed.
    ItemQuantityChanged(ItemQuantityChangedData),

    /// A line was removed.
    ItemRemoved(ItemRemovedData),

    /// All lines and the coupon were removed.
    CartCleared(CartClearedData),

    /// A coupon code was attached.
    CouponApplied(CouponAppliedData),

    /// The coupon code was detached.
    CouponRemoved(CouponRemovedData),

    /// A guest cart's lines were folded into this cart.
    GuestCartAbsorbed(GuestCartAbsorbedData),

    /// This guest cart was merged into a user cart and emptied.
    CartMerged(CartMergedData),

    /// This cart was turned into an order.
    CartConverted(CartConvertedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "CartOpened",
            CartEvent::ItemAdded(_) => "ItemAdded",
            CartEvent::ItemQuantityChanged(_) => "ItemQuantityChanged",
            CartEvent::ItemRemoved(_) => "ItemRemoved",
            CartEvent::CartCleared(_) => "CartCleared",
            CartEvent::CouponApplied(_) => "CouponApplied",
            CartEvent::CouponRemoved(_) => "CouponRemoved",
            CartEvent::GuestCartAbsorbed(_) => "GuestCartAbsorbed",
            CartEvent::CartMerged(_) => "CartMerged",
            CartEvent::CartConverted(_) => "CartConverted",
        }
    }
}

impl CartEvent {
    /// When the event happened.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::CartOpened(d) => d.opened_at,
            CartEvent::ItemAdded(d) => d.line.added_at,
            CartEvent::ItemQuantityChanged(d) => d.changed_at,
            CartEvent::ItemRemoved(d) => d.removed_at,
            CartEvent::CartCleared(d) => d.cleared_at,
            CartEvent::CouponApplied(d) => d.applied_at,
            CartEvent::CouponRemoved(d) => d.removed_at,
            CartEvent::GuestCartAbsorbed(d) => d.absorbed_at,
            CartEvent::CartMerged(d) => d.merged_at,
            CartEvent::CartConverted(d) => d.converted_at,
        }
    }
}

/// Data for CartOpened event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartOpenedData {
    pub cart_id: CartId,
    pub owner: OwnerRef,
    pub opened_at: DateTime<Utc>,
}

/// Data for ItemAdded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAddedData {
    /// The appended line, including its price snapshot.
    pub line: CartLineItem,
}

/// Data for ItemQuantityChanged event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantityChangedData {
    pub key: LineKey,
    pub old_quantity: u32,
    pub new_quantity: u32,
    pub changed_at: DateTime<Utc>,
}

/// Data for ItemRemoved event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemovedData {
    pub key: LineKey,
    pub removed_at: DateTime<Utc>,
}

/// Data for CartCleared event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartClearedData {
    pub cleared_at: DateTime<Utc>,
}

/// Data for CouponApplied event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponAppliedData {
    pub code: String,
    pub applied_at: DateTime<Utc>,
}

/// Data for CouponRemoved event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponRemovedData {
    pub code: String,
    pub removed_at: DateTime<Utc>,
}

/// Data for GuestCartAbsorbed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCartAbsorbedData {
    /// The guest cart the lines came from.
    pub guest_cart_id: CartId,
    pub guest: OwnerRef,
    pub absorbed_at: DateTime<Utc>,
}

/// Data for CartMerged event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartMergedData {
    /// The user cart that received the lines.
    pub into_cart_id: CartId,
    pub merged_at: DateTime<Utc>,
}

/// Data for CartConverted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartConvertedData {
    /// The checkout session that produced the order.
    pub session_id: SessionId,
    pub converted_at: DateTime<Utc>,
}

// Convenience constructors for events
impl CartEvent {
    /// Creates a CartOpened event.
    pub fn cart_opened(cart_id: CartId, owner: OwnerRef, at: DateTime<Utc>) -> Self {
        CartEvent::CartOpened(CartOpenedData {
            cart_id,
            owner,
            opened_at: at,
        })
    }

    /// Creates an ItemAdded event.
    pub fn item_added(line: CartLineItem) -> Self {
        CartEvent::ItemAdded(ItemAddedData { line })
    }

    /// Creates an ItemQuantityChanged event.
    pub fn item_quantity_changed(
        key: LineKey,
        old_quantity: u32,
        new_quantity: u32,
        at: DateTime<Utc>,
    ) -> Self {
        CartEvent::ItemQuantityChanged(ItemQuantityChangedData {
            key,
            old_quantity,
            new_quantity,
            changed_at: at,
        })
    }

    /// Creates an ItemRemoved event.
    pub fn item_removed(key: LineKey, at: DateTime<Utc>) -> Self {
        CartEvent::ItemRemoved(ItemRemovedData {
            key,
            removed_at: at,
        })
    }

    /// Creates a CartCleared event.
    pub fn cart_cleared(at: DateTime<Utc>) -> Self {
        CartEvent::CartCleared(CartClearedData { cleared_at: at })
    }

    /// Creates a CouponApplied event.
    pub fn coupon_applied(code: impl Into<String>, at: DateTime<Utc>) -> Self {
        CartEvent::CouponApplied(CouponAppliedData {
            code: code.into(),
            applied_at: at,
        })
    }

    /// Creates a CouponRemoved event.
    pub fn coupon_removed(code: impl Into<String>, at: DateTime<Utc>) -> Self {
        CartEvent::CouponRemoved(CouponRemovedData {
            code: code.into(),
            removed_at: at,
        })
    }

    /// Creates a GuestCartAbsorbed event.
    pub fn guest_cart_absorbed(guest_cart_id: CartId, guest: OwnerRef, at: DateTime<Utc>) -> Self {
        CartEvent::GuestCartAbsorbed(GuestCartAbsorbedData {
            guest_cart_id,
            guest,
            absorbed_at: at,
        })
    }

    /// Creates a CartMerged event.
    pub fn cart_merged(into_cart_id: CartId, at: DateTime<Utc>) -> Self {
        CartEvent::CartMerged(CartMergedData {
            into_cart_id,
            merged_at: at,
        })
    }

    /// Creates a CartConverted event.
    pub fn cart_converted(session_id: SessionId, at: DateTime<Utc>) -> Self {
        CartEvent::CartConverted(CartConvertedData {
            session_id,
            converted_at: at,
        })
    }
}
