//! Cart aggregate and related types.

mod aggregate;
mod events;

pub use aggregate::{Cart, ClampedLine, MergeReport};
pub use events::{
    CartClearedData, CartConvertedData, CartEvent, CartMergedData, CartOpenedData,
    CouponAppliedData, CouponRemovedData, GuestCartAbsorbedData, ItemAddedData,
    ItemQuantityChangedData, ItemRemovedData,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::values::LineKey;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// Lifecycle status of a cart.
///
/// Only `Active` carts accept edits. `Merged` and `Converted` carts are
/// empty and kept for history; the owner gets a fresh cart on the next add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    #[default]
    Active,
    Merged,
    Converted,
}

impl CartStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Active => "active",
            CartStatus::Merged => "merged",
            CartStatus::Converted => "converted",
        }
    }
}

impl std::fmt::Display for CartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Cart is already opened.
    #[error("Cart already opened")]
    AlreadyCreated,

    /// Cart is no longer accepting edits.
    #[error("Cart is {status} and cannot be modified")]
    NotActive { status: CartStatus },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// No line with the given key.
    #[error("Line not found: {key}")]
    LineNotFound { key: LineKey },

    /// Coupon code is empty or malformed.
    #[error("Invalid coupon code: {code:?}")]
    InvalidCouponCode { code: String },
}
