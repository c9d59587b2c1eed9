//! Stock levels and reservations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{ReservationId, SessionId};
use domain::SkuId;
use serde::{Deserialize, Serialize};

/// Snapshot of one SKU's stock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub sku: SkuId,
    /// Units that can still be reserved.
    pub available: u64,
    /// Units held by active reservations.
    pub reserved: u64,
    /// Units permanently removed by commits, cumulative.
    pub committed: u64,
}

impl StockLevel {
    /// Physical units on hand: available plus reserved.
    pub fn on_hand(&self) -> u64 {
        self.available.saturating_add(self.reserved)
    }
}

/// One line of a reservation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLine {
    pub sku: SkuId,
    pub quantity: u64,
}

impl ReservationLine {
    /// Creates a reservation line.
    pub fn new(sku: impl Into<SkuId>, quantity: u64) -> Self {
        Self {
            sku: sku.into(),
            quantity,
        }
    }
}

/// Stock held for a checkout session until committed, released or expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReservation {
    pub id: ReservationId,
    pub session_id: SessionId,
    /// Quantity per SKU; duplicate request lines are already summed.
    pub lines: BTreeMap<SkuId, u64>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StockReservation {
    /// Returns true if the reservation is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Total units held across all SKUs.
    pub fn total_units(&self) -> u64 {
        self.lines.values().copied().fold(0, u64::saturating_add)
    }
}

/// Why a reservation was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// Released by its owner (payment failure, cancellation, ...).
    Manual,
    /// Released because it passed its expiry.
    Expired,
}

/// Lifecycle status of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Released {
        reason: ReleaseReason,
        at: DateTime<Utc>,
    },
    Committed {
        at: DateTime<Utc>,
    },
}

impl ReservationStatus {
    /// Returns true while the reservation still holds stock.
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Active)
    }
}

/// A reservation together with its current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub reservation: StockReservation,
    pub status: ReservationStatus,
}

/// What a `release` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// The reservation's stock was returned to available.
    Released,
    /// Nothing to do: already released earlier.
    AlreadyReleased,
    /// Nothing to do: the stock was committed.
    AlreadyCommitted,
}
