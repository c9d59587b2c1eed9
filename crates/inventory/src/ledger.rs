use async_trait::async_trait;
use chrono::Duration;
use common::{ReservationId, SessionId};
use domain::SkuId;

use crate::{
    Result,
    reservation::{ReleaseOutcome, ReservationLine, ReservationRecord, StockLevel, StockReservation},
};

/// Core trait for stock ledger implementations.
///
/// The ledger tracks available, reserved and committed units per SKU. All
/// operations on one SKU are linearizable; a multi-SKU reservation either
/// takes every line or none. All implementations must be thread-safe.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Returns true if at least `quantity` units are available.
    ///
    /// Advisory only: a later `reserve` may still fail. Unknown SKUs report false.
    async fn check_available(&self, sku: &SkuId, quantity: u64) -> bool;

    /// Returns the current record of a SKU.
    async fn level(&self, sku: &SkuId) -> Option<StockLevel>;

    /// Adds units to available stock, creating the record on first use.
    async fn receive(&self, sku: &SkuId, quantity: u64) -> Result<StockLevel>;

    /// Writes off all available units. Reserved units stay with their reservations.
    async fn zero(&self, sku: &SkuId) -> Result<StockLevel>;

    /// Reserves every line for `ttl`, or nothing.
    ///
    /// Duplicate SKUs are summed. Fails with `InsufficientStock` listing each
    /// short SKU, or `InvalidQuantity` for a zero quantity.
    async fn reserve(
        &self,
        session_id: SessionId,
        lines: &[ReservationLine],
        ttl: Duration,
    ) -> Result<StockReservation>;

    /// Returns an active reservation's units to available stock.
    ///
    /// Idempotent: releasing a released or committed reservation changes nothing.
    async fn release(&self, reservation_id: ReservationId) -> Result<ReleaseOutcome>;

    /// Permanently removes a reservation's units from stock.
    ///
    /// A reservation past its expiry is released instead and reported as
    /// `ReservationExpired`. A second commit fails with `AlreadyCommitted`.
    async fn commit(&self, reservation_id: ReservationId) -> Result<StockReservation>;

    /// Returns a reservation and its status.
    async fn reservation(&self, reservation_id: ReservationId) -> Option<ReservationRecord>;

    /// Releases every active reservation past its expiry.
    ///
    /// Returns the ids released by this call.
    async fn sweep_expired(&self) -> Result<Vec<ReservationId>>;
}
