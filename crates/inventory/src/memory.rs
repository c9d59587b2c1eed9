use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{Clock, ReservationId, SessionId, SystemClock};
use domain::{SkuId, StockShortage};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    InventoryError, Result,
    ledger::StockLedger,
    reservation::{
        ReleaseOutcome, ReleaseReason, ReservationLine, ReservationRecord, ReservationStatus,
        StockLevel, StockReservation,
    },
};

#[derive(Debug, Default)]
struct StockRecord {
    available: u64,
    reserved: u64,
    committed: u64,
}

impl StockRecord {
    fn level(&self, sku: &SkuId) -> StockLevel {
        StockLevel {
            sku: sku.clone(),
            available: self.available,
            reserved: self.reserved,
            committed: self.committed,
        }
    }
}

#[derive(Debug)]
struct ReservationEntry {
    reservation: StockReservation,
    status: ReservationStatus,
}

/// Locked SKU records with the quantity the operation moves for each.
type LockedLines = Vec<(SkuId, u64, OwnedMutexGuard<StockRecord>)>;

/// In-memory stock ledger.
///
/// Each SKU record and each reservation sits behind its own mutex. Multi-SKU
/// operations lock records in ascending SKU order, and reservation-level
/// operations (release, commit, sweep) lock the reservation before its SKUs,
/// so no two operations can wait on each other in a cycle.
#[derive(Clone)]
pub struct InMemoryStockLedger {
    skus: Arc<RwLock<HashMap<SkuId, Arc<Mutex<StockRecord>>>>>,
    reservations: Arc<RwLock<HashMap<ReservationId, Arc<Mutex<ReservationEntry>>>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStockLedger {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryStockLedger {
    /// Creates an empty ledger on the system clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty ledger reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            skus: Arc::new(RwLock::new(HashMap::new())),
            reservations: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Returns the number of reservations still holding stock.
    pub async fn active_reservation_count(&self) -> usize {
        let entries: Vec<_> = self.reservations.read().await.values().cloned().collect();
        let mut count = 0;
        for entry in entries {
            if entry.lock().await.status.is_active() {
                count += 1;
            }
        }
        count
    }

    async fn record(&self, sku: &SkuId) -> Option<Arc<Mutex<StockRecord>>> {
        self.skus.read().await.get(sku).cloned()
    }

    async fn entry(&self, id: ReservationId) -> Option<Arc<Mutex<ReservationEntry>>> {
        self.reservations.read().await.get(&id).cloned()
    }

    /// Locks the records of a reservation's lines in ascending SKU order.
    async fn lock_lines(&self, lines: &BTreeMap<SkuId, u64>) -> Result<LockedLines> {
        let mut locked = Vec::with_capacity(lines.len());
        for (sku, quantity) in lines {
            let record = self
                .record(sku)
                .await
                .ok_or_else(|| invariant(format!("reserved SKU {sku} has no stock record")))?;
            locked.push((sku.clone(), *quantity, record.lock_owned().await));
        }
        Ok(locked)
    }

    /// Moves a reservation's units from reserved back to available.
    async fn release_entry(
        &self,
        entry: &mut ReservationEntry,
        reason: ReleaseReason,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut locked = self.lock_lines(&entry.reservation.lines).await?;

        let mut updates = Vec::with_capacity(locked.len());
        for (sku, quantity, record) in &locked {
            let reserved = record.reserved.checked_sub(*quantity).ok_or_else(|| {
                invariant(format!(
                    "{sku}: releasing {quantity} with only {} reserved",
                    record.reserved
                ))
            })?;
            let available = record
                .available
                .checked_add(*quantity)
                .ok_or_else(|| invariant(format!("{sku}: available overflow on release")))?;
            updates.push((reserved, available));
        }
        for ((_, _, record), (reserved, available)) in locked.iter_mut().zip(updates) {
            record.reserved = reserved;
            record.available = available;
        }

        entry.status = ReservationStatus::Released { reason, at: now };
        Ok(())
    }

    /// Moves a reservation's units from reserved to committed.
    async fn commit_entry(&self, entry: &mut ReservationEntry, now: DateTime<Utc>) -> Result<()> {
        let mut locked = self.lock_lines(&entry.reservation.lines).await?;

        let mut updates = Vec::with_capacity(locked.len());
        for (sku, quantity, record) in &locked {
            let reserved = record.reserved.checked_sub(*quantity).ok_or_else(|| {
                invariant(format!(
                    "{sku}: committing {quantity} with only {} reserved",
                    record.reserved
                ))
            })?;
            let committed = record
                .committed
                .checked_add(*quantity)
                .ok_or_else(|| invariant(format!("{sku}: committed counter overflow")))?;
            updates.push((reserved, committed));
        }
        for ((_, _, record), (reserved, committed)) in locked.iter_mut().zip(updates) {
            record.reserved = reserved;
            record.committed = committed;
        }

        entry.status = ReservationStatus::Committed { at: now };
        Ok(())
    }
}

fn invariant(message: String) -> InventoryError {
    tracing::error!(%message, "stock invariant violated");
    InventoryError::Invariant(message)
}

/// Sums request lines per SKU, rejecting zero quantities.
fn collapse_lines(lines: &[ReservationLine]) -> Result<BTreeMap<SkuId, u64>> {
    if lines.is_empty() {
        return Err(InventoryError::EmptyReservation);
    }
    let mut requested: BTreeMap<SkuId, u64> = BTreeMap::new();
    for line in lines {
        if line.quantity == 0 {
            return Err(InventoryError::InvalidQuantity {
                sku: line.sku.clone(),
            });
        }
        let slot = requested.entry(line.sku.clone()).or_insert(0);
        *slot = slot
            .checked_add(line.quantity)
            .ok_or_else(|| InventoryError::InvalidQuantity {
                sku: line.sku.clone(),
            })?;
    }
    Ok(requested)
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn check_available(&self, sku: &SkuId, quantity: u64) -> bool {
        match self.record(sku).await {
            Some(record) => record.lock().await.available >= quantity,
            None => false,
        }
    }

    async fn level(&self, sku: &SkuId) -> Option<StockLevel> {
        let record = self.record(sku).await?;
        let level = record.lock().await.level(sku);
        Some(level)
    }

    #[tracing::instrument(skip(self))]
    async fn receive(&self, sku: &SkuId, quantity: u64) -> Result<StockLevel> {
        let record = {
            let mut skus = self.skus.write().await;
            Arc::clone(skus.entry(sku.clone()).or_default())
        };
        let mut record = record.lock().await;
        record.available = record
            .available
            .checked_add(quantity)
            .ok_or_else(|| invariant(format!("{sku}: available overflow on receive")))?;
        tracing::debug!(available = record.available, "stock received");
        Ok(record.level(sku))
    }

    #[tracing::instrument(skip(self))]
    async fn zero(&self, sku: &SkuId) -> Result<StockLevel> {
        let record = self
            .record(sku)
            .await
            .ok_or_else(|| InventoryError::UnknownSku(sku.clone()))?;
        let mut record = record.lock().await;
        let written_off = std::mem::take(&mut record.available);
        tracing::info!(written_off, reserved = record.reserved, "stock zeroed");
        Ok(record.level(sku))
    }

    #[tracing::instrument(skip(self, lines), fields(%session_id))]
    async fn reserve(
        &self,
        session_id: SessionId,
        lines: &[ReservationLine],
        ttl: Duration,
    ) -> Result<StockReservation> {
        let requested = collapse_lines(lines)?;

        let records: Vec<(SkuId, u64, Option<Arc<Mutex<StockRecord>>>)> = {
            let skus = self.skus.read().await;
            requested
                .iter()
                .map(|(sku, quantity)| (sku.clone(), *quantity, skus.get(sku).cloned()))
                .collect()
        };

        // BTreeMap order: records are locked in ascending SKU order.
        let mut locked: LockedLines = Vec::with_capacity(records.len());
        let mut shortages = Vec::new();
        for (sku, quantity, record) in records {
            match record {
                Some(record) => {
                    let guard = record.lock_owned().await;
                    if guard.available < quantity {
                        shortages.push(StockShortage {
                            sku: sku.clone(),
                            requested: quantity,
                            available: guard.available,
                        });
                    }
                    locked.push((sku, quantity, guard));
                }
                None => shortages.push(StockShortage {
                    sku,
                    requested: quantity,
                    available: 0,
                }),
            }
        }

        if !shortages.is_empty() {
            metrics::counter!("stock_reservation_failures_total").increment(1);
            tracing::warn!(short_skus = shortages.len(), "reservation rejected");
            return Err(InventoryError::InsufficientStock { shortages });
        }

        let mut updates = Vec::with_capacity(locked.len());
        for (sku, quantity, record) in &locked {
            let available = record.available.checked_sub(*quantity).ok_or_else(|| {
                invariant(format!("{sku}: available underflow on reserve"))
            })?;
            let reserved = record
                .reserved
                .checked_add(*quantity)
                .ok_or_else(|| invariant(format!("{sku}: reserved overflow on reserve")))?;
            updates.push((available, reserved));
        }
        for ((_, _, record), (available, reserved)) in locked.iter_mut().zip(updates) {
            record.available = available;
            record.reserved = reserved;
        }
        drop(locked);

        let now = self.clock.now();
        let reservation = StockReservation {
            id: ReservationId::new(),
            session_id,
            lines: requested,
            created_at: now,
            expires_at: now + ttl,
        };
        self.reservations.write().await.insert(
            reservation.id,
            Arc::new(Mutex::new(ReservationEntry {
                reservation: reservation.clone(),
                status: ReservationStatus::Active,
            })),
        );

        metrics::counter!("stock_reservations_total").increment(1);
        tracing::info!(
            reservation_id = %reservation.id,
            units = reservation.total_units(),
            expires_at = %reservation.expires_at,
            "stock reserved"
        );
        Ok(reservation)
    }

    #[tracing::instrument(skip(self))]
    async fn release(&self, reservation_id: ReservationId) -> Result<ReleaseOutcome> {
        let entry = self
            .entry(reservation_id)
            .await
            .ok_or(InventoryError::ReservationNotFound(reservation_id))?;
        let mut entry = entry.lock().await;

        let status = entry.status;
        match status {
            ReservationStatus::Active => {
                self.release_entry(&mut entry, ReleaseReason::Manual, self.clock.now())
                    .await?;
                metrics::counter!("stock_reservations_released_total").increment(1);
                tracing::info!("reservation released");
                Ok(ReleaseOutcome::Released)
            }
            ReservationStatus::Released { .. } => Ok(ReleaseOutcome::AlreadyReleased),
            ReservationStatus::Committed { .. } => Ok(ReleaseOutcome::AlreadyCommitted),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn commit(&self, reservation_id: ReservationId) -> Result<StockReservation> {
        let entry = self
            .entry(reservation_id)
            .await
            .ok_or(InventoryError::ReservationNotFound(reservation_id))?;
        let mut entry = entry.lock().await;
        let now = self.clock.now();

        let status = entry.status;
        match status {
            ReservationStatus::Active if entry.reservation.is_expired(now) => {
                self.release_entry(&mut entry, ReleaseReason::Expired, now)
                    .await?;
                metrics::counter!("stock_reservations_expired_total").increment(1);
                tracing::warn!("commit attempted on expired reservation; released");
                Err(InventoryError::ReservationExpired(reservation_id))
            }
            ReservationStatus::Active => {
                self.commit_entry(&mut entry, now).await?;
                metrics::counter!("stock_reservations_committed_total").increment(1);
                tracing::info!("reservation committed");
                Ok(entry.reservation.clone())
            }
            ReservationStatus::Released {
                reason: ReleaseReason::Expired,
                ..
            } => Err(InventoryError::ReservationExpired(reservation_id)),
            ReservationStatus::Released {
                reason: ReleaseReason::Manual,
                ..
            } => Err(InventoryError::ReservationReleased(reservation_id)),
            ReservationStatus::Committed { .. } => {
                Err(InventoryError::AlreadyCommitted(reservation_id))
            }
        }
    }

    async fn reservation(&self, reservation_id: ReservationId) -> Option<ReservationRecord> {
        let entry = self.entry(reservation_id).await?;
        let entry = entry.lock().await;
        Some(ReservationRecord {
            reservation: entry.reservation.clone(),
            status: entry.status,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn sweep_expired(&self) -> Result<Vec<ReservationId>> {
        let now = self.clock.now();
        let entries: Vec<(ReservationId, Arc<Mutex<ReservationEntry>>)> = self
            .reservations
            .read()
            .await
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(entry)))
            .collect();

        let mut released = Vec::new();
        for (id, entry) in entries {
            let mut entry = entry.lock().await;
            if !entry.status.is_active() || !entry.reservation.is_expired(now) {
                continue;
            }
            match self.release_entry(&mut entry, ReleaseReason::Expired, now).await {
                Ok(()) => released.push(id),
                Err(e) => tracing::error!(reservation_id = %id, error = %e, "sweep failed to release"),
            }
        }

        if !released.is_empty() {
            metrics::counter!("stock_reservations_expired_total").increment(released.len() as u64);
            tracing::info!(count = released.len(), "expired reservations released");
        }
        Ok(released)
    }
}
