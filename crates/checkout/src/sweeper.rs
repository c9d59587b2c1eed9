//! Background expiry of idle sessions and lapsed reservations.

use std::sync::Arc;
use std::time::Duration;

use common::ReservationId;
use inventory::StockLedger;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::coordinator::{CheckoutCoordinator, SweepReport};
use crate::error::Result;

/// Periodically times out idle sessions, then releases any reservation the
/// ledger still holds past its expiry.
///
/// Sessions are swept before the ledger.
pub struct Sweeper {
    coordinator: Arc<CheckoutCoordinator>,
    ledger: Arc<dyn StockLedger>,
    interval: Duration,
}

/// What one sweep pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub sessions: SweepReport,
    pub released: Vec<ReservationId>,
}

impl Sweeper {
    /// Creates a sweeper that runs every `interval`.
    pub fn new(
        coordinator: Arc<CheckoutCoordinator>,
        ledger: Arc<dyn StockLedger>,
        interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            ledger,
            interval,
        }
    }

    /// Spawns the sweeper as a background task.
    ///
    /// The task stops when `shutdown` turns true or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("sweeper stopped");
                            return;
                        }
                        continue;
                    }
                }

                match self.run_once().await {
                    Ok(outcome) if !outcome.sessions.is_empty() || !outcome.released.is_empty() => {
                        info!(
                            sessions = outcome.sessions.len(),
                            reservations = outcome.released.len(),
                            "sweep released idle checkouts"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "sweep failed");
                    }
                }
            }
        })
    }

    /// Runs one sweep pass.
    pub async fn run_once(&self) -> Result<SweepOutcome> {
        let sessions = self.coordinator.expire_idle_sessions().await;
        let released = self.ledger.sweep_expired().await?;
        Ok(SweepOutcome { sessions, released })
    }
}
