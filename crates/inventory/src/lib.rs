//! Stock ledger for the checkout core.
//!
//! Tracks available, reserved and committed units per SKU and guarantees
//! that concurrent reservations never oversell.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod reservation;

pub use error::{InventoryError, Result};
pub use ledger::StockLedger;
pub use memory::InMemoryStockLedger;
pub use reservation::{
    ReleaseOutcome, ReleaseReason, ReservationLine, ReservationRecord, ReservationStatus,
    StockLevel, StockReservation,
};
