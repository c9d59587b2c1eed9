use common::ReservationId;
use domain::{SkuId, StockShortage};
use thiserror::Error;

/// Errors that can occur when interacting with the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// One or more SKUs do not have enough available stock.
    /// Every short SKU is listed, not only the first.
    #[error("Insufficient stock: {}", format_shortages(.shortages))]
    InsufficientStock { shortages: Vec<StockShortage> },

    /// A requested quantity was zero or overflowed.
    #[error("Invalid quantity for SKU {sku}")]
    InvalidQuantity { sku: SkuId },

    /// A reservation request had no lines.
    #[error("Reservation request has no lines")]
    EmptyReservation,

    /// The SKU has never been stocked.
    #[error("Unknown SKU: {0}")]
    UnknownSku(SkuId),

    /// No reservation with this id exists.
    #[error("Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// The reservation passed its expiry and was released.
    #[error("Reservation expired: {0}")]
    ReservationExpired(ReservationId),

    /// The reservation was explicitly released before commit.
    #[error("Reservation already released: {0}")]
    ReservationReleased(ReservationId),

    /// The reservation was committed before.
    #[error("Reservation already committed: {0}")]
    AlreadyCommitted(ReservationId),

    /// A quantity would have gone negative or overflowed.
    #[error("Stock invariant violated: {0}")]
    Invariant(String),
}

fn format_shortages(shortages: &[StockShortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, InventoryError>;
