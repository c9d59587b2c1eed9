//! Domain error types.

use thiserror::Error;

use crate::cart::CartError;
use crate::session::SessionError;
use crate::values::InvalidLineKey;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the cart aggregate.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// An error occurred in the checkout session aggregate.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// A line key could not be parsed.
    #[error(transparent)]
    LineKey(#[from] InvalidLineKey),
}
