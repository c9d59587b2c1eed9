//! Shared building blocks for the cart and checkout crates.

pub mod clock;
pub mod locks;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use locks::KeyedLocks;
pub use types::{CartId, ReservationId, SessionId};
