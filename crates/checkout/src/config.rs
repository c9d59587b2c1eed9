//! Checkout timing and tax configuration.

use std::time::Duration as StdDuration;

use chrono::Duration;

/// Settings for cart and checkout services.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// How long a reservation holds stock. Must exceed the payment provider's
    /// latency bound.
    pub reservation_ttl: Duration,

    /// How long a session may sit in Draft before it is abandoned.
    pub draft_ttl: Duration,

    /// Jurisdiction passed to the tax collaborator.
    pub jurisdiction: String,

    /// Period of the background sweep.
    pub sweep_interval: StdDuration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            reservation_ttl: Duration::seconds(900),
            draft_ttl: Duration::seconds(1800),
            jurisdiction: "default".to_string(),
            sweep_interval: StdDuration::from_secs(30),
        }
    }
}

impl CheckoutConfig {
    /// Sets the reservation TTL.
    pub fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    /// Sets the draft TTL.
    pub fn with_draft_ttl(mut self, ttl: Duration) -> Self {
        self.draft_ttl = ttl;
        self
    }

    /// Sets the tax jurisdiction.
    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = jurisdiction.into();
        self
    }

    /// Sets the sweep interval.
    pub fn with_sweep_interval(mut self, interval: StdDuration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
