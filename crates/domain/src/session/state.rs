//! Checkout session state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout session.
///
/// State transitions:
/// ```text
/// Draft ──► Reserved ──► Paid ──► Finalized
///   │  │       │  │        │
///   │  └───────┴──┼────────┴──► Failed
///   │             └──► Expired
///   └──► Abandoned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Session created from a non-empty cart, nothing reserved yet.
    #[default]
    Draft,

    /// Stock is held and totals are authoritative; awaiting payment.
    Reserved,

    /// Payment approved; stock commit and order creation pending.
    Paid,

    /// Order handed off (terminal state).
    Finalized,

    /// Reservation timed out before payment (terminal state).
    Expired,

    /// Stock, payment or commit failed (terminal state).
    Failed,

    /// Draft left idle past its deadline (terminal state).
    Abandoned,
}

impl SessionState {
    /// Returns true if stock can be reserved in this state.
    pub fn can_reserve(&self) -> bool {
        matches!(self, SessionState::Draft)
    }

    /// Returns true if payment can be authorized in this state.
    pub fn can_authorize(&self) -> bool {
        matches!(self, SessionState::Reserved)
    }

    /// Returns true if the session can be finalized in this state.
    pub fn can_finalize(&self) -> bool {
        matches!(self, SessionState::Paid)
    }

    /// Returns true if the session can move to Failed from this state.
    pub fn can_fail(&self) -> bool {
        matches!(
            self,
            SessionState::Draft | SessionState::Reserved | SessionState::Paid
        )
    }

    /// Returns true if the session can time out into Expired from this state.
    pub fn can_expire(&self) -> bool {
        matches!(self, SessionState::Reserved)
    }

    /// Returns true if the session can be abandoned from this state.
    pub fn can_abandon(&self) -> bool {
        matches!(self, SessionState::Draft)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Finalized
                | SessionState::Expired
                | SessionState::Failed
                | SessionState::Abandoned
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Draft => "DRAFT",
            SessionState::Reserved => "RESERVED",
            SessionState::Paid => "PAID",
            SessionState::Finalized => "FINALIZED",
            SessionState::Expired => "EXPIRED",
            SessionState::Failed => "FAILED",
            SessionState::Abandoned => "ABANDONED",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
