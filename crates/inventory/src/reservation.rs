//! Reservation records and their status state machine.

use chrono::{DateTime, Utc};
use common::{ReservationId, Sku};
use serde::{Deserialize, Serialize};

/// The status of a reservation in its lifecycle.
///
/// `Reserved` is the only live status; both transitions out of it are
/// terminal. An expired `Reserved` hold is treated as `Released` by the
/// sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReservationStatus {
    /// The hold counts against availability but stock is not yet decremented.
    #[default]
    Reserved,

    /// Stock has been decremented for this hold (terminal).
    Committed,

    /// The hold was returned to the available pool (terminal).
    Released,
}

impl ReservationStatus {
    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Committed | ReservationStatus::Released
        )
    }

    /// Returns true if the hold still counts against availability.
    pub fn holds_stock(&self) -> bool {
        matches!(self, ReservationStatus::Reserved)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "Reserved",
            ReservationStatus::Committed => "Committed",
            ReservationStatus::Released => "Released",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A provisional hold against available inventory for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Idempotency key of the reserve call; globally unique.
    pub id: ReservationId,
    /// The SKU the hold is against.
    pub sku: Sku,
    /// Quantity held.
    pub quantity: u32,
    /// Current lifecycle status.
    pub status: ReservationStatus,
    /// When the hold was taken.
    pub created_at: DateTime<Utc>,
    /// When a still-Reserved hold becomes eligible for sweeping.
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    /// Returns true if this hold is Reserved and past its TTL.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Reserved && now > self.expires_at
    }
}
