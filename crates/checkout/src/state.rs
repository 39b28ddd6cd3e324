//! Checkout saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout saga in its lifecycle.
///
/// State transitions:
/// ```text
/// Started ──► ReservingInventory ──► ChargingPayment ──► CommittingInventory
///                     │                    │                      │
///                     ▼                    ▼                      ▼
///               Compensating ◄─────────────┘              CreatingOrder
///                     │                                          │
///                     ▼                                          ▼
///                  Failed                                  ClearingCart ──► Completed
///
/// CommittingInventory / CreatingOrder failures ──► RequiresManualIntervention
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStatus {
    /// Saga created, cart not yet validated.
    #[default]
    Started,

    /// Placing inventory holds for the cart lines.
    ReservingInventory,

    /// Charging the payment processor.
    ChargingPayment,

    /// Converting holds into stock decrements; the point of no return.
    CommittingInventory,

    /// Creating the order record.
    CreatingOrder,

    /// Clearing the customer's cart (best effort).
    ClearingCart,

    /// Checkout succeeded (terminal state).
    Completed,

    /// A reversible step failed; undoing completed steps.
    Compensating,

    /// Checkout failed after full compensation (terminal state).
    Failed,

    /// A post-commit step failed; flagged for operator reconciliation
    /// (terminal state).
    RequiresManualIntervention,
}

impl SagaStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Failed | SagaStatus::RequiresManualIntervention
        )
    }

    /// Returns true if a caller-requested cancellation is still honored.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            SagaStatus::ReservingInventory | SagaStatus::ChargingPayment
        )
    }

    /// Returns true if the saga is at or past the inventory commit,
    /// after which failures escalate instead of compensating.
    pub fn past_point_of_no_return(&self) -> bool {
        matches!(
            self,
            SagaStatus::CommittingInventory
                | SagaStatus::CreatingOrder
                | SagaStatus::ClearingCart
                | SagaStatus::Completed
                | SagaStatus::RequiresManualIntervention
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "Started",
            SagaStatus::ReservingInventory => "ReservingInventory",
            SagaStatus::ChargingPayment => "ChargingPayment",
            SagaStatus::CommittingInventory => "CommittingInventory",
            SagaStatus::CreatingOrder => "CreatingOrder",
            SagaStatus::ClearingCart => "ClearingCart",
            SagaStatus::Completed => "Completed",
            SagaStatus::Compensating => "Compensating",
            SagaStatus::Failed => "Failed",
            SagaStatus::RequiresManualIntervention => "RequiresManualIntervention",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
