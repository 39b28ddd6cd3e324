//! Checkout error taxonomy.

use common::{SagaId, Sku};
use inventory::InventoryError;
use thiserror::Error;

/// Errors a checkout attempt can surface to its caller.
#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    /// The request was rejected before any side effect (empty/missing cart).
    #[error("validation failed: {0}")]
    Validation(String),

    /// One or more SKUs could not be reserved; fully compensated.
    #[error("insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: Sku,
        requested: u32,
        available: u32,
    },

    /// The payment processor rejected the charge; fully compensated.
    #[error("payment declined: {reason}")]
    PaymentDeclined { reason: String },

    /// A downstream call failed or timed out on a reversible step.
    #[error("downstream unavailable during {step}: {reason}")]
    DownstreamUnavailable { step: &'static str, reason: String },

    /// A failure strictly after the inventory commit. Never compensated
    /// automatically; the saga is flagged for manual reconciliation.
    #[error("inconsistent state in saga {saga_id}: {detail}")]
    InconsistentState { saga_id: SagaId, detail: String },

    /// The caller cancelled the checkout while it was still reversible.
    #[error("checkout cancelled by caller")]
    Cancelled,
}

impl CheckoutError {
    /// Stable machine-readable kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::Validation(_) => "validation_error",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::PaymentDeclined { .. } => "payment_declined",
            CheckoutError::DownstreamUnavailable { .. } => "downstream_unavailable",
            CheckoutError::InconsistentState { .. } => "inconsistent_state",
            CheckoutError::Cancelled => "cancelled",
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CheckoutError::DownstreamUnavailable { .. })
    }

    /// Maps a ledger error surfaced during the named step.
    pub fn from_inventory(step: &'static str, err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientStock {
                sku,
                requested,
                available,
            } => CheckoutError::InsufficientStock {
                sku,
                requested,
                available,
            },
            other => CheckoutError::DownstreamUnavailable {
                step,
                reason: other.to_string(),
            },
        }
    }
}
