//! Inventory ledger error types.

use common::{ReservationId, Sku};
use thiserror::Error;

use crate::reservation::ReservationStatus;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Not enough available stock to cover the requested hold.
    #[error("insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: Sku,
        requested: u32,
        available: u32,
    },

    /// No reservation exists with the given ID.
    #[error("reservation not found: {0}")]
    NotFound(ReservationId),

    /// The reservation is already in a terminal state that forbids the operation.
    #[error("reservation {reservation_id} is already {status}")]
    AlreadyTerminal {
        reservation_id: ReservationId,
        status: ReservationStatus,
    },
}

/// Convenience type alias for ledger results.
pub type Result<T> = std::result::Result<T, InventoryError>;
