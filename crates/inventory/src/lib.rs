//! Inventory reservation ledger.
//!
//! Tracks on-hand stock and in-flight reservations per SKU. A reservation
//! is a provisional, time-bounded hold against availability:
//!
//! ```text
//! Reserved ──┬──► Committed   (stock decremented, terminal)
//!            └──► Released    (hold returned to the pool, terminal)
//! ```
//!
//! The availability check and reservation write happen under a single
//! per-SKU lock, so concurrent reserves for the same SKU can never jointly
//! oversell. Reserved holds past their TTL are swept back to the pool by
//! [`ReservationSweeper`].

pub mod error;
pub mod ledger;
pub mod reservation;
pub mod sweeper;

pub use error::InventoryError;
pub use ledger::{InMemoryInventoryLedger, InventoryLedger};
pub use reservation::{Reservation, ReservationStatus};
pub use sweeper::ReservationSweeper;
