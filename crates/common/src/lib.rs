//! Shared value types for the checkout core.
//!
//! Typed wrappers around UUIDs and strings keep the different identifier
//! families (sagas, customers, orders, reservations, SKUs) from being mixed
//! up at compile time, and `Money` keeps amounts in integer cents.

pub mod types;

pub use types::{CustomerId, Money, OrderId, ReservationId, SagaId, Sku};
