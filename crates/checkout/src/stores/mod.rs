//! Collaborator contracts and in-memory implementations.
//!
//! The orchestrator only ever talks to the cart store, order store and
//! payment processor through these narrow traits; each implementation
//! owns its own concurrency discipline.

pub mod cart;
pub mod order;
pub mod payment;

pub use cart::{Cart, CartLine, CartStore, InMemoryCartStore};
pub use order::{InMemoryOrderStore, Order, OrderLine, OrderStatus, OrderStore};
pub use payment::{ChargeOutcome, InMemoryPaymentClient, PaymentClient};
