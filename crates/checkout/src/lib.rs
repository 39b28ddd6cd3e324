//! Checkout saga orchestration.
//!
//! Coordinates a purchase across independently-owned resources (cart,
//! inventory ledger, payment processor and order store) without a shared
//! transaction, using compensation instead of rollback.
//!
//! The checkout saga runs these steps in order:
//! 1. Get cart (read-only, validation)
//! 2. Reserve inventory (one hold per cart line)
//! 3. Charge payment (single charge, idempotency key from the saga id)
//! 4. Commit inventory (the point of no return)
//! 5. Create order (idempotent by derived order id)
//! 6. Clear cart (best effort)
//!
//! A failure before step 4 unwinds the undo stack (releasing holds,
//! refunding the charge) and fails the saga. A failure after step 4 is not
//! automatically compensable: the orchestrator attempts a best-effort
//! refund and escalates to manual intervention.

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod retry;
pub mod saga;
pub mod state;
pub mod steps;
pub mod stores;

pub use error::CheckoutError;
pub use events::SagaEvent;
pub use orchestrator::{
    CheckoutOrchestrator, CheckoutOutcome, CheckoutRequest, OrchestratorConfig,
};
pub use retry::RetryPolicy;
pub use saga::CheckoutSaga;
pub use state::SagaStatus;
pub use stores::{
    Cart, CartLine, CartStore, ChargeOutcome, InMemoryCartStore, InMemoryOrderStore,
    InMemoryPaymentClient, Order, OrderLine, OrderStatus, OrderStore, PaymentClient,
};
