//! The checkout saga record.

use common::{CustomerId, OrderId, ReservationId, SagaId};
use serde::{Deserialize, Serialize};

use crate::events::SagaEvent;
use crate::state::SagaStatus;
use crate::steps;

/// One checkout attempt's saga record.
///
/// State changes only by applying [`SagaEvent`]s; the applied events are
/// kept as an append-only history so a manual-intervention ticket carries
/// the full step trace. Owned exclusively by the orchestrator for the
/// lifetime of the attempt; the registry holds read-only snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSaga {
    saga_id: Option<SagaId>,
    customer_id: Option<CustomerId>,
    status: SagaStatus,
    completed_steps: Vec<String>,
    /// Inventory holds acquired by this saga.
    reservation_ids: Vec<ReservationId>,
    /// Payment processor transaction, once charged.
    payment_transaction_id: Option<String>,
    /// The created order, once persisted.
    order_id: Option<OrderId>,
    /// Reason for failure, if any.
    failure_reason: Option<String>,
    /// Outcome of the best-effort refund on the manual-intervention path.
    refund_outcome: Option<String>,
    history: Vec<SagaEvent>,
}

impl CheckoutSaga {
    /// Applies an event and appends it to the history.
    pub fn record(&mut self, event: SagaEvent) {
        self.apply(&event);
        self.history.push(event);
    }

    fn apply(&mut self, event: &SagaEvent) {
        match event {
            SagaEvent::SagaStarted(data) => {
                self.saga_id = Some(data.saga_id);
                self.customer_id = Some(data.customer_id);
                self.status = SagaStatus::Started;
            }
            SagaEvent::StepStarted(data) => {
                if let Some(status) = status_for_step(&data.step) {
                    self.status = status;
                }
            }
            SagaEvent::StepCompleted(data) => {
                self.completed_steps.push(data.step.clone());
                self.reservation_ids.extend(&data.reservation_ids);
                if let Some(txn) = &data.payment_transaction_id {
                    self.payment_transaction_id = Some(txn.clone());
                }
                if let Some(order_id) = data.order_id {
                    self.order_id = Some(order_id);
                }
            }
            SagaEvent::StepFailed(data) => {
                self.failure_reason = Some(data.error.clone());
            }
            SagaEvent::CompensationStarted(_) => {
                self.status = SagaStatus::Compensating;
            }
            SagaEvent::CompensationStepCompleted(_) => {
                // Tracked in history, no state change.
            }
            SagaEvent::CompensationStepFailed(_) => {
                // Undo failures are logged but never stop the chain.
            }
            SagaEvent::SagaCompleted(_) => {
                self.status = SagaStatus::Completed;
            }
            SagaEvent::SagaFailed(data) => {
                self.status = SagaStatus::Failed;
                self.failure_reason = Some(data.reason.clone());
            }
            SagaEvent::ManualInterventionRequired(data) => {
                self.status = SagaStatus::RequiresManualIntervention;
                self.failure_reason = Some(data.reason.clone());
                self.refund_outcome = Some(data.refund_outcome.clone());
            }
        }
    }
}

/// Status the saga enters when the named step starts. `get_cart` runs
/// while still `Started`.
fn status_for_step(step: &str) -> Option<SagaStatus> {
    match step {
        steps::STEP_RESERVE_INVENTORY => Some(SagaStatus::ReservingInventory),
        steps::STEP_CHARGE_PAYMENT => Some(SagaStatus::ChargingPayment),
        steps::STEP_COMMIT_INVENTORY => Some(SagaStatus::CommittingInventory),
        steps::STEP_CREATE_ORDER => Some(SagaStatus::CreatingOrder),
        steps::STEP_CLEAR_CART => Some(SagaStatus::ClearingCart),
        _ => None,
    }
}

// Query methods
impl CheckoutSaga {
    /// Returns the saga ID.
    pub fn saga_id(&self) -> Option<SagaId> {
        self.saga_id
    }

    /// Returns the customer this checkout belongs to.
    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    /// Returns the saga status.
    pub fn status(&self) -> SagaStatus {
        self.status
    }

    /// Returns the list of completed step names.
    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Returns the inventory holds acquired by this saga.
    pub fn reservation_ids(&self) -> &[ReservationId] {
        &self.reservation_ids
    }

    /// Returns the payment transaction ID, if charged.
    pub fn payment_transaction_id(&self) -> Option<&str> {
        self.payment_transaction_id.as_deref()
    }

    /// Returns the order ID, if created.
    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    /// Returns the failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns the refund outcome recorded on the manual-intervention path.
    pub fn refund_outcome(&self) -> Option<&str> {
        self.refund_outcome.as_deref()
    }

    /// Returns the full event history.
    pub fn history(&self) -> &[SagaEvent] {
        &self.history
    }
}
