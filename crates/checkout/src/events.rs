//! Saga audit-trail events.
//!
//! Every state change of a checkout saga is recorded as one of these
//! events. The full event history lives on the saga record and is what a
//! manual-intervention ticket hands to the operator.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, ReservationId, SagaId};
use serde::{Deserialize, Serialize};

/// Events that can occur during checkout saga execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// Saga execution started.
    SagaStarted(SagaStartedData),

    /// A saga step started execution.
    StepStarted(StepData),

    /// A saga step completed successfully.
    StepCompleted(StepCompletedData),

    /// A saga step failed.
    StepFailed(StepFailedData),

    /// Compensation started after a reversible step failed.
    CompensationStarted(CompensationData),

    /// An undo record was applied successfully.
    CompensationStepCompleted(StepData),

    /// An undo record failed (logged, compensation continues).
    CompensationStepFailed(StepFailedData),

    /// Saga completed successfully.
    SagaCompleted(SagaCompletedData),

    /// Saga failed after compensation.
    SagaFailed(SagaFailedData),

    /// A post-commit failure was escalated for operator reconciliation.
    ManualInterventionRequired(ManualInterventionData),
}

impl SagaEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::StepStarted(_) => "StepStarted",
            SagaEvent::StepCompleted(_) => "StepCompleted",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            SagaEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            SagaEvent::SagaCompleted(_) => "SagaCompleted",
            SagaEvent::SagaFailed(_) => "SagaFailed",
            SagaEvent::ManualInterventionRequired(_) => "ManualInterventionRequired",
        }
    }
}

/// Data for SagaStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStartedData {
    /// The saga instance ID.
    pub saga_id: SagaId,
    /// The customer checking out.
    pub customer_id: CustomerId,
    /// When the saga started.
    pub started_at: DateTime<Utc>,
}

/// Data for step started / undo completed events (just the step name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepData {
    /// The step name.
    pub step: String,
}

/// Data for StepCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCompletedData {
    /// The step name.
    pub step: String,
    /// Reservation IDs acquired by this step, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reservation_ids: Vec<ReservationId>,
    /// Payment transaction ID (set after the charge step).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_transaction_id: Option<String>,
    /// Order ID (set after the create-order step).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

/// Data for StepFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    /// The step that failed.
    pub step: String,
    /// Error message describing the failure.
    pub error: String,
}

/// Data for CompensationStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step that triggered compensation.
    pub from_step: String,
}

/// Data for SagaCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaCompletedData {
    /// When the saga completed.
    pub completed_at: DateTime<Utc>,
}

/// Data for SagaFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaFailedData {
    /// Reason for failure.
    pub reason: String,
    /// When the saga failed.
    pub failed_at: DateTime<Utc>,
}

/// Data for ManualInterventionRequired event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualInterventionData {
    /// What went wrong after the point of no return.
    pub reason: String,
    /// Outcome of the best-effort payment refund.
    pub refund_outcome: String,
    /// When the saga was flagged.
    pub flagged_at: DateTime<Utc>,
}

// Convenience constructors
impl SagaEvent {
    /// Creates a SagaStarted event.
    pub fn saga_started(saga_id: SagaId, customer_id: CustomerId) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id,
            customer_id,
            started_at: Utc::now(),
        })
    }

    /// Creates a StepStarted event.
    pub fn step_started(step: impl Into<String>) -> Self {
        SagaEvent::StepStarted(StepData { step: step.into() })
    }

    /// Creates a StepCompleted event.
    pub fn step_completed(step: impl Into<String>) -> Self {
        SagaEvent::StepCompleted(StepCompletedData {
            step: step.into(),
            reservation_ids: Vec::new(),
            payment_transaction_id: None,
            order_id: None,
        })
    }

    /// Creates a StepCompleted event carrying acquired reservation IDs.
    pub fn reservations_acquired(
        step: impl Into<String>,
        reservation_ids: Vec<ReservationId>,
    ) -> Self {
        SagaEvent::StepCompleted(StepCompletedData {
            step: step.into(),
            reservation_ids,
            payment_transaction_id: None,
            order_id: None,
        })
    }

    /// Creates a StepCompleted event carrying the payment transaction ID.
    pub fn payment_charged(step: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        SagaEvent::StepCompleted(StepCompletedData {
            step: step.into(),
            reservation_ids: Vec::new(),
            payment_transaction_id: Some(transaction_id.into()),
            order_id: None,
        })
    }

    /// Creates a StepCompleted event carrying the created order ID.
    pub fn order_created(step: impl Into<String>, order_id: OrderId) -> Self {
        SagaEvent::StepCompleted(StepCompletedData {
            step: step.into(),
            reservation_ids: Vec::new(),
            payment_transaction_id: None,
            order_id: Some(order_id),
        })
    }

    /// Creates a StepFailed event.
    pub fn step_failed(step: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step: step.into(),
            error: error.into(),
        })
    }

    /// Creates a CompensationStarted event.
    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        SagaEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    /// Creates a CompensationStepCompleted event.
    pub fn compensation_step_completed(step: impl Into<String>) -> Self {
        SagaEvent::CompensationStepCompleted(StepData { step: step.into() })
    }

    /// Creates a CompensationStepFailed event.
    pub fn compensation_step_failed(step: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::CompensationStepFailed(StepFailedData {
            step: step.into(),
            error: error.into(),
        })
    }

    /// Creates a SagaCompleted event.
    pub fn saga_completed() -> Self {
        SagaEvent::SagaCompleted(SagaCompletedData {
            completed_at: Utc::now(),
        })
    }

    /// Creates a SagaFailed event.
    pub fn saga_failed(reason: impl Into<String>) -> Self {
        SagaEvent::SagaFailed(SagaFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }

    /// Creates a ManualInterventionRequired event.
    pub fn manual_intervention_required(
        reason: impl Into<String>,
        refund_outcome: impl Into<String>,
    ) -> Self {
        SagaEvent::ManualInterventionRequired(ManualInterventionData {
            reason: reason.into(),
            refund_outcome: refund_outcome.into(),
            flagged_at: Utc::now(),
        })
    }
}
