//! Checkout execution, status and cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{
    CheckoutOrchestrator, CheckoutRequest, InMemoryCartStore, InMemoryOrderStore,
    InMemoryPaymentClient, SagaEvent, SagaStatus,
};
use common::{CustomerId, SagaId};
use inventory::InMemoryInventoryLedger;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: CheckoutOrchestrator<
        InMemoryInventoryLedger,
        InMemoryPaymentClient,
        InMemoryOrderStore,
        InMemoryCartStore,
    >,
    pub ledger: InMemoryInventoryLedger,
    pub payment: InMemoryPaymentClient,
    pub orders: InMemoryOrderStore,
    pub carts: InMemoryCartStore,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutApiRequest {
    /// Client-supplied saga ID makes the request replayable.
    pub saga_id: Option<SagaId>,
    pub customer_id: CustomerId,
    pub payment_token: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub saga_id: String,
    pub status: String,
    pub order_id: Option<String>,
}

#[derive(Serialize)]
pub struct SagaStatusResponse {
    pub saga_id: String,
    pub customer_id: String,
    pub status: String,
    pub completed_steps: Vec<String>,
    pub reservation_ids: Vec<String>,
    pub payment_transaction_id: Option<String>,
    pub order_id: Option<String>,
    pub failure_reason: Option<String>,
    pub refund_outcome: Option<String>,
    pub history: Vec<SagaEvent>,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub saga_id: String,
    pub cancelled: bool,
}

// -- Handlers --

/// POST /checkout — run a checkout saga to a terminal state.
#[tracing::instrument(skip(state, req))]
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutApiRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let mut request = CheckoutRequest::new(req.customer_id, req.payment_token);
    if let Some(saga_id) = req.saga_id {
        request = request.with_saga_id(saga_id);
    }

    let outcome = state.orchestrator.execute(request).await?;

    // Manual intervention is not an error for the caller: the money side
    // is being reconciled and the saga id is the reference to poll.
    let (code, status) = match outcome.status {
        SagaStatus::RequiresManualIntervention => (StatusCode::ACCEPTED, "processing".to_string()),
        other => (StatusCode::OK, other.to_string()),
    };

    Ok((
        code,
        Json(CheckoutResponse {
            saga_id: outcome.saga_id.to_string(),
            status,
            order_id: outcome.order_id.map(|id| id.to_string()),
        }),
    ))
}

/// GET /checkout/:saga_id — full saga state including the event history.
#[tracing::instrument(skip(state))]
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let saga_id = parse_saga_id(&id)?;
    let saga = state
        .orchestrator
        .get_saga(saga_id)
        .ok_or_else(|| ApiError::NotFound(format!("Saga {id} not found")))?;

    Ok(Json(SagaStatusResponse {
        saga_id: saga_id.to_string(),
        customer_id: saga
            .customer_id()
            .map(|c| c.to_string())
            .unwrap_or_default(),
        status: saga.status().to_string(),
        completed_steps: saga.completed_steps().to_vec(),
        reservation_ids: saga
            .reservation_ids()
            .iter()
            .map(|r| r.to_string())
            .collect(),
        payment_transaction_id: saga.payment_transaction_id().map(String::from),
        order_id: saga.order_id().map(|id| id.to_string()),
        failure_reason: saga.failure_reason().map(String::from),
        refund_outcome: saga.refund_outcome().map(String::from),
        history: saga.history().to_vec(),
    }))
}

/// POST /checkout/:saga_id/cancel — request cancellation of an in-flight saga.
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let saga_id = parse_saga_id(&id)?;
    let cancelled = state.orchestrator.cancel(saga_id);

    Ok(Json(CancelResponse {
        saga_id: saga_id.to_string(),
        cancelled,
    }))
}

fn parse_saga_id(id: &str) -> Result<SagaId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid saga ID format: {e}")))?;
    Ok(SagaId::from_uuid(uuid))
}
