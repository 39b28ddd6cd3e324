//! The checkout saga orchestrator.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use common::{CustomerId, OrderId, ReservationId, SagaId};
use futures_util::future::join_all;
use inventory::{InventoryLedger, ReservationStatus};

use crate::error::CheckoutError;
use crate::events::SagaEvent;
use crate::retry::RetryPolicy;
use crate::saga::CheckoutSaga;
use crate::state::SagaStatus;
use crate::steps;
use crate::stores::{CartStore, Order, OrderLine, OrderStatus, OrderStore, PaymentClient};

/// Tunables for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on any single downstream call.
    pub call_timeout: Duration,
    /// Retry policy for transient failures on reversible steps.
    pub retry: RetryPolicy,
    /// Currency passed to the payment processor.
    pub currency: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            currency: "usd".to_string(),
        }
    }
}

/// A checkout request entering the orchestrator.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Saga ID; client-supplied for replayable requests.
    pub saga_id: SagaId,
    /// The customer checking out.
    pub customer_id: CustomerId,
    /// Opaque payment token forwarded to the processor.
    pub payment_token: String,
}

impl CheckoutRequest {
    /// Creates a request with a fresh saga ID.
    pub fn new(customer_id: CustomerId, payment_token: impl Into<String>) -> Self {
        Self {
            saga_id: SagaId::new(),
            customer_id,
            payment_token: payment_token.into(),
        }
    }

    /// Sets a client-supplied saga ID, making the request replayable.
    pub fn with_saga_id(mut self, saga_id: SagaId) -> Self {
        self.saga_id = saga_id;
        self
    }
}

/// The caller-visible result of a checkout attempt.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    /// Reference ID for polling and replay.
    pub saga_id: SagaId,
    /// Terminal (or current, for replayed in-flight requests) status.
    pub status: SagaStatus,
    /// The created order, when the checkout completed.
    pub order_id: Option<OrderId>,
}

/// An undo record for one completed reversible step. Pushed as the step
/// succeeds, popped in reverse on compensation.
#[derive(Debug)]
enum Undo {
    ReleaseReservation(ReservationId),
    RefundPayment(String),
}

#[derive(Debug, Default)]
struct SagaEntry {
    saga: CheckoutSaga,
    cancel_requested: bool,
}

/// Orchestrates checkout sagas across the inventory ledger, payment
/// processor, order store and cart store.
///
/// Each call to [`execute`](Self::execute) runs one saga to a terminal
/// state. Saga snapshots are published to an internal registry after every
/// recorded event, so concurrent status polls and replays always see the
/// latest state.
pub struct CheckoutOrchestrator<L, P, O, C>
where
    L: InventoryLedger,
    P: PaymentClient,
    O: OrderStore,
    C: CartStore,
{
    ledger: L,
    payment: P,
    orders: O,
    carts: C,
    registry: Arc<RwLock<HashMap<SagaId, SagaEntry>>>,
    config: OrchestratorConfig,
}

impl<L, P, O, C> CheckoutOrchestrator<L, P, O, C>
where
    L: InventoryLedger,
    P: PaymentClient,
    O: OrderStore,
    C: CartStore,
{
    /// Creates an orchestrator with default configuration.
    pub fn new(ledger: L, payment: P, orders: O, carts: C) -> Self {
        Self::with_config(ledger, payment, orders, carts, OrchestratorConfig::default())
    }

    /// Creates an orchestrator with explicit configuration.
    pub fn with_config(
        ledger: L,
        payment: P,
        orders: O,
        carts: C,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            ledger,
            payment,
            orders,
            carts,
            registry: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Executes a checkout saga to a terminal state.
    ///
    /// Idempotent on the request's saga ID: a replayed request never
    /// re-runs steps, it returns the recorded outcome (or current status
    /// for a saga still in flight).
    #[tracing::instrument(
        skip(self, request),
        fields(
            saga_type = steps::SAGA_TYPE,
            saga_id = %request.saga_id,
            customer_id = %request.customer_id,
        )
    )]
    pub async fn execute(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let saga_start = std::time::Instant::now();

        // Replay check and registration under one lock, so two identical
        // concurrent requests cannot both start the saga.
        let mut saga = {
            let mut registry = self.registry.write().unwrap();
            if let Some(entry) = registry.get(&request.saga_id) {
                tracing::info!(status = %entry.saga.status(), "replayed checkout request");
                return Ok(outcome(request.saga_id, &entry.saga));
            }
            metrics::counter!("checkout_executions_total").increment(1);
            let mut saga = CheckoutSaga::default();
            saga.record(SagaEvent::saga_started(request.saga_id, request.customer_id));
            registry.insert(
                request.saga_id,
                SagaEntry {
                    saga: saga.clone(),
                    cancel_requested: false,
                },
            );
            saga
        };

        let mut undo_stack: Vec<Undo> = Vec::new();

        // Step 1: Get cart. Read-only; an empty or missing cart ends the
        // saga before any side effect.
        self.note(&mut saga, SagaEvent::step_started(steps::STEP_GET_CART));
        let cart = match self
            .retrying(steps::STEP_GET_CART, || self.carts.get(request.customer_id))
            .await
        {
            Ok(Some(cart)) if !cart.is_empty() => cart,
            Ok(_) => {
                let err = CheckoutError::Validation(format!(
                    "no cart with items for customer {}",
                    request.customer_id
                ));
                return self.reject(&mut saga, steps::STEP_GET_CART, err);
            }
            Err(err) => return self.reject(&mut saga, steps::STEP_GET_CART, err),
        };
        self.note(&mut saga, SagaEvent::step_completed(steps::STEP_GET_CART));

        // Step 2: Reserve inventory. One hold per line, different SKUs
        // reserved concurrently; the id derivation makes each hold
        // idempotent within this saga.
        self.note(
            &mut saga,
            SagaEvent::step_started(steps::STEP_RESERVE_INVENTORY),
        );
        if self.cancel_requested(request.saga_id) {
            return self
                .fail_and_compensate(
                    &mut saga,
                    steps::STEP_RESERVE_INVENTORY,
                    &mut undo_stack,
                    CheckoutError::Cancelled,
                )
                .await;
        }

        let reserve_calls = cart.lines.iter().map(|line| {
            let reservation_id = ReservationId::for_saga_sku(request.saga_id, &line.sku);
            async move {
                self.retrying(steps::STEP_RESERVE_INVENTORY, || async {
                    self.ledger
                        .reserve(line.sku.clone(), line.quantity, reservation_id)
                        .await
                        .map_err(|e| {
                            CheckoutError::from_inventory(steps::STEP_RESERVE_INVENTORY, e)
                        })
                })
                .await
            }
        });

        let mut first_failure = None;
        for result in join_all(reserve_calls).await {
            match result {
                Ok(reservation) => undo_stack.push(Undo::ReleaseReservation(reservation.id)),
                Err(err) => {
                    first_failure.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_failure {
            return self
                .fail_and_compensate(
                    &mut saga,
                    steps::STEP_RESERVE_INVENTORY,
                    &mut undo_stack,
                    err,
                )
                .await;
        }

        let reservation_ids: Vec<ReservationId> = undo_stack
            .iter()
            .map(|undo| match undo {
                Undo::ReleaseReservation(id) => *id,
                Undo::RefundPayment(_) => unreachable!("no charge before this step"),
            })
            .collect();
        self.note(
            &mut saga,
            SagaEvent::reservations_acquired(steps::STEP_RESERVE_INVENTORY, reservation_ids),
        );

        // Step 3: Charge payment. One charge for the cart total; the
        // idempotency key is fixed by the saga id so a retry can never
        // double-charge.
        self.note(
            &mut saga,
            SagaEvent::step_started(steps::STEP_CHARGE_PAYMENT),
        );
        if self.cancel_requested(request.saga_id) {
            return self
                .fail_and_compensate(
                    &mut saga,
                    steps::STEP_CHARGE_PAYMENT,
                    &mut undo_stack,
                    CheckoutError::Cancelled,
                )
                .await;
        }

        let amount = cart.total();
        let idempotency_key = format!("checkout-{}", request.saga_id);
        let transaction_id = match self
            .retrying(steps::STEP_CHARGE_PAYMENT, || {
                self.payment.charge(
                    amount,
                    &self.config.currency,
                    &idempotency_key,
                    &request.payment_token,
                )
            })
            .await
        {
            Ok(charge) => charge.transaction_id,
            Err(err) => {
                return self
                    .fail_and_compensate(
                        &mut saga,
                        steps::STEP_CHARGE_PAYMENT,
                        &mut undo_stack,
                        err,
                    )
                    .await;
            }
        };
        undo_stack.push(Undo::RefundPayment(transaction_id.clone()));
        self.note(
            &mut saga,
            SagaEvent::payment_charged(steps::STEP_CHARGE_PAYMENT, transaction_id.clone()),
        );

        // Last cancellation window: the charge is taken but still
        // refundable because nothing has been committed yet.
        if self.cancel_requested(request.saga_id) {
            return self
                .fail_and_compensate(
                    &mut saga,
                    steps::STEP_CHARGE_PAYMENT,
                    &mut undo_stack,
                    CheckoutError::Cancelled,
                )
                .await;
        }

        // Step 4: Commit inventory, the point of no return. From here on
        // failures escalate to manual intervention instead of compensating.
        self.note(
            &mut saga,
            SagaEvent::step_started(steps::STEP_COMMIT_INVENTORY),
        );
        for reservation_id in saga.reservation_ids().to_vec() {
            if let Err(err) = self.commit_reservation(reservation_id).await {
                let detail = format!("commit of reservation {reservation_id} failed: {err}");
                return self
                    .escalate(
                        &mut saga,
                        steps::STEP_COMMIT_INVENTORY,
                        &transaction_id,
                        request.saga_id,
                        detail,
                    )
                    .await;
            }
        }
        self.note(
            &mut saga,
            SagaEvent::step_completed(steps::STEP_COMMIT_INVENTORY),
        );

        // Step 5: Create order, idempotent by the derived order id.
        self.note(&mut saga, SagaEvent::step_started(steps::STEP_CREATE_ORDER));
        let order_id = OrderId::for_saga(request.saga_id);
        let lines: Vec<OrderLine> = cart.lines.iter().map(OrderLine::from).collect();
        let order = match self
            .create_order_checked(order_id, request.customer_id, lines, amount)
            .await
        {
            Ok(order) => order,
            Err(err) => {
                let detail = format!("order creation failed after inventory commit: {err}");
                return self
                    .escalate(
                        &mut saga,
                        steps::STEP_CREATE_ORDER,
                        &transaction_id,
                        request.saga_id,
                        detail,
                    )
                    .await;
            }
        };
        self.note(
            &mut saga,
            SagaEvent::order_created(steps::STEP_CREATE_ORDER, order.id),
        );

        // Step 6: Clear cart. Best effort; the purchase already succeeded.
        self.note(&mut saga, SagaEvent::step_started(steps::STEP_CLEAR_CART));
        match self
            .retrying(steps::STEP_CLEAR_CART, || {
                self.carts.clear(request.customer_id)
            })
            .await
        {
            Ok(()) => self.note(&mut saga, SagaEvent::step_completed(steps::STEP_CLEAR_CART)),
            Err(err) => {
                tracing::warn!(error = %err, "cart clear failed after successful checkout");
                self.note(
                    &mut saga,
                    SagaEvent::step_failed(steps::STEP_CLEAR_CART, err.to_string()),
                );
            }
        }

        self.note(&mut saga, SagaEvent::saga_completed());
        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("checkout_duration_seconds").record(duration);
        metrics::counter!("checkout_completed").increment(1);
        tracing::info!(order_id = %order.id, duration, "checkout completed");

        Ok(outcome(request.saga_id, &saga))
    }

    /// Requests cancellation of an in-flight saga.
    ///
    /// Returns true if the request will be honored. Cancellation is only
    /// honored while the saga is still reversible (reserving or charging);
    /// once the inventory commit starts the saga runs to completion.
    pub fn cancel(&self, saga_id: SagaId) -> bool {
        let mut registry = self.registry.write().unwrap();
        match registry.get_mut(&saga_id) {
            Some(entry) if entry.saga.status().can_cancel() => {
                entry.cancel_requested = true;
                tracing::info!(%saga_id, "cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Returns the latest snapshot of a saga.
    pub fn get_saga(&self, saga_id: SagaId) -> Option<CheckoutSaga> {
        self.registry
            .read()
            .unwrap()
            .get(&saga_id)
            .map(|entry| entry.saga.clone())
    }

    /// Records an event on the saga and publishes the snapshot.
    fn note(&self, saga: &mut CheckoutSaga, event: SagaEvent) {
        saga.record(event);
        if let Some(saga_id) = saga.saga_id() {
            let mut registry = self.registry.write().unwrap();
            if let Some(entry) = registry.get_mut(&saga_id) {
                entry.saga = saga.clone();
            }
        }
    }

    fn cancel_requested(&self, saga_id: SagaId) -> bool {
        self.registry
            .read()
            .unwrap()
            .get(&saga_id)
            .is_some_and(|entry| entry.cancel_requested)
    }

    /// Runs a downstream call under the configured timeout, retrying
    /// transient failures with backoff.
    async fn retrying<T, F, Fut>(&self, step: &'static str, mut call: F) -> Result<T, CheckoutError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CheckoutError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match tokio::time::timeout(self.config.call_timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(_) => CheckoutError::DownstreamUnavailable {
                    step,
                    reason: "call timed out".to_string(),
                },
            };
            if !err.is_transient() || attempt >= self.config.retry.max_attempts {
                return Err(err);
            }
            tracing::debug!(step, attempt, error = %err, "transient failure, retrying");
            tokio::time::sleep(self.config.retry.delay_after(attempt)).await;
        }
    }

    /// Commits one reservation, re-querying ledger state after an
    /// ambiguous timeout instead of assuming failure.
    async fn commit_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<(), CheckoutError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match tokio::time::timeout(
                self.config.call_timeout,
                self.ledger.commit(reservation_id),
            )
            .await
            {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) => {
                    return Err(CheckoutError::from_inventory(
                        steps::STEP_COMMIT_INVENTORY,
                        err,
                    ));
                }
                Err(_) => {
                    // The commit may have landed server-side before the
                    // timeout; never conclude failure without looking.
                    match self.ledger.get_reservation(reservation_id).await {
                        Some(r) if r.status == ReservationStatus::Committed => return Ok(()),
                        Some(r)
                            if r.status == ReservationStatus::Reserved
                                && attempt < self.config.retry.max_attempts =>
                        {
                            tokio::time::sleep(self.config.retry.delay_after(attempt)).await;
                        }
                        Some(r) => {
                            return Err(CheckoutError::DownstreamUnavailable {
                                step: steps::STEP_COMMIT_INVENTORY,
                                reason: format!(
                                    "commit timed out, reservation left {}",
                                    r.status
                                ),
                            });
                        }
                        None => {
                            return Err(CheckoutError::DownstreamUnavailable {
                                step: steps::STEP_COMMIT_INVENTORY,
                                reason: "commit timed out, reservation not found".to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Creates the order, re-querying the store after a failure in case
    /// the create landed before the error surfaced.
    async fn create_order_checked(
        &self,
        order_id: OrderId,
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
        total: common::Money,
    ) -> Result<Order, CheckoutError> {
        let result = self
            .retrying(steps::STEP_CREATE_ORDER, || {
                self.orders.create_idempotent(
                    order_id,
                    customer_id,
                    lines.clone(),
                    total,
                    OrderStatus::Paid,
                )
            })
            .await;

        match result {
            Ok(order) => Ok(order),
            Err(err) => {
                if let Ok(Ok(Some(order))) =
                    tokio::time::timeout(self.config.call_timeout, self.orders.get(order_id)).await
                {
                    return Ok(order);
                }
                Err(err)
            }
        }
    }

    /// Fails the saga before any side effect was taken.
    fn reject(
        &self,
        saga: &mut CheckoutSaga,
        step: &'static str,
        err: CheckoutError,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        self.note(saga, SagaEvent::step_failed(step, err.to_string()));
        self.note(saga, SagaEvent::saga_failed(err.to_string()));
        metrics::counter!("checkout_failed").increment(1);
        tracing::warn!(error = %err, "checkout rejected before any side effect");
        Err(err)
    }

    /// Records the step failure, unwinds the undo stack and fails the saga.
    async fn fail_and_compensate(
        &self,
        saga: &mut CheckoutSaga,
        step: &'static str,
        undo_stack: &mut Vec<Undo>,
        err: CheckoutError,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        self.note(saga, SagaEvent::step_failed(step, err.to_string()));
        self.note(saga, SagaEvent::compensation_started(step));

        while let Some(undo) = undo_stack.pop() {
            match undo {
                Undo::ReleaseReservation(reservation_id) => {
                    let result = tokio::time::timeout(
                        self.config.call_timeout,
                        self.ledger.release(reservation_id),
                    )
                    .await;
                    match result {
                        Ok(Ok(())) => self.note(
                            saga,
                            SagaEvent::compensation_step_completed(steps::STEP_RESERVE_INVENTORY),
                        ),
                        Ok(Err(release_err)) => self.note(
                            saga,
                            SagaEvent::compensation_step_failed(
                                steps::STEP_RESERVE_INVENTORY,
                                release_err.to_string(),
                            ),
                        ),
                        Err(_) => self.note(
                            saga,
                            SagaEvent::compensation_step_failed(
                                steps::STEP_RESERVE_INVENTORY,
                                "release timed out",
                            ),
                        ),
                    }
                }
                Undo::RefundPayment(transaction_id) => {
                    let result = tokio::time::timeout(
                        self.config.call_timeout,
                        self.payment.refund(&transaction_id),
                    )
                    .await;
                    match result {
                        Ok(Ok(())) => self.note(
                            saga,
                            SagaEvent::compensation_step_completed(steps::STEP_CHARGE_PAYMENT),
                        ),
                        Ok(Err(refund_err)) => self.note(
                            saga,
                            SagaEvent::compensation_step_failed(
                                steps::STEP_CHARGE_PAYMENT,
                                refund_err.to_string(),
                            ),
                        ),
                        Err(_) => self.note(
                            saga,
                            SagaEvent::compensation_step_failed(
                                steps::STEP_CHARGE_PAYMENT,
                                "refund timed out",
                            ),
                        ),
                    }
                }
            }
        }

        self.note(saga, SagaEvent::saga_failed(err.to_string()));
        metrics::counter!("checkout_failed").increment(1);
        tracing::warn!(error = %err, failed_step = step, "checkout failed and compensated");
        Err(err)
    }

    /// Handles a failure past the point of no return: best-effort refund,
    /// then flag for operator reconciliation. Never compensates inventory.
    async fn escalate(
        &self,
        saga: &mut CheckoutSaga,
        step: &'static str,
        transaction_id: &str,
        saga_id: SagaId,
        detail: String,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let err = CheckoutError::InconsistentState { saga_id, detail };
        self.note(saga, SagaEvent::step_failed(step, err.to_string()));

        let refund_outcome = match tokio::time::timeout(
            self.config.call_timeout,
            self.payment.refund(transaction_id),
        )
        .await
        {
            Ok(Ok(())) => format!("refunded {transaction_id}"),
            Ok(Err(refund_err)) => format!("refund of {transaction_id} failed: {refund_err}"),
            Err(_) => format!("refund of {transaction_id} timed out"),
        };

        self.note(
            saga,
            SagaEvent::manual_intervention_required(err.to_string(), refund_outcome.clone()),
        );
        metrics::counter!("checkout_manual_intervention").increment(1);
        tracing::error!(
            failed_step = step,
            refund_outcome,
            error = %err,
            "failure past the point of no return, flagged for manual reconciliation"
        );

        // The caller gets a definitive reference, not the internal
        // inconsistency.
        Ok(outcome(saga_id, saga))
    }
}

fn outcome(saga_id: SagaId, saga: &CheckoutSaga) -> CheckoutOutcome {
    CheckoutOutcome {
        saga_id,
        status: saga.status(),
        order_id: saga.order_id(),
    }
}
