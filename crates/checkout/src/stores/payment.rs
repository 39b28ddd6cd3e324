//! Payment client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Money;
use tokio::sync::watch;

use crate::error::CheckoutError;

/// Result of a successful charge.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    /// The transaction ID assigned by the payment processor.
    pub transaction_id: String,
}

/// Trait for the external payment processor boundary.
///
/// The orchestrator never retries a charge with a fresh idempotency key
/// for the same saga; the key is how the processor deduplicates.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Charges the given amount. A repeated call with the same
    /// `idempotency_key` returns the original transaction without
    /// charging again.
    async fn charge(
        &self,
        amount: Money,
        currency: &str,
        idempotency_key: &str,
        token: &str,
    ) -> Result<ChargeOutcome, CheckoutError>;

    /// Refunds a previously made charge. Idempotent per transaction.
    async fn refund(&self, transaction_id: &str) -> Result<(), CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    /// idempotency key → (transaction id, amount)
    charges: HashMap<String, (String, Money)>,
    refunded: Vec<String>,
    next_id: u32,
    charge_attempts: u32,
    decline_reason: Option<String>,
    fail_on_charge: bool,
    fail_on_refund: bool,
}

/// In-memory payment client.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentClient {
    state: Arc<RwLock<InMemoryPaymentState>>,
    charge_gate: Arc<watch::Sender<bool>>,
}

impl Default for InMemoryPaymentClient {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            charge_gate: Arc::new(watch::Sender::new(false)),
        }
    }
}

impl InMemoryPaymentClient {
    /// Creates a new in-memory payment client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the processor to decline charges with the given reason.
    pub fn set_decline(&self, reason: impl Into<String>) {
        self.state.write().unwrap().decline_reason = Some(reason.into());
    }

    /// Clears a previously configured decline.
    pub fn clear_decline(&self) {
        self.state.write().unwrap().decline_reason = None;
    }

    /// Configures the processor to be unreachable for charges.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().unwrap().fail_on_charge = fail;
    }

    /// Configures the processor to be unreachable for refunds.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refund = fail;
    }

    /// Parks incoming charge calls until released with `false`, letting a
    /// test act while a saga sits in its charge step.
    pub fn set_hold_on_charge(&self, hold: bool) {
        self.charge_gate.send_replace(hold);
    }

    /// Returns the number of charge calls received, including calls that
    /// were deduplicated, declined or failed.
    pub fn charge_attempts(&self) -> u32 {
        self.state.read().unwrap().charge_attempts
    }

    /// Returns the number of distinct charges taken.
    pub fn charge_count(&self) -> usize {
        self.state.read().unwrap().charges.len()
    }

    /// Returns the number of refunds processed.
    pub fn refund_count(&self) -> usize {
        self.state.read().unwrap().refunded.len()
    }

    /// Returns true if the given transaction has been refunded.
    pub fn is_refunded(&self, transaction_id: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .refunded
            .iter()
            .any(|t| t == transaction_id)
    }
}

#[async_trait]
impl PaymentClient for InMemoryPaymentClient {
    async fn charge(
        &self,
        amount: Money,
        _currency: &str,
        idempotency_key: &str,
        _token: &str,
    ) -> Result<ChargeOutcome, CheckoutError> {
        self.state.write().unwrap().charge_attempts += 1;

        // The client owns the gate sender, so wait_for cannot see it
        // dropped mid-call.
        let mut gate = self.charge_gate.subscribe();
        let _ = gate.wait_for(|held| !held).await;

        let mut state = self.state.write().unwrap();

        // Deduplication happens before any failure simulation, matching
        // a real processor: a replayed key returns the stored outcome.
        if let Some((transaction_id, _)) = state.charges.get(idempotency_key) {
            return Ok(ChargeOutcome {
                transaction_id: transaction_id.clone(),
            });
        }

        if state.fail_on_charge {
            return Err(CheckoutError::DownstreamUnavailable {
                step: "charge_payment",
                reason: "payment processor unreachable".to_string(),
            });
        }

        if let Some(reason) = &state.decline_reason {
            return Err(CheckoutError::PaymentDeclined {
                reason: reason.clone(),
            });
        }

        state.next_id += 1;
        let transaction_id = format!("TXN-{:04}", state.next_id);
        state
            .charges
            .insert(idempotency_key.to_string(), (transaction_id.clone(), amount));

        Ok(ChargeOutcome { transaction_id })
    }

    async fn refund(&self, transaction_id: &str) -> Result<(), CheckoutError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_refund {
            return Err(CheckoutError::DownstreamUnavailable {
                step: "refund_payment",
                reason: "payment processor unreachable".to_string(),
            });
        }

        let transaction_id = transaction_id.to_string();
        if !state.refunded.contains(&transaction_id) {
            state.refunded.push(transaction_id);
        }
        Ok(())
    }
}
