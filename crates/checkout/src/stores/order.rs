//! Order store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, Sku};
use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;
use crate::stores::cart::CartLine;

/// The settlement status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Payment captured, inventory committed.
    Paid,
    /// A late failure was recorded against this order.
    Failed,
}

impl OrderStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Paid => "Paid",
            OrderStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable snapshot of a cart line at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// The product purchased.
    pub sku: Sku,
    /// Product name as it appeared in the cart.
    pub name: String,
    /// Price per unit at purchase time.
    pub unit_price: Money,
    /// Quantity purchased.
    pub quantity: u32,
}

impl From<&CartLine> for OrderLine {
    fn from(line: &CartLine) -> Self {
        Self {
            sku: line.sku.clone(),
            name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
        }
    }
}

/// A completed purchase record. Created once, never mutated by the
/// orchestrator afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// The order ID (derived from the saga id; the idempotency key).
    pub id: OrderId,
    /// The purchasing customer.
    pub customer_id: CustomerId,
    /// Line item snapshots.
    pub lines: Vec<OrderLine>,
    /// Total charged.
    pub total: Money,
    /// Settlement status.
    pub status: OrderStatus,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

/// Trait for the order store boundary.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Creates an order, or returns the existing one for a repeated ID.
    async fn create_idempotent(
        &self,
        id: OrderId,
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
        total: Money,
        status: OrderStatus,
    ) -> Result<Order, CheckoutError>;

    /// Looks up an order by ID.
    async fn get(&self, id: OrderId) -> Result<Option<Order>, CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<OrderId, Order>,
    fail_on_create: bool,
}

/// In-memory order store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderStore {
    /// Creates a new in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail create calls.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Returns the number of orders stored.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_idempotent(
        &self,
        id: OrderId,
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
        total: Money,
        status: OrderStatus,
    ) -> Result<Order, CheckoutError> {
        let mut state = self.state.write().unwrap();

        if let Some(existing) = state.orders.get(&id) {
            return Ok(existing.clone());
        }

        if state.fail_on_create {
            return Err(CheckoutError::DownstreamUnavailable {
                step: "create_order",
                reason: "order store unavailable".to_string(),
            });
        }

        let order = Order {
            id,
            customer_id,
            lines,
            total,
            status,
            created_at: Utc::now(),
        };
        state.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, CheckoutError> {
        Ok(self.state.read().unwrap().orders.get(&id).cloned())
    }
}
