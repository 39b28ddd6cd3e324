//! Cart store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CustomerId, Money, Sku};
use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;

/// One line of a pending cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The product being purchased.
    pub sku: Sku,
    /// Human-readable product name.
    pub name: String,
    /// Price per unit in cents.
    pub unit_price: Money,
    /// Quantity ordered.
    pub quantity: u32,
}

impl CartLine {
    /// Creates a new cart line.
    pub fn new(
        sku: impl Into<Sku>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// Returns the total price for this line (quantity × unit price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A customer's pending cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// The owning customer.
    pub customer_id: CustomerId,
    /// Ordered line items.
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Creates a cart for a customer.
    pub fn new(customer_id: CustomerId, lines: Vec<CartLine>) -> Self {
        Self { customer_id, lines }
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the cart total across all lines.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }
}

/// Trait for cart store operations.
///
/// The checkout core only reads and clears carts; building them belongs
/// to the storefront.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the customer's cart, if one exists.
    async fn get(&self, customer_id: CustomerId) -> Result<Option<Cart>, CheckoutError>;

    /// Removes the customer's cart. Clearing a missing cart is a no-op.
    async fn clear(&self, customer_id: CustomerId) -> Result<(), CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<CustomerId, Cart>,
    fail_on_get: bool,
    fail_on_clear: bool,
}

/// In-memory cart store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartStore {
    /// Creates a new in-memory cart store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a cart for a customer, replacing any existing one.
    pub fn put(&self, cart: Cart) {
        let mut state = self.state.write().unwrap();
        state.carts.insert(cart.customer_id, cart);
    }

    /// Configures the store to fail get calls.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.state.write().unwrap().fail_on_get = fail;
    }

    /// Configures the store to fail clear calls.
    pub fn set_fail_on_clear(&self, fail: bool) {
        self.state.write().unwrap().fail_on_clear = fail;
    }

    /// Returns true if the customer currently has a cart.
    pub fn has_cart(&self, customer_id: CustomerId) -> bool {
        self.state.read().unwrap().carts.contains_key(&customer_id)
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get(&self, customer_id: CustomerId) -> Result<Option<Cart>, CheckoutError> {
        let state = self.state.read().unwrap();
        if state.fail_on_get {
            return Err(CheckoutError::DownstreamUnavailable {
                step: "get_cart",
                reason: "cart store unavailable".to_string(),
            });
        }
        Ok(state.carts.get(&customer_id).cloned())
    }

    async fn clear(&self, customer_id: CustomerId) -> Result<(), CheckoutError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_clear {
            return Err(CheckoutError::DownstreamUnavailable {
                step: "clear_cart",
                reason: "cart store unavailable".to_string(),
            });
        }
        state.carts.remove(&customer_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cart(customer_id: CustomerId) -> Cart {
        Cart::new(
            customer_id,
            vec![
                CartLine::new("SKU-001", "Widget", Money::from_cents(1000), 2),
                CartLine::new("SKU-002", "Gadget", Money::from_cents(2000), 1),
            ],
        )
    }

    #[test]
    fn test_cart_total() {
        let cart = sample_cart(CustomerId::new());
        assert_eq!(cart.total().cents(), 4000);
        assert!(!cart.is_empty());
    }

    #[tokio::test]
    async fn test_put_get_clear() {
        let store = InMemoryCartStore::new();
        let customer_id = CustomerId::new();
        store.put(sample_cart(customer_id));

        let cart = store.get(customer_id).await.unwrap().unwrap();
        assert_eq!(cart.lines.len(), 2);

        store.clear(customer_id).await.unwrap();
        assert!(store.get(customer_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_missing_cart_is_noop() {
        let store = InMemoryCartStore::new();
        store.clear(CustomerId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_flags() {
        let store = InMemoryCartStore::new();
        let customer_id = CustomerId::new();
        store.put(sample_cart(customer_id));

        store.set_fail_on_get(true);
        assert!(store.get(customer_id).await.is_err());

        store.set_fail_on_get(false);
        store.set_fail_on_clear(true);
        assert!(store.clear(customer_id).await.is_err());
        assert!(store.has_cart(customer_id));
    }
}
