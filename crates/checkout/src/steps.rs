//! Checkout saga step names.

/// The saga type identifier for checkout.
pub const SAGA_TYPE: &str = "Checkout";

/// Step name: Read and validate the customer's cart.
pub const STEP_GET_CART: &str = "get_cart";

/// Step name: Place inventory holds for the cart lines.
pub const STEP_RESERVE_INVENTORY: &str = "reserve_inventory";

/// Step name: Charge the payment processor.
pub const STEP_CHARGE_PAYMENT: &str = "charge_payment";

/// Step name: Commit inventory holds; the point of no return.
pub const STEP_COMMIT_INVENTORY: &str = "commit_inventory";

/// Step name: Create the order record.
pub const STEP_CREATE_ORDER: &str = "create_order";

/// Step name: Clear the customer's cart.
pub const STEP_CLEAR_CART: &str = "clear_cart";
