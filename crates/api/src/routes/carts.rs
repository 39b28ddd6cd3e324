//! Cart seeding, lookup and clearing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{Cart, CartLine, CartStore};
use common::{CustomerId, Money};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::checkout::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct PutCartRequest {
    pub lines: Vec<CartLineRequest>,
}

#[derive(Deserialize)]
pub struct CartLineRequest {
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub customer_id: String,
    pub lines: Vec<CartLineResponse>,
    pub total_cents: i64,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            customer_id: cart.customer_id.to_string(),
            total_cents: cart.total().cents(),
            lines: cart
                .lines
                .into_iter()
                .map(|line| CartLineResponse {
                    sku: line.sku.to_string(),
                    name: line.name,
                    unit_price_cents: line.unit_price.cents(),
                    quantity: line.quantity,
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// PUT /carts/:customer_id — replace the customer's cart.
#[tracing::instrument(skip(state, req))]
pub async fn put(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
    Json(req): Json<PutCartRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let customer_id = parse_customer_id(&customer_id)?;
    let lines: Vec<CartLine> = req
        .lines
        .into_iter()
        .map(|line| {
            CartLine::new(
                line.sku,
                line.name,
                Money::from_cents(line.unit_price_cents),
                line.quantity,
            )
        })
        .collect();

    let cart = Cart::new(customer_id, lines);
    state.carts.put(cart.clone());

    Ok(Json(cart.into()))
}

/// GET /carts/:customer_id — look up the customer's cart.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let id = parse_customer_id(&customer_id)?;
    let cart = state
        .carts
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Cart for customer {customer_id} not found")))?;

    Ok(Json(cart.into()))
}

/// DELETE /carts/:customer_id — clear the customer's cart.
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_customer_id(&customer_id)?;
    state.carts.clear(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_customer_id(id: &str) -> Result<CustomerId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid customer ID format: {e}")))?;
    Ok(CustomerId::from_uuid(uuid))
}
