//! Order creation and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{Order, OrderLine, OrderStatus, OrderStore};
use common::{CustomerId, Money, OrderId, Sku};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::checkout::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    /// Client-supplied for idempotent retries; generated when omitted.
    pub order_id: Option<OrderId>,
    pub customer_id: CustomerId,
    pub lines: Vec<OrderLineRequest>,
    pub total_cents: i64,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub lines: Vec<OrderLineResponse>,
    pub total_cents: i64,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            customer_id: order.customer_id.to_string(),
            status: order.status.to_string(),
            lines: order
                .lines
                .into_iter()
                .map(|line| OrderLineResponse {
                    sku: line.sku.to_string(),
                    name: line.name,
                    unit_price_cents: line.unit_price.cents(),
                    quantity: line.quantity,
                })
                .collect(),
            total_cents: order.total.cents(),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /orders — create an order, idempotent by order id.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order_id = req.order_id.unwrap_or_else(OrderId::new);
    let lines: Vec<OrderLine> = req
        .lines
        .into_iter()
        .map(|line| OrderLine {
            sku: Sku::new(line.sku),
            name: line.name,
            unit_price: Money::from_cents(line.unit_price_cents),
            quantity: line.quantity,
        })
        .collect();

    let order = state
        .orders
        .create_idempotent(
            order_id,
            req.customer_id,
            lines,
            Money::from_cents(req.total_cents),
            OrderStatus::Paid,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders/:id — look up an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let uuid = uuid::Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID format: {e}")))?;

    let order = state
        .orders
        .get(OrderId::from_uuid(uuid))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order.into()))
}
