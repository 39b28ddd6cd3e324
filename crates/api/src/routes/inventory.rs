//! Inventory seeding, query and reservation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ReservationId, Sku};
use inventory::{InventoryLedger, Reservation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::checkout::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct SetStockRequest {
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct ReserveRequest {
    pub quantity: u32,
    /// Client-supplied for idempotent retries; generated when omitted.
    pub reservation_id: Option<ReservationId>,
}

#[derive(Deserialize)]
pub struct ReservationRef {
    pub reservation_id: ReservationId,
}

// -- Response types --

#[derive(Serialize)]
pub struct StockResponse {
    pub sku: String,
    pub on_hand: u32,
    pub available: u32,
}

#[derive(Serialize)]
pub struct ReservationResponse {
    pub reservation_id: String,
    pub sku: String,
    pub quantity: u32,
    pub status: String,
    pub expires_at: String,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        Self {
            reservation_id: r.id.to_string(),
            sku: r.sku.to_string(),
            quantity: r.quantity,
            status: r.status.to_string(),
            expires_at: r.expires_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// PUT /inventory/:sku — set the owned stock level.
#[tracing::instrument(skip(state, req))]
pub async fn set_stock(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
    Json(req): Json<SetStockRequest>,
) -> Json<StockResponse> {
    let sku = Sku::new(sku);
    state.ledger.set_stock(sku.clone(), req.quantity).await;

    Json(StockResponse {
        on_hand: state.ledger.on_hand(&sku).await,
        available: state.ledger.available(&sku).await,
        sku: sku.to_string(),
    })
}

/// GET /inventory/:sku — on-hand and available counts.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
) -> Json<StockResponse> {
    let sku = Sku::new(sku);

    Json(StockResponse {
        on_hand: state.ledger.on_hand(&sku).await,
        available: state.ledger.available(&sku).await,
        sku: sku.to_string(),
    })
}

/// POST /inventory/:sku/reserve — place a hold against available stock.
#[tracing::instrument(skip(state, req))]
pub async fn reserve(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
    Json(req): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), ApiError> {
    let reservation_id = req.reservation_id.unwrap_or_else(ReservationId::new);
    let reservation = state
        .ledger
        .reserve(Sku::new(sku), req.quantity, reservation_id)
        .await?;

    Ok((StatusCode::CREATED, Json(reservation.into())))
}

/// POST /inventory/:sku/commit — convert a hold into a stock decrement.
#[tracing::instrument(skip(state, req))]
pub async fn commit(
    State(state): State<Arc<AppState>>,
    Path(_sku): Path<String>,
    Json(req): Json<ReservationRef>,
) -> Result<Json<ReservationResponse>, ApiError> {
    state.ledger.commit(req.reservation_id).await?;

    let reservation = state
        .ledger
        .get_reservation(req.reservation_id)
        .await
        .ok_or_else(|| {
            ApiError::NotFound(format!("Reservation {} not found", req.reservation_id))
        })?;
    Ok(Json(reservation.into()))
}

/// POST /inventory/:sku/release — return a hold to the available pool.
#[tracing::instrument(skip(state, req))]
pub async fn release(
    State(state): State<Arc<AppState>>,
    Path(_sku): Path<String>,
    Json(req): Json<ReservationRef>,
) -> Result<StatusCode, ApiError> {
    state.ledger.release(req.reservation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
