//! HTTP API server with observability for the checkout system.
//!
//! Exposes the checkout saga, the inventory ledger and the order and cart
//! stores over REST, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use checkout::{
    CheckoutOrchestrator, InMemoryCartStore, InMemoryOrderStore, InMemoryPaymentClient,
    OrchestratorConfig,
};
use inventory::InMemoryInventoryLedger;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
use routes::checkout::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::checkout::execute))
        .route("/checkout/{saga_id}", get(routes::checkout::status))
        .route("/checkout/{saga_id}/cancel", post(routes::checkout::cancel))
        .route("/inventory/{sku}", put(routes::inventory::set_stock))
        .route("/inventory/{sku}", get(routes::inventory::get))
        .route("/inventory/{sku}/reserve", post(routes::inventory::reserve))
        .route("/inventory/{sku}/commit", post(routes::inventory::commit))
        .route("/inventory/{sku}/release", post(routes::inventory::release))
        .route("/orders", post(routes::orders::create))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/carts/{customer_id}", put(routes::carts::put))
        .route("/carts/{customer_id}", get(routes::carts::get))
        .route("/carts/{customer_id}", delete(routes::carts::delete))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state with in-memory stores.
pub fn create_default_state(config: &Config) -> Arc<AppState> {
    let ledger = InMemoryInventoryLedger::with_ttl(config.reservation_ttl);
    let payment = InMemoryPaymentClient::new();
    let orders = InMemoryOrderStore::new();
    let carts = InMemoryCartStore::new();

    let orchestrator_config = OrchestratorConfig {
        call_timeout: config.call_timeout,
        ..OrchestratorConfig::default()
    };
    let orchestrator = CheckoutOrchestrator::with_config(
        ledger.clone(),
        payment.clone(),
        orders.clone(),
        carts.clone(),
        orchestrator_config,
    );

    Arc::new(AppState {
        orchestrator,
        ledger,
        payment,
        orders,
        carts,
    })
}
