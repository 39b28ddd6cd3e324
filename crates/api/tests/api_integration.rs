//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, Arc<api::routes::checkout::AppState>) {
    let state = api::create_default_state(&api::Config::default());
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn json_request(method: &str, uri: String, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: String) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn seed_stock(app: &axum::Router, sku: &str, quantity: u32) {
    let (status, _) = send(
        app,
        json_request(
            "PUT",
            format!("/inventory/{sku}"),
            serde_json::json!({ "quantity": quantity }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

async fn seed_cart(app: &axum::Router, customer_id: &str) {
    let (status, _) = send(
        app,
        json_request(
            "PUT",
            format!("/carts/{customer_id}"),
            serde_json::json!({
                "lines": [
                    {
                        "sku": "SKU-001",
                        "name": "Widget",
                        "unit_price_cents": 1000,
                        "quantity": 2
                    },
                    {
                        "sku": "SKU-002",
                        "name": "Gadget",
                        "unit_price_cents": 2500,
                        "quantity": 1
                    }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, get_request("/health".to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app
        .oneshot(get_request("/metrics".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_stock_seeding_and_query() {
    let (app, _) = setup();

    seed_stock(&app, "SKU-001", 7).await;

    let (status, json) = send(&app, get_request("/inventory/SKU-001".to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sku"], "SKU-001");
    assert_eq!(json["on_hand"], 7);
    assert_eq!(json["available"], 7);
}

#[tokio::test]
async fn test_full_checkout_over_http() {
    let (app, _) = setup();
    let customer_id = uuid::Uuid::new_v4().to_string();

    seed_stock(&app, "SKU-001", 10).await;
    seed_stock(&app, "SKU-002", 10).await;
    seed_cart(&app, &customer_id).await;

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/checkout".to_string(),
            serde_json::json!({
                "customer_id": customer_id,
                "payment_token": "tok_visa"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Completed");
    let saga_id = json["saga_id"].as_str().unwrap().to_string();
    let order_id = json["order_id"].as_str().unwrap().to_string();

    // Order persisted with the charged total (2x1000 + 1x2500).
    let (status, order) = send(&app, get_request(format!("/orders/{order_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "Paid");
    assert_eq!(order["total_cents"], 4500);
    assert_eq!(order["lines"].as_array().unwrap().len(), 2);

    // Stock committed.
    let (_, stock) = send(&app, get_request("/inventory/SKU-001".to_string())).await;
    assert_eq!(stock["on_hand"], 8);
    assert_eq!(stock["available"], 8);

    // Cart cleared.
    let (status, _) = send(&app, get_request(format!("/carts/{customer_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Saga record carries the full trace.
    let (status, saga) = send(&app, get_request(format!("/checkout/{saga_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saga["status"], "Completed");
    assert_eq!(saga["completed_steps"].as_array().unwrap().len(), 6);
    assert_eq!(saga["reservation_ids"].as_array().unwrap().len(), 2);
    assert!(saga["payment_transaction_id"].as_str().is_some());
    assert!(!saga["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_insufficient_stock() {
    let (app, _) = setup();
    let customer_id = uuid::Uuid::new_v4().to_string();

    seed_stock(&app, "SKU-001", 1).await;
    seed_stock(&app, "SKU-002", 10).await;
    seed_cart(&app, &customer_id).await;

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/checkout".to_string(),
            serde_json::json!({
                "customer_id": customer_id,
                "payment_token": "tok_visa"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error_kind"], "insufficient_stock");

    // The hold on the in-stock SKU was released.
    let (_, stock) = send(&app, get_request("/inventory/SKU-002".to_string())).await;
    assert_eq!(stock["available"], 10);
}

#[tokio::test]
async fn test_checkout_payment_declined() {
    let (app, state) = setup();
    let customer_id = uuid::Uuid::new_v4().to_string();

    seed_stock(&app, "SKU-001", 10).await;
    seed_stock(&app, "SKU-002", 10).await;
    seed_cart(&app, &customer_id).await;
    state.payment.set_decline("insufficient funds");

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/checkout".to_string(),
            serde_json::json!({
                "customer_id": customer_id,
                "payment_token": "tok_visa"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["error_kind"], "payment_declined");

    // Availability restored, cart untouched.
    let (_, stock) = send(&app, get_request("/inventory/SKU-001".to_string())).await;
    assert_eq!(stock["available"], 10);
    let (status, _) = send(&app, get_request(format!("/carts/{customer_id}"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_checkout_empty_cart_is_bad_request() {
    let (app, _) = setup();
    let customer_id = uuid::Uuid::new_v4().to_string();

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/checkout".to_string(),
            serde_json::json!({
                "customer_id": customer_id,
                "payment_token": "tok_visa"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_kind"], "validation_error");
}

#[tokio::test]
async fn test_checkout_replay_returns_same_order() {
    let (app, state) = setup();
    let customer_id = uuid::Uuid::new_v4().to_string();
    let saga_id = uuid::Uuid::new_v4().to_string();

    seed_stock(&app, "SKU-001", 10).await;
    seed_stock(&app, "SKU-002", 10).await;
    seed_cart(&app, &customer_id).await;

    let body = serde_json::json!({
        "saga_id": saga_id,
        "customer_id": customer_id,
        "payment_token": "tok_visa"
    });

    let (status, first) = send(
        &app,
        json_request("POST", "/checkout".to_string(), body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, replay) = send(&app, json_request("POST", "/checkout".to_string(), body)).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(first["order_id"], replay["order_id"]);
    assert_eq!(replay["status"], "Completed");
    assert_eq!(state.payment.charge_count(), 1);
    assert_eq!(state.orders.order_count(), 1);
}

#[tokio::test]
async fn test_checkout_manual_intervention_returns_processing() {
    let (app, state) = setup();
    let customer_id = uuid::Uuid::new_v4().to_string();

    seed_stock(&app, "SKU-001", 10).await;
    seed_stock(&app, "SKU-002", 10).await;
    seed_cart(&app, &customer_id).await;
    state.orders.set_fail_on_create(true);

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/checkout".to_string(),
            serde_json::json!({
                "customer_id": customer_id,
                "payment_token": "tok_visa"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "processing");
    let saga_id = json["saga_id"].as_str().unwrap();

    // The charge was refunded and the saga is flagged for an operator.
    assert_eq!(state.payment.refund_count(), 1);
    let (status, saga) = send(&app, get_request(format!("/checkout/{saga_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saga["status"], "RequiresManualIntervention");
    assert!(saga["refund_outcome"].as_str().is_some());
}

#[tokio::test]
async fn test_get_unknown_saga() {
    let (app, _) = setup();
    let fake_id = uuid::Uuid::new_v4();

    let (status, _) = send(&app, get_request(format!("/checkout/{fake_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_saga_id_format() {
    let (app, _) = setup();

    let (status, json) = send(&app, get_request("/checkout/not-a-uuid".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_kind"], "bad_request");
}

#[tokio::test]
async fn test_cancel_unknown_saga_is_not_honored() {
    let (app, _) = setup();
    let fake_id = uuid::Uuid::new_v4();

    let (status, json) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri(format!("/checkout/{fake_id}/cancel"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cancelled"], false);
}

#[tokio::test]
async fn test_reservation_lifecycle_over_http() {
    let (app, _) = setup();
    seed_stock(&app, "SKU-001", 10).await;

    // Reserve 4 units.
    let (status, reservation) = send(
        &app,
        json_request(
            "POST",
            "/inventory/SKU-001/reserve".to_string(),
            serde_json::json!({ "quantity": 4 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reservation["status"], "Reserved");
    let reservation_id = reservation["reservation_id"].as_str().unwrap().to_string();

    let (_, stock) = send(&app, get_request("/inventory/SKU-001".to_string())).await;
    assert_eq!(stock["available"], 6);
    assert_eq!(stock["on_hand"], 10);

    // Commit the hold.
    let (status, committed) = send(
        &app,
        json_request(
            "POST",
            "/inventory/SKU-001/commit".to_string(),
            serde_json::json!({ "reservation_id": reservation_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(committed["status"], "Committed");

    let (_, stock) = send(&app, get_request("/inventory/SKU-001".to_string())).await;
    assert_eq!(stock["on_hand"], 6);
    assert_eq!(stock["available"], 6);

    // Release after commit is a no-op.
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/inventory/SKU-001/release".to_string(),
            serde_json::json!({ "reservation_id": reservation_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_reserve_beyond_available_is_conflict() {
    let (app, _) = setup();
    seed_stock(&app, "SKU-001", 3).await;

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/inventory/SKU-001/reserve".to_string(),
            serde_json::json!({ "quantity": 5 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error_kind"], "insufficient_stock");
}

#[tokio::test]
async fn test_order_creation_is_idempotent() {
    let (app, state) = setup();
    let order_id = uuid::Uuid::new_v4().to_string();
    let customer_id = uuid::Uuid::new_v4().to_string();

    let body = serde_json::json!({
        "order_id": order_id,
        "customer_id": customer_id,
        "lines": [{
            "sku": "SKU-001",
            "name": "Widget",
            "unit_price_cents": 1000,
            "quantity": 2
        }],
        "total_cents": 2000
    });

    let (status, first) = send(
        &app,
        json_request("POST", "/orders".to_string(), body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, second) = send(&app, json_request("POST", "/orders".to_string(), body)).await;
    assert_eq!(status, StatusCode::CREATED);

    assert_eq!(first["id"], second["id"]);
    assert_eq!(state.orders.order_count(), 1);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let (app, _) = setup();
    let fake_id = uuid::Uuid::new_v4();

    let (status, _) = send(&app, get_request(format!("/orders/{fake_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_lifecycle_over_http() {
    let (app, _) = setup();
    let customer_id = uuid::Uuid::new_v4().to_string();

    seed_cart(&app, &customer_id).await;

    let (status, cart) = send(&app, get_request(format!("/carts/{customer_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_cents"], 4500);
    assert_eq!(cart["lines"].as_array().unwrap().len(), 2);

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/carts/{customer_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get_request(format!("/carts/{customer_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
