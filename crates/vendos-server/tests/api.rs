use std::sync::Arc;

use axum::http::StatusCode;
use http_body_util::BodyExt;
use tower::ServiceExt;

use vendos_queue::{CommandStore, MemoryInventory};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a router over a fresh in-memory store with stocked slots, returning
/// the inventory handle so tests can assert on stock levels.
fn make_app() -> (axum::Router, Arc<MemoryInventory>) {
    let inventory = Arc::new(
        MemoryInventory::new()
            .with_stock("v1", 1, 3)
            .with_stock("v1", 2, 1),
    );
    let store = Arc::new(CommandStore::open_in_memory(inventory.clone()).unwrap());
    let app = vendos_server::build_router(store, inventory.clone());
    (app, inventory)
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a POST request with a JSON body via `oneshot`.
async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// ---------------------------------------------------------------------------
// Transport endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn healthz_is_ok() {
    let (app, _) = make_app();
    let req = axum::http::Request::builder()
        .uri("/healthz")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_command_requires_unit_id() {
    let (app, _) = make_app();
    let (status, _) = get(app, "/get_command").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_command_reports_absent_directive() {
    let (app, _) = make_app();
    let (status, body) = get(app, "/get_command?unit_id=v1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["motor_id"], serde_json::Value::Null);
    assert_eq!(body["action"], serde_json::Value::Null);
}

#[tokio::test]
async fn stale_ack_is_accepted() {
    let (app, inventory) = make_app();
    let (status, body) = post_json(
        app,
        "/acknowledge",
        serde_json::json!({ "unit_id": "v1", "motor_id": 1, "status": "success" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "acknowledgment received");
    // No command existed, so nothing was sold.
    assert_eq!(inventory.stock_of("v1", 1), 3);
}

// ---------------------------------------------------------------------------
// Purchase flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_purchase_flow_ends_acknowledged() {
    let (app, inventory) = make_app();

    // Buy: command created, awaiting payment.
    let (status, body) = post_json(
        app.clone(),
        "/buy",
        serde_json::json!({ "unit_id": "v1", "motor_id": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let command_id = body["command_id"].as_str().unwrap().to_string();

    // Not yet paid: the controller sees nothing.
    let (_, body) = get(app.clone(), "/get_command?unit_id=v1").await;
    assert_eq!(body["motor_id"], serde_json::Value::Null);

    // Payment confirmed: directive becomes visible.
    let (status, _) = post_json(
        app.clone(),
        "/confirm_payment",
        serde_json::json!({ "command_id": command_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(app.clone(), "/get_command?unit_id=v1").await;
    assert_eq!(body["motor_id"], 1);
    assert_eq!(body["action"], "start");

    // Redelivery while unacknowledged returns the identical directive.
    let (_, again) = get(app.clone(), "/get_command?unit_id=v1").await;
    assert_eq!(again, body);

    // Controller acknowledges: command finalized, one unit sold.
    let (status, _) = post_json(
        app.clone(),
        "/acknowledge",
        serde_json::json!({ "unit_id": "v1", "motor_id": 1, "status": "success" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inventory.stock_of("v1", 1), 2);

    let (_, commands) = get(app.clone(), "/commands?unit_id=v1").await;
    assert_eq!(commands[0]["state"], "acknowledged");
    assert!(commands[0]["acknowledged_at"].is_string());

    // Nothing left in flight.
    let (_, body) = get(app, "/get_command?unit_id=v1").await;
    assert_eq!(body["motor_id"], serde_json::Value::Null);
}

#[tokio::test]
async fn buy_conflicts_while_slot_active() {
    let (app, _) = make_app();
    let body = serde_json::json!({ "unit_id": "v1", "motor_id": 1 });
    let (status, _) = post_json(app.clone(), "/buy", body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, err) = post_json(app, "/buy", body).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(err["error"].as_str().unwrap().contains("active command"));
}

#[tokio::test]
async fn buy_refuses_empty_slot() {
    let (app, _) = make_app();
    let (status, err) = post_json(
        app,
        "/buy",
        serde_json::json!({ "unit_id": "v1", "motor_id": 9 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err["error"].as_str().unwrap().contains("out of stock"));
}

#[tokio::test]
async fn confirm_payment_unknown_command_is_404() {
    let (app, _) = make_app();
    let (status, _) = post_json(
        app,
        "/confirm_payment",
        serde_json::json!({ "command_id": "ghost" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn confirm_payment_twice_is_422() {
    let (app, _) = make_app();
    let (_, body) = post_json(
        app.clone(),
        "/buy",
        serde_json::json!({ "unit_id": "v1", "motor_id": 2 }),
    )
    .await;
    let command_id = body["command_id"].as_str().unwrap().to_string();

    let confirm = serde_json::json!({ "command_id": command_id });
    let (status, _) = post_json(app.clone(), "/confirm_payment", confirm.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post_json(app, "/confirm_payment", confirm).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn commands_listing_tracks_lifecycle() {
    let (app, _) = make_app();
    let (_, body) = post_json(
        app.clone(),
        "/buy",
        serde_json::json!({ "unit_id": "v1", "motor_id": 1 }),
    )
    .await;
    let command_id = body["command_id"].as_str().unwrap().to_string();

    let (_, commands) = get(app.clone(), "/commands?unit_id=v1").await;
    assert_eq!(commands.as_array().unwrap().len(), 1);
    assert_eq!(commands[0]["id"], command_id.as_str());
    assert_eq!(commands[0]["state"], "awaiting_payment");
}
