//! Integration tests for the API Server
//!
//! Tests HTTP endpoints, schedule administration, manual triggers and the
//! WebSocket event channel.

#[path = "api_server/test_utils.rs"]
mod test_utils;

use serde_json::{json, Value};

use test_utils::TestApiServer;

#[tokio::test]
async fn health_endpoint_reports_healthy_status() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["service"], "modelkeeper-api");
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestApiServer::new().await;
    app.server.get("/health").await;
    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    for name in [
        "http_requests_total",
        "http_request_duration_seconds",
        "http_requests_in_flight",
        "workflows_started_total",
        "training_lock_timeouts_total",
    ] {
        assert!(body.contains(name), "Expected {} metric", name);
    }
}

#[tokio::test]
async fn schedule_round_trip_uses_five_minute_units() {
    let app = TestApiServer::new().await;

    let response = app
        .server
        .post("/schedule/btc")
        .json(&json!({ "interval": 3 }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["interval_minutes"], 15);

    let body: Value = app.server.get("/schedule/BTC").await.json();
    assert_eq!(body, json!({ "is_active": true, "interval": 3 }));
}

#[tokio::test]
async fn missing_schedule_reads_as_inactive() {
    let app = TestApiServer::new().await;
    let body: Value = app.server.get("/schedule/LTC").await.json();
    assert_eq!(body, json!({ "is_active": false, "interval": 0 }));
}

#[tokio::test]
async fn invalid_intervals_are_rejected() {
    let app = TestApiServer::new().await;

    for body in [
        json!({ "interval": 0 }),
        json!({ "interval": -2 }),
        json!({ "interval": "often" }),
        json!({}),
    ] {
        let response = app.server.post("/schedule/ETH").json(&body).await;
        assert_eq!(response.status_code(), 400, "body {}", body);
        let error: Value = response.json();
        assert_eq!(
            error["error"],
            "Invalid interval provided. Must be a positive integer."
        );
    }

    let body: Value = app.server.get("/schedule/ETH").await.json();
    assert_eq!(body["is_active"], false);
}

#[tokio::test]
async fn deleting_a_schedule_deactivates_it() {
    let app = TestApiServer::new().await;
    app.server
        .post("/schedule/ETH")
        .json(&json!({ "interval": 2 }))
        .await;

    let response = app.server.delete("/schedule/ETH").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = app.server.get("/schedule/ETH").await.json();
    assert_eq!(body, json!({ "is_active": false, "interval": 0 }));
}

#[tokio::test]
async fn manual_trigger_takes_the_run_lock_once() {
    let app = TestApiServer::new().await;

    let first: Value = app
        .server
        .post("/api/updates/btc")
        .json(&json!({ "user": "7" }))
        .await
        .json();
    assert_eq!(first["status"], "started");
    assert_eq!(first["symbol"], "BTC");

    let second: Value = app
        .server
        .post("/api/updates/BTC")
        .json(&json!({ "user": "8" }))
        .await
        .json();
    assert_eq!(second["status"], "skipped_locked");

    let lock: Value = app.server.get("/api/locks/BTC").await.json();
    assert_eq!(lock["locked"], true);
    assert_eq!(lock["holder"], "manual_user_7");
    assert_eq!(lock["key"], "lock:stock:BTC");

    let requests = app.dispatcher.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].triggered_by, "manual_user_7");
}

#[tokio::test]
async fn manual_trigger_body_is_optional() {
    let app = TestApiServer::new().await;
    let body: Value = app.server.post("/api/updates/ETH").await.json();
    assert_eq!(body["status"], "started");

    let lock: Value = app.server.get("/api/locks/ETH").await.json();
    assert_eq!(lock["holder"], "manual_user_api");
}

#[tokio::test]
async fn unlocked_symbol_reports_no_holder() {
    let app = TestApiServer::new().await;
    let lock: Value = app.server.get("/api/locks/LTC").await.json();
    assert_eq!(lock["locked"], false);
    assert_eq!(lock["holder"], Value::Null);
}

#[tokio::test]
async fn websocket_client_can_trigger_and_sees_room_events() {
    let app = TestApiServer::with_http_transport().await;
    let mut first = app
        .server
        .get_websocket("/ws/btc")
        .await
        .into_websocket()
        .await;
    let mut second = app
        .server
        .get_websocket("/ws/BTC")
        .await
        .into_websocket()
        .await;
    for _ in 0..100 {
        if app.hub.subscriber_count("stock:BTC").await == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(app.hub.subscriber_count("stock:BTC").await, 2);

    first
        .send_json(&json!({ "action": "start_update_process" }))
        .await;
    let accepted: Value = first.receive_json().await;
    assert_eq!(accepted["event"], "update_request_accepted");
    assert_eq!(accepted["stock"], "BTC");

    let seen_by_room: Value = second.receive_json().await;
    assert_eq!(seen_by_room["event"], "update_request_accepted");

    second
        .send_json(&json!({ "action": "start_update_process" }))
        .await;
    let pending: Value = second.receive_json().await;
    assert_eq!(pending["event"], "update_request_pending");

    assert_eq!(app.dispatcher.requests().len(), 1);
}
