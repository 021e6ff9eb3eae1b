//! Tests for the HTTP boundary against the in-memory broker.

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use broker_runtime::{BrokerConnector, MemoryBroker};
use queue_bus_core::NoopEventLog;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_router() -> (Router, Arc<MemoryBroker>) {
    let broker = Arc::new(MemoryBroker::new());
    let event_log = Arc::new(NoopEventLog);
    let context = Arc::new(ConnectionContext::new(
        Some(ConnectionConfig {
            default_queue: "orders".to_string(),
            ..Default::default()
        }),
        event_log.clone(),
    ));
    let service = Arc::new(QueueOperationService::new(
        context.clone(),
        broker.clone() as Arc<dyn BrokerConnector>,
        event_log,
    ));

    let state = AppState {
        context,
        service,
        shutdown: CancellationToken::new(),
    };
    (create_router(state), broker)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_get_connection_returns_the_active_configuration() {
    let (app, _broker) = test_router();

    let response = app.oneshot(get("/api/queues/connection")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["default_queue"], "orders");
    assert_eq!(body["host"], "localhost");
    assert_eq!(body["port"], 5672);
}

#[tokio::test]
async fn test_update_connection_swaps_the_active_configuration() {
    let (app, _broker) = test_router();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/queues/connection",
            json!({ "default_queue": "payments", "host": "rabbit.internal" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["value"]["default_queue"], "payments");

    let current = app.oneshot(get("/api/queues/connection")).await.unwrap();
    let body = body_json(current).await;
    assert_eq!(body["default_queue"], "payments");
    assert_eq!(body["host"], "rabbit.internal");
}

#[tokio::test]
async fn test_invalid_connection_update_returns_400_with_every_rule() {
    let (app, _broker) = test_router();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/queues/connection",
            json!({ "host": "", "default_queue": "", "prefetch": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"].as_array().unwrap().len(), 3);

    // The active configuration is untouched.
    let current = app.oneshot(get("/api/queues/connection")).await.unwrap();
    assert_eq!(body_json(current).await["default_queue"], "orders");
}

#[tokio::test]
async fn test_reset_restores_the_default_configuration() {
    let (app, _broker) = test_router();

    app.clone()
        .oneshot(post_json(
            "/api/queues/connection",
            json!({ "default_queue": "payments" }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json("/api/queues/connection/default", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let current = app.oneshot(get("/api/queues/connection")).await.unwrap();
    assert_eq!(body_json(current).await["default_queue"], "orders");
}

#[tokio::test]
async fn test_publish_reaches_the_broker() {
    let (app, broker) = test_router();

    let response = app
        .oneshot(post_json(
            "/api/queues/publish",
            json!({ "queue_name": "orders", "content": { "order": 42 } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "message published to the queue");
    assert_eq!(broker.ready_count("orders"), 1);
}

#[tokio::test]
async fn test_invalid_send_returns_400_without_touching_the_broker() {
    let (app, broker) = test_router();

    let response = app
        .oneshot(post_json("/api/queues/send", json!({ "queue_name": "orders" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(
        body["errors"][0],
        "the message content is required for the send operation"
    );
    assert_eq!(broker.connect_count(), 0);
}

#[tokio::test]
async fn test_send_round_trip_over_http() {
    let (app, broker) = test_router();
    broker.provision_queue("orders", 1);

    let response = app
        .oneshot(post_json(
            "/api/queues/send",
            json!({ "queue_name": "orders", "content": { "order": 42 } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["value"], serde_json::to_string(&json!({ "order": 42 })).unwrap());
    assert_eq!(broker.ready_count("orders"), 1);
}

#[tokio::test]
async fn test_subscribe_reports_queue_status() {
    let (app, broker) = test_router();
    broker.provision_queue("orders", 2);
    broker.seed_message("orders", "first");
    broker.seed_message("orders", "second");

    let response = app
        .oneshot(post_json(
            "/api/queues/subscribe",
            json!({ "queue_name": "orders", "max_messages": 10 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let detail = &body["value"];
    assert_eq!(detail["queue_name"], "orders");
    assert_eq!(detail["ready_messages"], 2);
    assert_eq!(detail["consumer_count"], 2);
    assert_eq!(detail["message_samples"], json!(["first", "second"]));
    assert_eq!(broker.ready_count("orders"), 2);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _broker) = test_router();

    let response = app.oneshot(get("/api/queues/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
