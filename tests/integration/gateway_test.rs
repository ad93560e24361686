//! HTTP gateway tests, driven in-process through the router

use crate::Harness;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use exec_engine::gateway::{build_router, AcceptedBody, StatusBody};
use exec_engine::order::{OrderResponse, OrderStatus};
use exec_engine::stream::{OrderStream, ReadCursor};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use std::time::Duration;
use tower::ServiceExt;

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const SCENARIO_ONE: &str = r#"{"order_id":"o1","symbol":"AAPL","side":"buy","quantity":100,"type":"market","idempotency_key":"k1"}"#;

#[tokio::test]
async fn test_health() {
    let harness = Harness::new(Duration::ZERO);
    let router = build_router(harness.engine.clone());

    let (status, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let body: StatusBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(body.status, "healthy");
}

#[tokio::test]
async fn test_health_ignores_stream_outage_but_ready_does_not() {
    let harness = Harness::new(Duration::ZERO);
    let router = build_router(harness.engine.clone());

    let (status, _) = send(&router, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);

    harness.stream.set_available(false);
    let (status, _) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&router, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body: StatusBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(body.status, "unavailable");
}

#[tokio::test]
async fn test_submit_accepted_and_enqueued() {
    let harness = Harness::new(Duration::ZERO);
    let router = build_router(harness.engine.clone());

    let (status, body) = send(&router, post_json("/orders", SCENARIO_ONE)).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let body: AcceptedBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(body.order_id, "o1");
    assert_eq!(body.status, "accepted");
    assert_eq!(harness.stream.len().await, 1);
    // nothing executes synchronously
    assert_eq!(harness.executor.execution_count(), 0);
}

#[tokio::test]
async fn test_submit_malformed_body() {
    let harness = Harness::new(Duration::ZERO);
    let router = build_router(harness.engine.clone());

    let (status, body) = send(&router, post_json("/orders", "{\"order_id\":")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].is_string());
    assert!(harness.stream.is_empty().await);
}

#[tokio::test]
async fn test_submit_wrong_field_type() {
    let harness = Harness::new(Duration::ZERO);
    let router = build_router(harness.engine.clone());

    let (status, _) = send(
        &router,
        post_json("/orders", r#"{"order_id":"o1","symbol":"AAPL","side":"sideways","quantity":1,"type":"market"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(harness.stream.is_empty().await);
}

#[tokio::test]
async fn test_submit_empty_order_id() {
    let harness = Harness::new(Duration::ZERO);
    let router = build_router(harness.engine.clone());

    let (status, _) = send(
        &router,
        post_json("/orders", r#"{"order_id":"","symbol":"AAPL","side":"buy","quantity":1,"type":"market"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(harness.stream.is_empty().await);
}

#[tokio::test]
async fn test_submit_when_stream_down() {
    let harness = Harness::new(Duration::ZERO);
    let router = build_router(harness.engine.clone());
    harness.stream.set_available(false);

    let (status, body) = send(&router, post_json("/orders", SCENARIO_ONE)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_order_not_found() {
    let harness = Harness::new(Duration::ZERO);
    let router = build_router(harness.engine.clone());

    let (status, _) = send(&router, get("/orders/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_lookup_lifecycle() {
    let harness = Harness::new(Duration::from_millis(2));
    let router = build_router(harness.engine.clone());

    let (status, _) = send(&router, post_json("/orders", SCENARIO_ONE)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = send(&router, get("/orders/o1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let consumer = harness.consumer("engine-1");
    harness.engine.stream().ensure_group().await.unwrap();
    let report = consumer.poll_once(ReadCursor::New).await.unwrap();
    assert_eq!(report.acked, 1);

    let (status, body) = send(&router, get("/orders/o1")).await;
    assert_eq!(status, StatusCode::OK);
    let response: OrderResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(response.status, OrderStatus::Filled);
    assert_eq!(response.filled_quantity, dec!(100));
    assert_eq!(response.client_order_id, "k1");

    let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(raw["status"], "filled");
    assert_eq!(raw["filled_quantity"], 100.0);
}

#[tokio::test]
async fn test_double_submit_single_execution() {
    let harness = Harness::new(Duration::ZERO);
    let router = build_router(harness.engine.clone());

    for _ in 0..2 {
        let (status, _) = send(&router, post_json("/orders", SCENARIO_ONE)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    harness.engine.stream().ensure_group().await.unwrap();
    harness.consumer("engine-1").poll_once(ReadCursor::New).await.unwrap();

    assert_eq!(harness.executor.execution_count(), 1);
    assert_eq!(harness.engine.cache().len(), 1);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let harness = Harness::new(Duration::ZERO);
    let router = build_router(harness.engine.clone());

    send(&router, post_json("/orders", SCENARIO_ONE)).await;
    harness.engine.stream().ensure_group().await.unwrap();
    harness.consumer("engine-1").poll_once(ReadCursor::New).await.unwrap();

    let response = router.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_processed_total 1"));
    assert!(text.contains("execution_latency_milliseconds_bucket"));
}
