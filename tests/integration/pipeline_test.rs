//! Stream-to-cache pipeline tests

use crate::{wait_until, Harness};
use exec_engine::consumer::process_message;
use exec_engine::order::{OrderRequest, OrderStatus, OrderType, Side};
use exec_engine::stream::{OrderStream, ReadCursor, StreamMessage};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

#[tokio::test]
async fn test_market_order_filled() {
    let harness = Harness::new(Duration::from_millis(2));
    let order = OrderRequest::market("o1", "AAPL", Side::Buy, dec!(100)).with_idempotency_key("k1");
    harness.enqueue(&order).await;

    let (tx, handle) = harness.spawn_consumer("engine-1");
    let cache = harness.engine.cache().clone();
    wait_until(|| cache.get("o1").is_some()).await;

    let response = cache.get("o1").unwrap();
    assert_eq!(response.status, OrderStatus::Filled);
    assert_eq!(response.filled_quantity, dec!(100));
    assert_eq!(response.client_order_id, "k1");
    assert!(response.filled_avg_price >= dec!(100) && response.filled_avg_price < dec!(101));

    tx.send(true).unwrap();
    assert_ok!(handle.await);
}

#[tokio::test]
async fn test_duplicate_submission_executes_once() {
    let harness = Harness::new(Duration::ZERO);
    let order = OrderRequest::market("o1", "AAPL", Side::Buy, dec!(100)).with_idempotency_key("k1");
    harness.stream.ensure_group().await.unwrap();
    harness.enqueue(&order).await;
    harness.enqueue(&order).await;

    let report = harness.consumer("engine-1").poll_once(ReadCursor::New).await.unwrap();

    assert_eq!(report.read, 2);
    assert_eq!(report.acked, 2);
    assert_eq!(harness.executor.execution_count(), 1);
    assert_eq!(harness.engine.cache().len(), 1);
    assert_eq!(harness.stream.pending_count().await, 0);

    let snap = harness.engine.metrics().snapshot();
    assert_eq!(snap.processed, 1);
    assert_eq!(snap.duplicates, 1);
}

#[tokio::test]
async fn test_limit_fill_price_exact() {
    let harness = Harness::new(Duration::ZERO);
    harness.stream.ensure_group().await.unwrap();
    harness
        .enqueue(&OrderRequest::limit("o2", "AAPL", Side::Buy, dec!(10), dec!(150.00)))
        .await;

    harness.consumer("engine-1").poll_once(ReadCursor::New).await.unwrap();

    let response = harness.engine.cache().get("o2").unwrap();
    assert_eq!(response.filled_avg_price, dec!(150.00));
}

#[tokio::test]
async fn test_malformed_message_does_not_stall_consumer() {
    let harness = Harness::new(Duration::ZERO);
    harness.stream.enqueue("definitely { not json").await.unwrap();
    harness
        .enqueue(&OrderRequest::market("o3", "AAPL", Side::Sell, dec!(5)))
        .await;

    let (tx, handle) = harness.spawn_consumer("engine-1");
    let cache = harness.engine.cache().clone();
    wait_until(|| cache.get("o3").is_some()).await;

    assert_eq!(cache.len(), 1);
    let snap = harness.engine.metrics().snapshot();
    assert_eq!(snap.rejected, 1);
    assert_eq!(snap.processed, 1);

    tx.send(true).unwrap();
    assert_ok!(handle.await);
}

#[tokio::test]
async fn test_entry_without_order_field_rejected() {
    let harness = Harness::new(Duration::ZERO);
    harness.stream.ensure_group().await.unwrap();
    harness.stream.inject_raw(&[("other", "{}")]).await.unwrap();

    let report = harness.consumer("engine-1").poll_once(ReadCursor::New).await.unwrap();

    assert_eq!(report.acked, 1);
    assert!(harness.engine.cache().is_empty());
    assert_eq!(harness.engine.metrics().snapshot().rejected, 1);
}

#[tokio::test]
async fn test_invalid_order_visible_as_rejected() {
    let harness = Harness::new(Duration::ZERO);
    harness.stream.ensure_group().await.unwrap();
    let mut order = OrderRequest::market("o4", "AAPL", Side::Buy, dec!(1));
    order.order_type = OrderType::Limit;
    harness.enqueue(&order).await;

    harness.consumer("engine-1").poll_once(ReadCursor::New).await.unwrap();

    let response = harness.engine.cache().get("o4").unwrap();
    assert_eq!(response.status, OrderStatus::Rejected);
    assert_eq!(harness.executor.execution_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_same_key_executes_once() {
    let harness = Harness::new(Duration::from_millis(2));
    let engine = harness.engine.clone();
    let order = OrderRequest::market("o1", "AAPL", Side::Buy, dec!(1)).with_idempotency_key("k-race");
    let message = Arc::new(StreamMessage {
        id: "1-0".to_string(),
        payload: Some(serde_json::to_string(&order).unwrap()),
    });

    let barrier = Arc::new(tokio::sync::Barrier::new(64));
    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let engine = engine.clone();
            let message = message.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                process_message(&engine, &message).await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(harness.executor.execution_count(), 1);
    assert_eq!(engine.cache().len(), 1);
    let snap = engine.metrics().snapshot();
    assert_eq!(snap.processed, 1);
    assert_eq!(snap.duplicates, 63);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_competing_consumers_share_dedup() {
    let harness = Harness::new(Duration::from_millis(1));
    for i in 0..50 {
        let order = OrderRequest::market(format!("o{i}"), "AAPL", Side::Buy, dec!(1))
            .with_idempotency_key("shared");
        harness.enqueue(&order).await;
    }

    let consumers: Vec<_> = (0..4)
        .map(|i| harness.spawn_consumer(&format!("engine-{i}")))
        .collect();

    let metrics = harness.engine.metrics().clone();
    wait_until(|| {
        let snap = metrics.snapshot();
        snap.processed + snap.duplicates == 50
    })
    .await;

    assert_eq!(harness.executor.execution_count(), 1);
    assert_eq!(harness.engine.cache().len(), 1);

    for (tx, handle) in consumers {
        tx.send(true).unwrap();
        assert_ok!(handle.await);
    }
    assert_eq!(harness.stream.pending_count().await, 0);
}

#[tokio::test]
async fn test_latency_p95_under_budget() {
    let harness = Harness::new(Duration::from_millis(2));
    for i in 0..100 {
        harness
            .enqueue(&OrderRequest::market(format!("o{i}"), "AAPL", Side::Buy, dec!(1)))
            .await;
    }

    let (tx, handle) = harness.spawn_consumer("engine-1");
    let cache = harness.engine.cache().clone();
    wait_until(|| cache.len() == 100).await;
    tx.send(true).unwrap();
    assert_ok!(handle.await);

    let mut latencies: Vec<f64> = (0..100)
        .map(|i| cache.get(&format!("o{i}")).unwrap().latency_ms)
        .collect();
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let p95 = latencies[94];

    assert!(p95 >= 2.0, "latency {p95}ms shorter than executor delay");
    assert!(p95 < 100.0, "p95 latency {p95}ms over budget");
    assert_eq!(harness.engine.metrics().snapshot().latency_samples, 100);
}

#[tokio::test]
async fn test_unacked_entry_recovered_by_restarted_consumer() {
    let harness = Harness::new(Duration::ZERO);
    harness.stream.ensure_group().await.unwrap();
    harness
        .enqueue(&OrderRequest::market("o1", "AAPL", Side::Buy, dec!(1)))
        .await;

    // first incarnation reads and dies before processing
    let taken = harness
        .stream
        .read_batch("engine-1", ReadCursor::New, 10, Duration::from_millis(5))
        .await
        .unwrap();
    assert_eq!(taken.len(), 1);

    let (tx, handle) = harness.spawn_consumer("engine-1");
    let cache = harness.engine.cache().clone();
    wait_until(|| cache.get("o1").is_some()).await;

    tx.send(true).unwrap();
    assert_ok!(handle.await);
    assert_eq!(harness.stream.pending_count().await, 0);
}

#[tokio::test]
async fn test_entry_of_dead_consumer_processed_by_survivor() {
    let harness = Harness::new(Duration::ZERO);
    harness.stream.ensure_group().await.unwrap();
    harness
        .enqueue(&OrderRequest::market("o9", "AAPL", Side::Buy, dec!(3)))
        .await;

    // "a" takes the entry and never comes back
    let taken = harness
        .stream
        .read_batch("a", ReadCursor::New, 10, Duration::from_millis(5))
        .await
        .unwrap();
    assert_eq!(taken.len(), 1);

    let (tx, handle) = harness.spawn_with(exec_engine::consumer::ConsumerSettings {
        claim_idle: Duration::from_millis(50),
        claim_interval: Duration::from_millis(20),
        ..Harness::settings("b")
    });
    let cache = harness.engine.cache().clone();
    wait_until(|| cache.get("o9").is_some()).await;

    assert_eq!(harness.executor.execution_count(), 1);
    // acked after the cache insert
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.stream.pending_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    tx.send(true).unwrap();
    assert_ok!(handle.await);
}
