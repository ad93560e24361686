//! Prometheus metrics

use metrics::{Counter, Histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-order latency histogram, milliseconds
pub const EXECUTION_LATENCY: &str = "execution_latency_milliseconds";
/// Orders executed successfully
pub const ORDERS_PROCESSED: &str = "orders_processed_total";
/// Orders rejected at parse/validation or by the executor
pub const ORDERS_REJECTED: &str = "orders_rejected_total";
/// Messages skipped because their idempotency key was already seen
pub const ORDERS_DUPLICATE: &str = "orders_duplicate_total";
/// Failed stream operations (reads, acks, publishes)
pub const STREAM_ERRORS: &str = "stream_errors_total";

/// Exponential bucket bounds: `start * factor^i` for `i in 0..count`
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    std::iter::successors(Some(start), |b| Some(b * factor))
        .take(count)
        .collect()
}

/// Point-in-time copy of the collector's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub rejected: u64,
    pub duplicates: u64,
    pub stream_errors: u64,
    pub latency_samples: u64,
}

/// Latency histogram plus order counters, rendered in Prometheus text format
///
/// Each collector owns its own recorder instead of installing a global one,
/// so independent engines (and tests) never share counts. All recording
/// paths are lock-free atomic increments.
pub struct MetricsCollector {
    handle: PrometheusHandle,
    latency: Histogram,
    processed: Counter,
    rejected: Counter,
    duplicates: Counter,
    stream_errors: Counter,
    processed_count: AtomicU64,
    rejected_count: AtomicU64,
    duplicate_count: AtomicU64,
    stream_error_count: AtomicU64,
    latency_count: AtomicU64,
}

impl MetricsCollector {
    /// Create a collector with 1ms..512ms exponential latency buckets
    pub fn new() -> Result<Self, BuildError> {
        Self::with_buckets(&exponential_buckets(1.0, 2.0, 10))
    }

    pub fn with_buckets(buckets: &[f64]) -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(EXECUTION_LATENCY.to_string()), buckets)?
            .build_recorder();
        let handle = recorder.handle();

        let (latency, processed, rejected, duplicates, stream_errors) =
            metrics::with_local_recorder(&recorder, || {
                metrics::describe_histogram!(
                    EXECUTION_LATENCY,
                    metrics::Unit::Milliseconds,
                    "Order execution latency in milliseconds"
                );
                metrics::describe_counter!(ORDERS_PROCESSED, "Total number of orders processed");
                metrics::describe_counter!(ORDERS_REJECTED, "Total number of orders rejected");
                metrics::describe_counter!(
                    ORDERS_DUPLICATE,
                    "Total number of duplicate orders skipped"
                );
                metrics::describe_counter!(STREAM_ERRORS, "Total number of failed stream operations");
                (
                    metrics::histogram!(EXECUTION_LATENCY),
                    metrics::counter!(ORDERS_PROCESSED),
                    metrics::counter!(ORDERS_REJECTED),
                    metrics::counter!(ORDERS_DUPLICATE),
                    metrics::counter!(STREAM_ERRORS),
                )
            });

        Ok(Self {
            handle,
            latency,
            processed,
            rejected,
            duplicates,
            stream_errors,
            processed_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
            duplicate_count: AtomicU64::new(0),
            stream_error_count: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        })
    }

    /// Record a dequeue-to-response latency
    pub fn observe_latency(&self, latency: Duration) {
        let ms = latency.as_secs_f64() * 1000.0;
        self.latency.record(ms);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = EXECUTION_LATENCY, value_ms = ms, "Recording latency");
    }

    pub fn inc_processed(&self) {
        self.processed.increment(1);
        self.processed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self) {
        self.rejected.increment(1);
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_duplicate(&self) {
        self.duplicates.increment(1);
        self.duplicate_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stream_error(&self) {
        self.stream_errors.increment(1);
        self.stream_error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed: self.processed_count.load(Ordering::Relaxed),
            rejected: self.rejected_count.load(Ordering::Relaxed),
            duplicates: self.duplicate_count.load(Ordering::Relaxed),
            stream_errors: self.stream_error_count.load(Ordering::Relaxed),
            latency_samples: self.latency_count.load(Ordering::Relaxed),
        }
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
