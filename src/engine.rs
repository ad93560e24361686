//! Engine wiring
//!
//! [`Engine`] owns every component shared between the consumer loop and the
//! HTTP gateway. It is built explicitly and passed around behind an `Arc`,
//! so independent engines can coexist in one process.

use crate::config::{Config, StreamBackend};
use crate::execution::{OrderExecutor, SimulatedExecutor};
use crate::store::{IdempotencyGuard, OrderCache};
use crate::stream::{MemoryStream, OrderStream, RedisStream, ResponsePublisher};
use crate::telemetry::MetricsCollector;
use anyhow::Context;
use std::sync::Arc;

/// Shared state and collaborators of one execution engine
pub struct Engine {
    stream: Arc<dyn OrderStream>,
    publisher: Arc<dyn ResponsePublisher>,
    executor: Arc<dyn OrderExecutor>,
    guard: Arc<IdempotencyGuard>,
    cache: Arc<OrderCache>,
    metrics: Arc<MetricsCollector>,
}

impl Engine {
    /// Assemble an engine with empty stores
    pub fn new(
        stream: Arc<dyn OrderStream>,
        publisher: Arc<dyn ResponsePublisher>,
        executor: Arc<dyn OrderExecutor>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            stream,
            publisher,
            executor,
            guard: Arc::new(IdempotencyGuard::new()),
            cache: Arc::new(OrderCache::new()),
            metrics,
        }
    }

    /// An engine over an in-process stream; the stream is returned for
    /// direct injection and inspection
    pub fn in_memory(
        executor: Arc<dyn OrderExecutor>,
    ) -> anyhow::Result<(Self, Arc<MemoryStream>)> {
        let stream = Arc::new(MemoryStream::default());
        let metrics = Arc::new(MetricsCollector::new().context("Failed to build metrics")?);
        let engine = Self::new(stream.clone(), stream.clone(), executor, metrics);
        Ok((engine, stream))
    }

    /// Build the engine described by `config`, connecting to the stream
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let executor = Arc::new(SimulatedExecutor::from_config(&config.executor));
        let metrics = Arc::new(MetricsCollector::new().context("Failed to build metrics")?);

        let engine = match config.stream.backend {
            StreamBackend::Redis => {
                let redis = Arc::new(
                    RedisStream::connect(&config.stream)
                        .await
                        .with_context(|| format!("Failed to connect to {}", config.stream.redis_url()))?,
                );
                Self::new(redis.clone(), redis, executor, metrics)
            }
            StreamBackend::Memory => {
                tracing::warn!("Using in-memory stream; orders are lost on restart");
                let memory = Arc::new(
                    MemoryStream::new(config.stream.payload_field.clone())
                        .with_max_len(config.stream.max_len),
                );
                Self::new(memory.clone(), memory, executor, metrics)
            }
        };

        Ok(engine)
    }

    pub fn stream(&self) -> &Arc<dyn OrderStream> {
        &self.stream
    }

    pub fn publisher(&self) -> &Arc<dyn ResponsePublisher> {
        &self.publisher
    }

    pub fn executor(&self) -> &Arc<dyn OrderExecutor> {
        &self.executor
    }

    pub fn guard(&self) -> &Arc<IdempotencyGuard> {
        &self.guard
    }

    pub fn cache(&self) -> &Arc<OrderCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }
}
