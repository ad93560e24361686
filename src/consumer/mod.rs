//! Stream consumer
//!
//! Pulls batches from the consumer group, runs each message through the
//! pipeline and acknowledges it only once the pipeline has finished.

mod pipeline;

pub use pipeline::{process_message, Outcome};

use crate::config::StreamConfig;
use crate::engine::Engine;
use crate::stream::{ReadCursor, StreamError, StreamMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Consumer loop tuning
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Name of this consumer within the group
    pub name: String,
    pub batch_size: usize,
    pub block: Duration,
    pub retry_initial: Duration,
    pub retry_max: Duration,
    /// Minimum idle time before another consumer's pending entry is claimed
    pub claim_idle: Duration,
    pub claim_interval: Duration,
}

impl ConsumerSettings {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            name: config.consumer.clone(),
            batch_size: config.batch_size.max(1),
            block: config.block(),
            retry_initial: config.retry_initial(),
            retry_max: config.retry_max(),
            claim_idle: config.claim_idle(),
            claim_interval: config.claim_interval(),
        }
    }
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

/// Exponential retry delay, doubling up to a ceiling
#[derive(Debug)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Counts from one polled batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub read: usize,
    pub acked: usize,
}

/// One member of the consumer group
pub struct Consumer {
    engine: Arc<Engine>,
    settings: ConsumerSettings,
}

impl Consumer {
    pub fn new(engine: Arc<Engine>, settings: ConsumerSettings) -> Self {
        Self { engine, settings }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Read one batch, process every message, then acknowledge each
    ///
    /// Only the read can fail. A failed ack is logged and the entry is left
    /// pending for redelivery.
    pub async fn poll_once(&self, cursor: ReadCursor) -> Result<BatchReport, StreamError> {
        let messages = self
            .engine
            .stream()
            .read_batch(
                &self.settings.name,
                cursor,
                self.settings.batch_size,
                self.settings.block,
            )
            .await?;

        Ok(self.process_and_ack(&messages).await)
    }

    /// Take over entries left unacknowledged by any consumer for at least
    /// `claim_idle`, then process and acknowledge them
    pub async fn claim_once(&self) -> Result<BatchReport, StreamError> {
        let messages = self
            .engine
            .stream()
            .claim_stale(
                &self.settings.name,
                self.settings.claim_idle,
                self.settings.batch_size,
            )
            .await?;

        if !messages.is_empty() {
            tracing::info!(count = messages.len(), "Claimed stale pending entries");
        }
        Ok(self.process_and_ack(&messages).await)
    }

    async fn process_and_ack(&self, messages: &[StreamMessage]) -> BatchReport {
        let mut report = BatchReport {
            read: messages.len(),
            acked: 0,
        };

        for message in messages {
            process_message(&self.engine, message).await;

            match self.engine.stream().ack(&message.id).await {
                Ok(()) => report.acked += 1,
                Err(e) => {
                    self.engine.metrics().inc_stream_error();
                    tracing::warn!(message_id = %message.id, error = %e, "Failed to acknowledge message");
                }
            }
        }

        report
    }

    /// Run until `shutdown` turns `true`
    ///
    /// Stream failures never end the loop: they are logged and retried with
    /// exponential backoff, and a vanished consumer group is recreated.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(self.settings.retry_initial, self.settings.retry_max);

        if !self.join_group(&mut backoff, &mut shutdown).await {
            return;
        }

        tracing::info!(consumer = %self.settings.name, "Consumer started");

        // Redeliver anything this consumer took but never acknowledged
        // before switching to new entries.
        let mut cursor = ReadCursor::Pending;
        let mut next_claim = Instant::now();

        loop {
            if *shutdown.borrow() {
                break;
            }

            if Instant::now() >= next_claim {
                next_claim = Instant::now() + self.settings.claim_interval;
                match self.claim_once().await {
                    Ok(report) => {
                        // a full batch may have left more behind
                        if report.read >= self.settings.batch_size {
                            next_claim = Instant::now();
                        }
                    }
                    Err(e) => {
                        if self.recover(e, &mut backoff, &mut shutdown).await {
                            break;
                        }
                        continue;
                    }
                }
            }

            match self.poll_once(cursor).await {
                Ok(report) => {
                    backoff.reset();
                    if cursor == ReadCursor::Pending && report.read == 0 {
                        tracing::debug!("Pending entries drained");
                        cursor = ReadCursor::New;
                    }
                }
                Err(e) => {
                    if matches!(e, StreamError::MissingGroup(_)) {
                        cursor = ReadCursor::Pending;
                    }
                    if self.recover(e, &mut backoff, &mut shutdown).await {
                        break;
                    }
                }
            }
        }

        tracing::info!(consumer = %self.settings.name, "Consumer stopped");
    }

    /// Create the consumer group, retrying until it exists; returns `false`
    /// if shutdown was requested first
    async fn join_group(&self, backoff: &mut Backoff, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            if *shutdown.borrow() {
                return false;
            }
            match self.engine.stream().ensure_group().await {
                Ok(()) => {
                    backoff.reset();
                    return true;
                }
                Err(e) => {
                    self.engine.metrics().inc_stream_error();
                    let delay = backoff.next_delay();
                    tracing::warn!(error = %e, retry_in = ?delay, "Failed to create consumer group");
                    if sleep_or_shutdown(delay, shutdown).await {
                        return false;
                    }
                }
            }
        }
    }

    /// Handle a failed stream call; returns `true` if shutdown was requested
    async fn recover(
        &self,
        error: StreamError,
        backoff: &mut Backoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        self.engine.metrics().inc_stream_error();

        if let StreamError::MissingGroup(_) = error {
            tracing::warn!(error = %error, "Consumer group lost; recreating");
            return !self.join_group(backoff, shutdown).await;
        }

        let delay = backoff.next_delay();
        tracing::warn!(error = %error, retry_in = ?delay, "Error reading from stream");
        sleep_or_shutdown(delay, shutdown).await
    }
}

/// Sleep for `delay`; returns `true` if shutdown was requested meanwhile
async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
