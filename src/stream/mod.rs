//! Durable order stream and response channel
//!
//! The consumer and gateway only see the [`OrderStream`] and
//! [`ResponsePublisher`] traits. [`RedisStream`] talks to Redis Streams;
//! [`MemoryStream`] reproduces consumer-group semantics in-process.

mod memory;
mod redis_stream;

pub use memory::{MemoryStream, PublishedResponse};
pub use redis_stream::RedisStream;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Stream-level failures
#[derive(Debug, Error)]
pub enum StreamError {
    /// Stream endpoint unreachable; callers retry
    #[error("Stream unavailable: {0}")]
    Unavailable(String),
    /// The consumer group (or the stream itself) is gone; callers recreate it
    #[error("Consumer group missing: {0}")]
    MissingGroup(String),
    /// The backend refused or failed a command
    #[error("Stream backend error: {0}")]
    Backend(String),
    /// A payload could not be encoded for the stream
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Which entries a group read should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCursor {
    /// Entries never delivered to any consumer in the group (`>`)
    New,
    /// Entries delivered to this consumer but not yet acknowledged (`0`)
    Pending,
}

/// One entry read from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    /// Stream-assigned entry id, used for acknowledgment
    pub id: String,
    /// The order payload field, if present and textual
    pub payload: Option<String>,
}

/// A durable, append-only stream consumed through a named group
#[async_trait]
pub trait OrderStream: Send + Sync {
    /// Create the consumer group; an existing group is not an error
    async fn ensure_group(&self) -> Result<(), StreamError>;

    /// Read up to `count` entries for `consumer`, blocking at most `block`
    /// when nothing is available
    async fn read_batch(
        &self,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>, StreamError>;

    /// Take over entries any consumer has left unacknowledged for at least
    /// `min_idle`, returning up to `count` of them now owned by `consumer`
    async fn claim_stale(
        &self,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError>;

    /// Acknowledge a fully processed entry
    async fn ack(&self, id: &str) -> Result<(), StreamError>;

    /// Append an order payload; returns the new entry id
    async fn enqueue(&self, payload: &str) -> Result<String, StreamError>;

    /// Check connectivity
    async fn ping(&self) -> Result<(), StreamError>;
}

/// Push-based notification of order responses
#[async_trait]
pub trait ResponsePublisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StreamError>;
}
