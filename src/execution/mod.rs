//! Order execution
//!
//! [`OrderExecutor`] is the single seam between the consumer pipeline and
//! whatever fills orders. [`SimulatedExecutor`] fills everything locally; a
//! broker adapter implements the same trait.

mod simulated;

pub use simulated::SimulatedExecutor;

use crate::order::{OrderRequest, OrderResponse};
use async_trait::async_trait;
use thiserror::Error;

/// Execution failures reported by an executor
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The broker refused the order
    #[error("Order rejected by broker: {0}")]
    Rejected(String),
    /// The broker could not be reached
    #[error("Broker unavailable: {0}")]
    Unavailable(String),
}

/// Trait for execution implementations
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Execute a validated order
    ///
    /// `latency_ms` and `acknowledged_at` on the returned response are
    /// stamped by the caller.
    async fn execute(&self, order: &OrderRequest) -> Result<OrderResponse, ExecutionError>;
}
