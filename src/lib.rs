//! exec-engine: order execution engine fed by a durable stream
//!
//! This library provides the core components for:
//! - Consuming orders from a Redis stream through a consumer group
//! - Validation and at-most-once execution per idempotency key
//! - Simulated fills with configurable latency and slippage
//! - An in-memory order cache and per-order response publication
//! - An HTTP gateway for submission, lookup, health and metrics
//! - Full observability stack

pub mod cli;
pub mod config;
pub mod consumer;
pub mod engine;
pub mod execution;
pub mod gateway;
pub mod order;
pub mod store;
pub mod stream;
pub mod telemetry;
