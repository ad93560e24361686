//! Telemetry module
//!
//! Metrics and structured logging

mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{MetricsCollector, MetricsSnapshot};

use crate::config::TelemetryConfig;

/// Initialize process-wide telemetry
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level, config.log_format)
}
