//! Configuration types for exec-engine
//!
//! Loaded from an optional TOML file, then overridden from the environment.
//! Every field has a default, so an empty file is a valid configuration.

use crate::telemetry::LogFormat;
use anyhow::Context;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stream: StreamConfig,
    pub executor: ExecutorConfig,
    pub gateway: GatewayConfig,
    pub store: StoreConfig,
    pub telemetry: TelemetryConfig,
}

/// Which stream implementation to run against
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamBackend {
    #[default]
    Redis,
    /// In-process stream; single instance only
    Memory,
}

/// Order stream configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub backend: StreamBackend,
    pub host: String,
    pub port: u16,
    /// Stream key orders are appended to
    pub stream: String,
    /// Consumer group shared by all engine instances
    pub group: String,
    /// This instance's consumer name; must differ between instances
    pub consumer: String,
    /// Field of each stream entry holding the JSON order
    pub payload_field: String,
    /// Maximum entries per read
    pub batch_size: usize,
    /// Maximum time a read blocks waiting for entries
    pub block_ms: u64,
    /// First retry delay after a stream failure
    pub retry_initial_ms: u64,
    /// Retry delay ceiling
    pub retry_max_ms: u64,
    /// Entries left unacknowledged this long by any consumer are claimed
    pub claim_idle_ms: u64,
    /// How often to look for such entries
    pub claim_interval_ms: u64,
    /// Approximate cap on stream length (`XADD MAXLEN ~`); unset keeps everything
    pub max_len: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backend: StreamBackend::Redis,
            host: "localhost".to_string(),
            port: 6379,
            stream: "execution.orders".to_string(),
            group: "execution-engine-group".to_string(),
            consumer: default_consumer_name(),
            payload_field: "order".to_string(),
            batch_size: 10,
            block_ms: 100,
            retry_initial_ms: 50,
            retry_max_ms: 2000,
            claim_idle_ms: 30_000,
            claim_interval_ms: 5_000,
            max_len: None,
        }
    }
}

fn default_consumer_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("execution-engine-{}", &id[..8])
}

impl StreamConfig {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }

    /// Read block duration; never zero, since zero blocks forever in Redis
    pub fn block(&self) -> Duration {
        Duration::from_millis(self.block_ms.max(1))
    }

    pub fn retry_initial(&self) -> Duration {
        Duration::from_millis(self.retry_initial_ms.max(1))
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms.max(self.retry_initial_ms).max(1))
    }

    pub fn claim_idle(&self) -> Duration {
        Duration::from_millis(self.claim_idle_ms)
    }

    pub fn claim_interval(&self) -> Duration {
        Duration::from_millis(self.claim_interval_ms.max(1))
    }
}

/// Simulated executor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Simulated broker round-trip
    pub delay_ms: u64,
    /// Reference price for symbols without an entry in `reference_prices`
    pub reference_price: Decimal,
    /// Market fills land within `[0, max_slippage)` of the reference price
    pub max_slippage: Decimal,
    /// Per-symbol reference prices
    pub reference_prices: HashMap<String, Decimal>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            delay_ms: 2,
            reference_price: Decimal::new(100, 0),
            max_slippage: Decimal::new(100, 2), // 1.00
            reference_prices: HashMap::new(),
        }
    }
}

impl ExecutorConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// HTTP gateway configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub port: u16,
    /// Per-request deadline
    pub request_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            request_timeout_ms: 5000,
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Store eviction configuration; unset TTLs mean entries live forever
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub idempotency_ttl_secs: Option<u64>,
    pub order_ttl_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            idempotency_ttl_secs: None,
            order_ttl_secs: None,
            sweep_interval_secs: 60,
        }
    }
}

impl StoreConfig {
    pub fn idempotency_ttl(&self) -> Option<Duration> {
        self.idempotency_ttl_secs.map(Duration::from_secs)
    }

    pub fn order_ttl(&self) -> Option<Duration> {
        self.order_ttl_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults; then apply
    /// environment overrides
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `REDIS_HOST`, `REDIS_PORT`, `REDIS_STREAM`, `CONSUMER_GROUP`,
    /// `CONSUMER_NAME`, `HTTP_PORT` and `LOG_LEVEL` from `lookup`
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = var("REDIS_HOST") {
            self.stream.host = host;
        }
        if let Some(port) = var("REDIS_PORT") {
            self.stream.port = port
                .parse()
                .with_context(|| format!("REDIS_PORT is not a port number: {port}"))?;
        }
        if let Some(stream) = var("REDIS_STREAM") {
            self.stream.stream = stream;
        }
        if let Some(group) = var("CONSUMER_GROUP") {
            self.stream.group = group;
        }
        if let Some(consumer) = var("CONSUMER_NAME") {
            self.stream.consumer = consumer;
        }
        if let Some(port) = var("HTTP_PORT") {
            self.gateway.port = port
                .parse()
                .with_context(|| format!("HTTP_PORT is not a port number: {port}"))?;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.telemetry.log_level = level;
        }
        Ok(())
    }
}
