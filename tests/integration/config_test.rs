//! Configuration loading tests

use exec_engine::config::{Config, StreamBackend};
use exec_engine::telemetry::LogFormat;
use rust_decimal_macros::dec;
use std::io::Write;

#[test]
fn test_config_example_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let config = Config::load(path).unwrap();

    assert_eq!(config.stream.backend, StreamBackend::Redis);
    assert_eq!(config.stream.stream, "execution.orders");
    assert_eq!(config.stream.group, "execution-engine-group");
    assert_eq!(config.executor.reference_prices["AAPL"], dec!(150));
    assert_eq!(config.gateway.port, 8080);
    assert!(config.store.idempotency_ttl().is_none());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [stream]
        backend = "memory"
        consumer = "engine-7"
        batch_size = 25

        [executor]
        delay_ms = 0
        max_slippage = 0.05

        [store]
        idempotency_ttl_secs = 3600

        [telemetry]
        log_format = "json"
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.stream.backend, StreamBackend::Memory);
    assert_eq!(config.stream.consumer, "engine-7");
    assert_eq!(config.stream.batch_size, 25);
    assert_eq!(config.stream.port, 6379);
    assert_eq!(config.executor.max_slippage, dec!(0.05));
    assert_eq!(config.store.idempotency_ttl_secs, Some(3600));
    assert_eq!(config.telemetry.log_format, LogFormat::Json);
}

#[test]
fn test_invalid_file_is_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[stream]\nport = \"not a number\"").unwrap();

    assert!(Config::load(file.path()).is_err());
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();

    // the process environment may carry overrides; reapply a known set
    config
        .apply_overrides(|key| match key {
            "REDIS_HOST" => Some("redis.internal".to_string()),
            "HTTP_PORT" => Some("9000".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.stream.redis_url(), format!("redis://redis.internal:{}/", config.stream.port));
    assert_eq!(config.gateway.port, 9000);
}
