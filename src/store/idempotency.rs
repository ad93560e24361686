//! Idempotency guard

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Concurrent set of idempotency keys already seen by this process
///
/// `check_and_record` is a single atomic insert on the key's shard, so two
/// consumers racing on the same key can never both be told it is new.
#[derive(Debug, Default)]
pub struct IdempotencyGuard {
    seen: DashMap<String, Instant>,
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the order should execute
    ///
    /// A missing or empty key is always novel and is not recorded.
    pub fn check_and_record(&self, key: Option<&str>) -> bool {
        match key {
            Some(key) if !key.is_empty() => self.seen.insert(key.to_string(), Instant::now()).is_none(),
            _ => true,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Drop keys first seen at least `ttl` ago; returns how many were removed
    pub fn evict_older_than(&self, ttl: Duration) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, seen_at| seen_at.elapsed() < ttl);
        before.saturating_sub(self.seen.len())
    }
}
