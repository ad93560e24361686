//! In-memory concurrent stores shared by the consumer and the gateway
//!
//! Both stores are sharded maps so concurrent consumers and HTTP handlers
//! never serialize on a single global lock.

mod idempotency;
mod order_cache;

pub use idempotency::IdempotencyGuard;
pub use order_cache::OrderCache;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Periodically evict entries older than the configured TTLs
///
/// Does nothing for a store whose TTL is `None`. Returns when `shutdown`
/// flips to `true`.
pub async fn run_sweeper(
    guard: Arc<IdempotencyGuard>,
    cache: Arc<OrderCache>,
    idempotency_ttl: Option<Duration>,
    order_ttl: Option<Duration>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    if idempotency_ttl.is_none() && order_ttl.is_none() {
        return;
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let keys = idempotency_ttl.map(|ttl| guard.evict_older_than(ttl)).unwrap_or(0);
                let orders = order_ttl.map(|ttl| cache.evict_older_than(ttl)).unwrap_or(0);
                if keys > 0 || orders > 0 {
                    tracing::debug!(keys, orders, "Evicted expired store entries");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
