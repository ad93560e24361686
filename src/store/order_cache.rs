//! Last-response-wins order cache

use crate::order::OrderResponse;
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedResponse {
    response: OrderResponse,
    stored_at: Instant,
}

/// Concurrent map from order id to the last response produced for it
#[derive(Debug, Default)]
pub struct OrderCache {
    orders: DashMap<String, CachedResponse>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a response, replacing any earlier one for the same order id
    pub fn insert(&self, response: OrderResponse) {
        let entry = CachedResponse {
            response,
            stored_at: Instant::now(),
        };
        self.orders.insert(entry.response.order_id.clone(), entry);
    }

    /// Look up an order; `None` means it has not been processed (yet)
    pub fn get(&self, order_id: &str) -> Option<OrderResponse> {
        self.orders.get(order_id).map(|entry| entry.response.clone())
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Drop responses stored at least `ttl` ago; returns how many were removed
    pub fn evict_older_than(&self, ttl: Duration) -> usize {
        let before = self.orders.len();
        self.orders.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        before.saturating_sub(self.orders.len())
    }
}
