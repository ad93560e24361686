//! Order request/response types

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Fill immediately at the prevailing price
    Market,
    /// Fill at `limit_price`
    Limit,
    /// Triggered at `stop_price`
    Stop,
    /// Triggered at `stop_price`, filled at `limit_price`
    StopLimit,
}

impl OrderType {
    /// Whether this type needs a `limit_price`
    pub fn requires_limit_price(self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    /// Whether this type needs a `stop_price`
    pub fn requires_stop_price(self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

/// Terminal status of a processed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Filled,
    Rejected,
}

fn default_time_in_force() -> String {
    "day".to_string()
}

/// An order as submitted by a caller and carried on the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Caller-supplied identifier, unique per logical order
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub limit_price: Option<Decimal>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub stop_price: Option<Decimal>,
    #[serde(default = "default_time_in_force")]
    pub time_in_force: String,
    /// Deduplication token; absent or empty means no dedup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Producer-side epoch milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

impl OrderRequest {
    /// Build a market order with the remaining fields defaulted
    pub fn market(
        order_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            stop_price: None,
            time_in_force: default_time_in_force(),
            idempotency_key: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Build a limit order at `price`
    pub fn limit(
        order_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(price),
            ..Self::market(order_id, symbol, side, quantity)
        }
    }

    /// Attach an idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// The dedup key, if one was supplied and is non-empty
    pub fn dedup_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Result of processing one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    /// Echo of the request's idempotency key (empty when none)
    pub client_order_id: String,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub filled_quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub filled_avg_price: Decimal,
    /// Wall time from dequeue to response, in milliseconds
    pub latency_ms: f64,
    /// Epoch milliseconds at which the response became ready
    pub acknowledged_at: i64,
}

impl OrderResponse {
    /// A full fill at `price`; latency fields are stamped by the consumer
    pub fn filled(order: &OrderRequest, price: Decimal) -> Self {
        Self {
            order_id: order.order_id.clone(),
            client_order_id: order.idempotency_key.clone().unwrap_or_default(),
            status: OrderStatus::Filled,
            filled_quantity: order.quantity,
            filled_avg_price: price,
            latency_ms: 0.0,
            acknowledged_at: 0,
        }
    }

    /// A rejection with nothing filled
    pub fn rejected(order_id: impl Into<String>, client_order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            client_order_id: client_order_id.into(),
            status: OrderStatus::Rejected,
            filled_quantity: Decimal::ZERO,
            filled_avg_price: Decimal::ZERO,
            latency_ms: 0.0,
            acknowledged_at: 0,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}
