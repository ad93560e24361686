//! Per-message processing

use crate::engine::Engine;
use crate::order::{parse_order, response_channel, OrderResponse, ValidationError};
use crate::stream::StreamMessage;
use chrono::Utc;
use std::time::Instant;

/// What happened to one stream message
#[derive(Debug)]
pub enum Outcome {
    /// Executed and filled
    Filled(OrderResponse),
    /// Rejected; `response` is set when the order id was known and a
    /// rejected response was cached
    Rejected {
        reason: String,
        response: Option<OrderResponse>,
    },
    /// Idempotency key already seen; nothing executed or cached
    Duplicate { key: String },
}

impl Outcome {
    pub fn response(&self) -> Option<&OrderResponse> {
        match self {
            Outcome::Filled(response) => Some(response),
            Outcome::Rejected { response, .. } => response.as_ref(),
            Outcome::Duplicate { .. } => None,
        }
    }
}

/// Run one message through validation, dedup, execution, metrics, caching
/// and publication. Never fails: every error becomes an [`Outcome`].
///
/// The caller acknowledges the message afterwards regardless of outcome.
pub async fn process_message(engine: &Engine, message: &StreamMessage) -> Outcome {
    let dequeued_at = Instant::now();

    let order = match parse_order(message.payload.as_deref()) {
        Ok(order) => order,
        Err(e) => return reject_unparseable(engine, message, e),
    };

    if let Err(e) = order.validate() {
        tracing::warn!(
            message_id = %message.id,
            order_id = %order.order_id,
            error = %e,
            "Order failed validation"
        );
        engine.metrics().inc_rejected();
        if order.order_id.trim().is_empty() {
            return Outcome::Rejected {
                reason: e.to_string(),
                response: None,
            };
        }
        let response = OrderResponse::rejected(
            order.order_id.clone(),
            order.idempotency_key.clone().unwrap_or_default(),
        );
        let response = finish(engine, response, dequeued_at).await;
        return Outcome::Rejected {
            reason: e.to_string(),
            response: Some(response),
        };
    }

    if !engine.guard().check_and_record(order.dedup_key()) {
        let key = order.dedup_key().unwrap_or_default().to_string();
        tracing::info!(
            order_id = %order.order_id,
            idempotency_key = %key,
            "Duplicate order detected"
        );
        engine.metrics().inc_duplicate();
        return Outcome::Duplicate { key };
    }

    match engine.executor().execute(&order).await {
        Ok(response) => {
            let response = finish(engine, response, dequeued_at).await;
            engine.metrics().inc_processed();
            tracing::info!(
                order_id = %response.order_id,
                latency_ms = response.latency_ms,
                price = %response.filled_avg_price,
                "Order executed"
            );
            Outcome::Filled(response)
        }
        Err(e) => {
            tracing::warn!(order_id = %order.order_id, error = %e, "Order execution failed");
            engine.metrics().inc_rejected();
            let response = OrderResponse::rejected(
                order.order_id.clone(),
                order.idempotency_key.clone().unwrap_or_default(),
            );
            let response = finish(engine, response, dequeued_at).await;
            Outcome::Rejected {
                reason: e.to_string(),
                response: Some(response),
            }
        }
    }
}

fn reject_unparseable(engine: &Engine, message: &StreamMessage, e: ValidationError) -> Outcome {
    tracing::warn!(message_id = %message.id, error = %e, "Dropping unparseable order message");
    engine.metrics().inc_rejected();
    Outcome::Rejected {
        reason: e.to_string(),
        response: None,
    }
}

/// Stamp latency, record it, cache the response and publish it
async fn finish(engine: &Engine, mut response: OrderResponse, dequeued_at: Instant) -> OrderResponse {
    let elapsed = dequeued_at.elapsed();
    response.latency_ms = elapsed.as_secs_f64() * 1000.0;
    response.acknowledged_at = Utc::now().timestamp_millis();

    engine.metrics().observe_latency(elapsed);
    engine.cache().insert(response.clone());
    publish(engine, &response).await;
    response
}

async fn publish(engine: &Engine, response: &OrderResponse) {
    let channel = response_channel(&response.order_id);
    let payload = match serde_json::to_string(response) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(order_id = %response.order_id, error = %e, "Failed to encode response");
            return;
        }
    };

    if let Err(e) = engine.publisher().publish(&channel, &payload).await {
        engine.metrics().inc_stream_error();
        tracing::warn!(%channel, error = %e, "Failed to publish order response");
    }
}
