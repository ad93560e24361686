//! HTTP handlers

use super::ApiError;
use crate::engine::Engine;
use crate::order::{OrderRequest, OrderResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of `/health` and `/ready`
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// Body of an accepted submission
#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedBody {
    pub order_id: String,
    pub status: String,
}

/// Liveness: the process is up, whatever the stream is doing
pub(crate) async fn health() -> Json<StatusBody> {
    Json(StatusBody {
        status: "healthy".to_string(),
    })
}

/// Readiness: the stream answers a ping
pub(crate) async fn ready(State(engine): State<Arc<Engine>>) -> (StatusCode, Json<StatusBody>) {
    match engine.stream().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusBody {
                status: "ready".to_string(),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(StatusBody {
                    status: "unavailable".to_string(),
                }),
            )
        }
    }
}

/// Enqueue an order and return without waiting for execution
pub(crate) async fn submit_order(
    State(engine): State<Arc<Engine>>,
    body: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AcceptedBody>), ApiError> {
    let Json(order) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    if order.order_id.trim().is_empty() {
        return Err(ApiError::BadRequest("order_id must not be empty".to_string()));
    }

    let payload = serde_json::to_string(&order).map_err(crate::stream::StreamError::from)?;
    let entry_id = engine.stream().enqueue(&payload).await.map_err(|e| {
        tracing::error!(order_id = %order.order_id, error = %e, "Failed to queue order");
        ApiError::EnqueueFailed(e)
    })?;

    tracing::debug!(order_id = %order.order_id, %entry_id, "Order queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedBody {
            order_id: order.order_id,
            status: "accepted".to_string(),
        }),
    ))
}

/// Last known response for an order
pub(crate) async fn get_order(
    State(engine): State<Arc<Engine>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    engine.cache().get(&order_id).map(Json).ok_or(ApiError::NotFound)
}

/// Prometheus text exposition
pub(crate) async fn metrics(State(engine): State<Arc<Engine>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        engine.metrics().render(),
    )
}
