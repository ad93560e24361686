//! HTTP gateway
//!
//! `build_router` wires the handlers to an engine with no middleware, so
//! tests can drive it in-process; `serve` adds tracing and request deadlines
//! and binds the listener.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{AcceptedBody, StatusBody};

use crate::config::GatewayConfig;
use crate::engine::Engine;
use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Build the gateway router over `engine`
pub fn build_router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/orders", post(handlers::submit_order))
        .route("/orders/:id", get(handlers::get_order))
        .route("/metrics", get(handlers::metrics))
        .with_state(engine)
}

/// Serve the gateway until `shutdown` turns `true`
pub async fn serve(
    engine: Arc<Engine>,
    config: &GatewayConfig,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let app = build_router(engine)
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "HTTP gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await
        .context("HTTP gateway crashed")
}
