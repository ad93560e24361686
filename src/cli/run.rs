//! Run command implementation

use crate::config::Config;
use crate::consumer::{Consumer, ConsumerSettings};
use crate::engine::Engine;
use crate::gateway;
use crate::store;
use clap::Args;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Serve HTTP only; do not consume the stream
    #[arg(long)]
    pub gateway_only: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let engine = Arc::new(Engine::from_config(config).await?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let consumer = if self.gateway_only {
            None
        } else {
            let settings = ConsumerSettings::from_config(&config.stream);
            tracing::info!(
                stream = %config.stream.stream,
                group = %config.stream.group,
                consumer = %settings.name,
                "Starting consumer"
            );
            Some(tokio::spawn(
                Consumer::new(engine.clone(), settings).run(shutdown_rx.clone()),
            ))
        };

        let sweeper = tokio::spawn(store::run_sweeper(
            engine.guard().clone(),
            engine.cache().clone(),
            config.store.idempotency_ttl(),
            config.store.order_ttl(),
            config.store.sweep_interval(),
            shutdown_rx.clone(),
        ));

        let server = gateway::serve(engine, &config.gateway, shutdown_rx);
        tokio::pin!(server);

        let finished = tokio::select! {
            served = &mut server => Some(served),
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                }
                tracing::info!("Shutdown requested");
                None
            }
        };

        // Also reached when the gateway stops on its own error
        let _ = shutdown_tx.send(true);
        let served = match finished {
            Some(served) => served,
            None => server.await,
        };

        if let Some(consumer) = consumer {
            if let Err(e) = consumer.await {
                tracing::error!(error = %e, "Consumer task failed");
            }
        }
        let _ = sweeper.await;

        served
    }
}
