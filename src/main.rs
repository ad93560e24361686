use clap::Parser;
use exec_engine::cli::{Cli, Commands};
use exec_engine::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration; a missing file means defaults plus environment
    let config = Config::load_or_default(&cli.config)?;

    // Initialize telemetry
    exec_engine::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting execution engine");
            args.execute(&config).await?;
        }
        Commands::Submit(args) => {
            args.execute().await?;
        }
        Commands::Status(args) => {
            args.execute().await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Stream: {:?} {} group={} consumer={}",
                config.stream.backend,
                config.stream.redis_url(),
                config.stream.group,
                config.stream.consumer
            );
            println!("  Stream key: {}", config.stream.stream);
            println!(
                "  Executor: delay={}ms reference={} max_slippage={}",
                config.executor.delay_ms, config.executor.reference_price, config.executor.max_slippage
            );
            println!("  Gateway: port {}", config.gateway.port);
            println!(
                "  Store TTL: idempotency={:?} orders={:?}",
                config.store.idempotency_ttl(),
                config.store.order_ttl()
            );
            println!(
                "  Logging: {} ({:?})",
                config.telemetry.log_level, config.telemetry.log_format
            );
        }
    }

    Ok(())
}
