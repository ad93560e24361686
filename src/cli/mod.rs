//! CLI interface for exec-engine
//!
//! Provides subcommands for:
//! - `run`: Start the stream consumer and HTTP gateway
//! - `submit`: Send an order to a running gateway
//! - `status`: Look up an order on a running gateway
//! - `config`: Show the effective configuration

mod run;
mod status;
mod submit;

pub use run::RunArgs;
pub use status::StatusArgs;
pub use submit::SubmitArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "exec-engine")]
#[command(about = "Order execution engine fed by a durable stream")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the consumer and gateway
    Run(RunArgs),
    /// Submit an order to a running gateway
    Submit(SubmitArgs),
    /// Show an order's status
    Status(StatusArgs),
    /// Show configuration
    Config,
}
