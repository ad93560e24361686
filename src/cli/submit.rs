//! Submit command implementation

use crate::gateway::AcceptedBody;
use crate::order::{OrderRequest, OrderType, Side};
use anyhow::Context;
use chrono::Utc;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SideArg {
    Buy,
    Sell,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Gateway base URL
    #[arg(long, default_value = "http://localhost:8080")]
    pub url: String,

    /// Order id; generated when omitted
    #[arg(long)]
    pub order_id: Option<String>,

    #[arg(long)]
    pub symbol: String,

    #[arg(long, value_enum)]
    pub side: SideArg,

    #[arg(long)]
    pub quantity: Decimal,

    /// Limit price; makes this a limit order (stop-limit with --stop-price)
    #[arg(long)]
    pub limit_price: Option<Decimal>,

    /// Stop price; makes this a stop order (stop-limit with --limit-price)
    #[arg(long)]
    pub stop_price: Option<Decimal>,

    #[arg(long, default_value = "day")]
    pub time_in_force: String,

    #[arg(long)]
    pub idempotency_key: Option<String>,
}

impl SubmitArgs {
    /// Build the order this invocation describes
    pub fn to_order(&self) -> OrderRequest {
        let order_type = match (self.limit_price, self.stop_price) {
            (None, None) => OrderType::Market,
            (Some(_), None) => OrderType::Limit,
            (None, Some(_)) => OrderType::Stop,
            (Some(_), Some(_)) => OrderType::StopLimit,
        };

        OrderRequest {
            order_id: self
                .order_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            symbol: self.symbol.clone(),
            side: match self.side {
                SideArg::Buy => Side::Buy,
                SideArg::Sell => Side::Sell,
            },
            quantity: self.quantity,
            order_type,
            limit_price: self.limit_price,
            stop_price: self.stop_price,
            time_in_force: self.time_in_force.clone(),
            idempotency_key: self.idempotency_key.clone(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub async fn execute(&self) -> anyhow::Result<()> {
        let order = self.to_order();
        let url = format!("{}/orders", self.url.trim_end_matches('/'));

        let response = reqwest::Client::new()
            .post(&url)
            .json(&order)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Submission failed ({status}): {body}");
        }

        let accepted: AcceptedBody = response.json().await.context("Invalid gateway response")?;
        println!("{} {}", accepted.order_id, accepted.status);
        Ok(())
    }
}
