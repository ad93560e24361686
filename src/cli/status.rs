//! Status command implementation

use crate::order::OrderResponse;
use anyhow::Context;
use clap::Args;
use reqwest::StatusCode;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Order to look up
    pub order_id: String,

    /// Gateway base URL
    #[arg(long, default_value = "http://localhost:8080")]
    pub url: String,
}

impl StatusArgs {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let url = format!("{}/orders/{}", self.url.trim_end_matches('/'), self.order_id);
        let response = reqwest::get(&url)
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                println!("{}: not processed (yet)", self.order_id);
                Ok(())
            }
            status if status.is_success() => {
                let order: OrderResponse = response.json().await.context("Invalid order response")?;
                println!("{}", serde_json::to_string_pretty(&order)?);
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Lookup failed ({status}): {body}")
            }
        }
    }
}
