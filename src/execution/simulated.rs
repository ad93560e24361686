//! Simulated execution with synthetic fills

use super::{ExecutionError, OrderExecutor};
use crate::config::ExecutorConfig;
use crate::order::{OrderRequest, OrderResponse, OrderType, Side};
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Execution engine that fills every order in full after a fixed delay
///
/// Limit and stop-limit orders fill at their limit price and stop orders
/// at their stop price. Market orders fill at the symbol's reference price
/// moved against the taker by a random whole number of cents below
/// `max_slippage`.
pub struct SimulatedExecutor {
    delay: Duration,
    reference_price: Decimal,
    reference_prices: HashMap<String, Decimal>,
    max_slippage: Decimal,
    executions: AtomicU64,
}

impl SimulatedExecutor {
    /// Create a new simulated executor
    pub fn new(delay: Duration, reference_price: Decimal, max_slippage: Decimal) -> Self {
        Self {
            delay,
            reference_price,
            reference_prices: HashMap::new(),
            max_slippage: max_slippage.max(Decimal::ZERO),
            executions: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.delay(), config.reference_price, config.max_slippage)
            .with_reference_prices(config.reference_prices.clone())
    }

    /// Override the reference price for specific symbols
    pub fn with_reference_prices(mut self, prices: HashMap<String, Decimal>) -> Self {
        self.reference_prices = prices;
        self
    }

    /// Reference price used for market fills of `symbol`
    pub fn reference_price(&self, symbol: &str) -> Decimal {
        self.reference_prices
            .get(symbol)
            .copied()
            .unwrap_or(self.reference_price)
    }

    pub fn max_slippage(&self) -> Decimal {
        self.max_slippage
    }

    /// Number of orders executed so far
    pub fn execution_count(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }

    fn slippage(&self) -> Decimal {
        let steps = (self.max_slippage * Decimal::ONE_HUNDRED)
            .ceil()
            .to_i64()
            .unwrap_or(0);
        if steps <= 0 {
            return Decimal::ZERO;
        }
        // cents < ceil(max * 100), so the offset stays strictly below max
        let cents = rand::thread_rng().gen_range(0..steps);
        Decimal::new(cents, 2)
    }

    fn fill_price(&self, order: &OrderRequest) -> Decimal {
        if let Some(limit) = order.limit_price {
            return limit;
        }
        match (order.order_type, order.stop_price) {
            (OrderType::Stop, Some(stop)) => stop,
            _ => {
                let reference = self.reference_price(&order.symbol);
                match order.side {
                    Side::Buy => reference + self.slippage(),
                    Side::Sell => reference - self.slippage(),
                }
            }
        }
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

#[async_trait]
impl OrderExecutor for SimulatedExecutor {
    async fn execute(&self, order: &OrderRequest) -> Result<OrderResponse, ExecutionError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let price = self.fill_price(order);
        self.executions.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(order_id = %order.order_id, %price, "Simulated order filled");
        Ok(OrderResponse::filled(order, price))
    }
}
