//! Dequeue-time order validation

use super::{OrderRequest, OrderType};
use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a dequeued order is rejected
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The stream message had no order payload field
    #[error("Message carries no order payload")]
    MissingPayload,
    /// The payload is not a well-formed order document
    #[error("Malformed order payload: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A required string field is empty
    #[error("Field `{0}` must not be empty")]
    EmptyField(&'static str),
    /// Quantity is zero or negative
    #[error("Quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),
    /// Limit or stop-limit order without a limit price
    #[error("{0:?} order requires limit_price")]
    MissingLimitPrice(OrderType),
    /// Stop or stop-limit order without a stop price
    #[error("{0:?} order requires stop_price")]
    MissingStopPrice(OrderType),
    /// A supplied price is zero or negative
    #[error("Field `{field}` must be positive, got {value}")]
    NonPositivePrice { field: &'static str, value: Decimal },
}

impl OrderRequest {
    /// Check the semantic constraints serde cannot express
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("order_id"));
        }
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::EmptyField("symbol"));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity(self.quantity));
        }

        match self.limit_price {
            None if self.order_type.requires_limit_price() => {
                return Err(ValidationError::MissingLimitPrice(self.order_type))
            }
            Some(value) if value <= Decimal::ZERO => {
                return Err(ValidationError::NonPositivePrice {
                    field: "limit_price",
                    value,
                })
            }
            _ => {}
        }

        match self.stop_price {
            None if self.order_type.requires_stop_price() => {
                return Err(ValidationError::MissingStopPrice(self.order_type))
            }
            Some(value) if value <= Decimal::ZERO => {
                return Err(ValidationError::NonPositivePrice {
                    field: "stop_price",
                    value,
                })
            }
            _ => {}
        }

        Ok(())
    }
}

/// Decode a raw stream payload into an order without checking semantics
pub fn parse_order(payload: Option<&str>) -> Result<OrderRequest, ValidationError> {
    let raw = payload.ok_or(ValidationError::MissingPayload)?;
    Ok(serde_json::from_str(raw)?)
}
