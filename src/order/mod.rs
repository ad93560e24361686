//! Order data model
//!
//! Wire types shared by the gateway, the stream consumer and the executor,
//! plus dequeue-time validation.

mod types;
mod validation;

pub use types::{OrderRequest, OrderResponse, OrderStatus, OrderType, Side};
pub use validation::{parse_order, ValidationError};

/// Channel name on which the response for `order_id` is published
pub fn response_channel(order_id: &str) -> String {
    format!("order.response.{order_id}")
}
