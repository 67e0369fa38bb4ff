//! The abstract broker capability — an abstract `BrokerGateway` trait, not
//! a wire spec. One trait, multiple implementations (live, simulated),
//! `async fn` methods, constructed once and injected rather than reached
//! for as a global singleton.

use async_trait::async_trait;
use basso_markets::exchange::ExchangeId;
use basso_markets::side::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORD-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OrderKind {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OrderStatus {
    Pending,
    Complete,
    Partial,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Funds {
    pub used_margin: Decimal,
    pub available_cash: Decimal,
    pub collateral: Decimal,
    pub m2m_realized: Decimal,
    pub m2m_unrealized: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Quote {
    pub ltp: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub exchange: ExchangeId,
    pub quantity: i64,
    pub average_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PlaceOrderAck {
    pub status: OrderStatus,
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct OrderStatusReport {
    pub status: OrderStatus,
    pub filled_qty: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
    #[error("order rejected: {0}")]
    OrderRejected(String),
    #[error("gateway call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Capability for funds, quotes, positions, and order lifecycle management.
///
/// Two implementations exist: `basso_broker`'s `live` (feature-gated, wire
/// format out of scope) and [`crate::simulator::SimulatedBrokerGateway`].
/// Safe for concurrent use; every call carries its own timeout (gateway
/// default 10s, quote 5s).
#[async_trait]
pub trait BrokerGateway: Send + Sync + fmt::Debug {
    async fn funds(&self) -> Result<Funds, GatewayError>;

    async fn quote(&self, symbol: &str, exchange: ExchangeId) -> Result<Quote, GatewayError>;

    async fn positions(&self) -> Result<Vec<BrokerPosition>, GatewayError>;

    #[allow(clippy::too_many_arguments)]
    async fn place_order(
        &self,
        symbol: &str,
        exchange: ExchangeId,
        side: Side,
        quantity: Decimal,
        kind: OrderKind,
        product: &str,
        price: Option<Decimal>,
    ) -> Result<PlaceOrderAck, GatewayError>;

    async fn order_status(&self, id: OrderId) -> Result<OrderStatusReport, GatewayError>;

    async fn modify_order(&self, id: OrderId, new_price: Decimal) -> Result<(), GatewayError>;

    async fn cancel_order(&self, id: OrderId) -> Result<(), GatewayError>;
}
