//! Live broker gateway, gated behind the `live` feature.
//!
//! The broker's HTTP/wire format is out of scope for this platform, which
//! only specifies an abstract `BrokerGateway` capability. `LiveBrokerGateway`
//! therefore stays a documented placeholder: it satisfies the `BrokerGateway` trait so
//! the rest of the workspace can depend on a concrete live type, but every
//! method returns [`GatewayError::Unreachable`] until a real backend is
//! wired in.

use basso_execution::{
    BrokerGateway, BrokerPosition, Funds, GatewayError, OrderId, OrderKind, OrderStatus,
    OrderStatusReport, PlaceOrderAck, Quote,
};
use basso_hedge::{OptionChainSource, OptionQuote};
use basso_markets::exchange::ExchangeId;
use basso_markets::side::Side;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Connection details for the live broker backend. Fields are a placeholder
/// shape: this platform's webhook/REST surface is out of scope, so nothing
/// here is wired to an actual transport.
#[derive(Debug, Clone)]
pub struct LiveBrokerConfig {
    pub endpoint: String,
    pub api_key: String,
}

#[derive(Debug)]
pub struct LiveBrokerGateway {
    #[allow(dead_code)]
    config: LiveBrokerConfig,
}

impl LiveBrokerGateway {
    pub fn new(config: LiveBrokerConfig) -> Self {
        Self { config }
    }

    fn not_implemented(&self) -> GatewayError {
        GatewayError::Unreachable(
            "LiveBrokerGateway has no wire backend; this platform's broker wire format is out of scope".to_string(),
        )
    }
}

#[async_trait::async_trait]
impl BrokerGateway for LiveBrokerGateway {
    async fn funds(&self) -> Result<Funds, GatewayError> {
        Err(self.not_implemented())
    }

    async fn quote(&self, _symbol: &str, _exchange: ExchangeId) -> Result<Quote, GatewayError> {
        Err(self.not_implemented())
    }

    async fn positions(&self) -> Result<Vec<BrokerPosition>, GatewayError> {
        Err(self.not_implemented())
    }

    async fn place_order(
        &self,
        _symbol: &str,
        _exchange: ExchangeId,
        _side: Side,
        _quantity: Decimal,
        _kind: OrderKind,
        _product: &str,
        _price: Option<Decimal>,
    ) -> Result<PlaceOrderAck, GatewayError> {
        Err(self.not_implemented())
    }

    async fn order_status(&self, _id: OrderId) -> Result<OrderStatusReport, GatewayError> {
        Err(self.not_implemented())
    }

    async fn modify_order(&self, _id: OrderId, _new_price: Decimal) -> Result<(), GatewayError> {
        Err(self.not_implemented())
    }

    async fn cancel_order(&self, _id: OrderId) -> Result<(), GatewayError> {
        Err(self.not_implemented())
    }
}

/// Live option-chain source, gated behind the `live` feature for the same
/// reason as [`LiveBrokerGateway`]: a real chain feed needs a wire backend
/// this platform does not specify. Kept as a separate type rather than a
/// second trait impl on `LiveBrokerGateway` because a broker session and a
/// chain feed are independent capabilities (`basso_hedge::OptionChainSource`
/// is deliberately not part of `BrokerGateway`).
#[derive(Debug)]
pub struct LiveOptionChainSource {
    #[allow(dead_code)]
    config: LiveBrokerConfig,
}

impl LiveOptionChainSource {
    pub fn new(config: LiveBrokerConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl OptionChainSource for LiveOptionChainSource {
    async fn option_chain(
        &self,
        _index_symbol: &str,
        _expiry: NaiveDate,
    ) -> Result<Vec<OptionQuote>, GatewayError> {
        Err(GatewayError::Unreachable(
            "LiveOptionChainSource has no wire backend; this platform's broker wire format is out of scope".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn live_gateway_reports_unreachable_until_wired() {
        let gateway = LiveBrokerGateway::new(LiveBrokerConfig {
            endpoint: "https://broker.example".to_string(),
            api_key: "test".to_string(),
        });
        let err = gateway.funds().await.unwrap_err();
        assert!(matches!(err, GatewayError::Unreachable(_)));
    }

    #[tokio::test]
    async fn live_option_chain_source_reports_unreachable_until_wired() {
        let source = LiveOptionChainSource::new(LiveBrokerConfig {
            endpoint: "https://broker.example".to_string(),
            api_key: "test".to_string(),
        });
        let err = source
            .option_chain("NIFTY", chrono::NaiveDate::from_ymd_opt(2026, 1, 29).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unreachable(_)));
    }
}
