//! In-memory fill simulator, used by `backtest` and the executor's tests.
//!
//! Scoped to what `basso`'s `backtest` command and this crate's own tests
//! need: every order fills immediately at the quoted price, with an
//! injectable rejection list for failure-path tests.

use crate::gateway::{
    BrokerGateway, Funds, GatewayError, OrderId, OrderKind, OrderStatus, OrderStatusReport,
    PlaceOrderAck, Quote,
};
use async_trait::async_trait;
use basso_markets::clock::Clock;
use basso_markets::exchange::ExchangeId;
use basso_markets::side::Side;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct FilledOrder {
    filled_qty: Decimal,
    price: Decimal,
}

/// An in-memory broker gateway that fills every order at its requested
/// price (or the seeded quote for market orders), unless the symbol has
/// been marked to reject via [`SimulatedBrokerGateway::reject_symbol`].
#[derive(Debug)]
pub struct SimulatedBrokerGateway {
    clock: Arc<dyn Clock>,
    quotes: Mutex<HashMap<String, Quote>>,
    orders: Mutex<HashMap<OrderId, FilledOrder>>,
    rejected_symbols: Mutex<Vec<String>>,
    next_order_id: AtomicU64,
    funds: Mutex<Funds>,
}

impl SimulatedBrokerGateway {
    pub fn new(clock: Arc<dyn Clock>, funds: Funds) -> Self {
        Self {
            clock,
            quotes: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            rejected_symbols: Mutex::new(Vec::new()),
            next_order_id: AtomicU64::new(1),
            funds: Mutex::new(funds),
        }
    }

    pub fn seed_quote(&self, symbol: impl Into<String>, ltp: Decimal) {
        let now = self.clock.now();
        self.quotes.lock().insert(
            symbol.into(),
            Quote {
                ltp,
                bid: ltp,
                ask: ltp,
                ts: now,
            },
        );
    }

    pub fn reject_symbol(&self, symbol: impl Into<String>) {
        self.rejected_symbols.lock().push(symbol.into());
    }
}

#[async_trait]
impl BrokerGateway for SimulatedBrokerGateway {
    async fn funds(&self) -> Result<Funds, GatewayError> {
        Ok(*self.funds.lock())
    }

    async fn quote(&self, symbol: &str, _exchange: ExchangeId) -> Result<Quote, GatewayError> {
        self.quotes
            .lock()
            .get(symbol)
            .copied()
            .ok_or_else(|| GatewayError::Unreachable(format!("no seeded quote for {symbol}")))
    }

    async fn positions(&self) -> Result<Vec<crate::gateway::BrokerPosition>, GatewayError> {
        Ok(Vec::new())
    }

    async fn place_order(
        &self,
        symbol: &str,
        _exchange: ExchangeId,
        _side: Side,
        quantity: Decimal,
        kind: OrderKind,
        _product: &str,
        price: Option<Decimal>,
    ) -> Result<PlaceOrderAck, GatewayError> {
        if self.rejected_symbols.lock().iter().any(|s| s == symbol) {
            return Err(GatewayError::OrderRejected(format!(
                "{symbol} is configured to reject in this simulation"
            )));
        }

        let fill_price = match kind {
            OrderKind::Market => self
                .quotes
                .lock()
                .get(symbol)
                .map(|q| q.ltp)
                .ok_or_else(|| GatewayError::Unreachable(format!("no seeded quote for {symbol}")))?,
            OrderKind::Limit => price.ok_or_else(|| {
                GatewayError::OrderRejected("limit order requires a price".to_string())
            })?,
        };

        let order_id = OrderId(self.next_order_id.fetch_add(1, Ordering::SeqCst));
        self.orders.lock().insert(
            order_id,
            FilledOrder {
                filled_qty: quantity,
                price: fill_price,
            },
        );

        Ok(PlaceOrderAck {
            status: OrderStatus::Complete,
            order_id,
        })
    }

    async fn order_status(&self, id: OrderId) -> Result<OrderStatusReport, GatewayError> {
        self.orders
            .lock()
            .get(&id)
            .map(|order| OrderStatusReport {
                status: OrderStatus::Complete,
                filled_qty: order.filled_qty,
                price: order.price,
            })
            .ok_or_else(|| GatewayError::Unreachable(format!("unknown order {id}")))
    }

    async fn modify_order(&self, id: OrderId, new_price: Decimal) -> Result<(), GatewayError> {
        let mut orders = self.orders.lock();
        match orders.get_mut(&id) {
            Some(order) => {
                order.price = new_price;
                Ok(())
            }
            None => Err(GatewayError::Unreachable(format!("unknown order {id}"))),
        }
    }

    async fn cancel_order(&self, _id: OrderId) -> Result<(), GatewayError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basso_markets::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn gateway() -> SimulatedBrokerGateway {
        let clock = Arc::new(FixedClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        SimulatedBrokerGateway::new(
            clock,
            Funds {
                used_margin: dec!(0),
                available_cash: dec!(10_000_000),
                collateral: dec!(0),
                m2m_realized: dec!(0),
                m2m_unrealized: dec!(0),
            },
        )
    }

    #[tokio::test]
    async fn market_order_fills_at_seeded_quote() {
        let gw = gateway();
        gw.seed_quote("BANKNIFTY", dec!(52000));
        let ack = gw
            .place_order(
                "BANKNIFTY",
                ExchangeId::Nse,
                Side::Buy,
                dec!(70),
                OrderKind::Market,
                "NRML",
                None,
            )
            .await
            .unwrap();
        let status = gw.order_status(ack.order_id).await.unwrap();
        assert_eq!(status.price, dec!(52000));
        assert_eq!(status.status, OrderStatus::Complete);
    }

    #[tokio::test]
    async fn rejected_symbol_fails_order_placement() {
        let gw = gateway();
        gw.reject_symbol("BANKNIFTY");
        let result = gw
            .place_order(
                "BANKNIFTY",
                ExchangeId::Nse,
                Side::Buy,
                dec!(70),
                OrderKind::Limit,
                "NRML",
                Some(dec!(52000)),
            )
            .await;
        assert!(matches!(result, Err(GatewayError::OrderRejected(_))));
    }
}
