//! Periodic intraday-margin snapshot and end-of-day summary.
//!
//! Fetches funds and positions, derives
//! `intraday_used = used_margin - baseline_margin - excluded_margin` and
//! `utilisation_pct = intraday_used / total_budget * 100`. Baseline capture
//! is a once-per-session latch; `excluded_margin` is tracked separately from
//! `baseline_margin` as its own carve-out.

use basso_execution::gateway::{BrokerGateway, BrokerPosition, GatewayError};
use basso_markets::instrument::Instrument;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct MarginSnapshot {
    pub recorded_at: DateTime<Utc>,
    pub total_margin_used: Decimal,
    pub available_cash: Decimal,
    pub collateral: Decimal,
    pub baseline_margin: Decimal,
    pub excluded_margin: Decimal,
    pub intraday_used: Decimal,
    pub total_budget: Decimal,
    pub utilisation_pct: Decimal,
    pub positions: Vec<BrokerPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailySummary {
    pub session_date: chrono::NaiveDate,
    pub snapshot_count: usize,
    pub peak_utilisation_pct: Decimal,
    pub closing_utilisation_pct: Decimal,
}

#[derive(Debug)]
struct Inner {
    baseline_margin: Option<Decimal>,
    excluded_margin: Decimal,
    snapshots: Vec<MarginSnapshot>,
}

/// Fetches funds/positions from the gateway on a schedule external to this
/// type (the `live` command drives the five-minute cadence); this type only
/// holds baseline/session state and computes each snapshot.
#[derive(Debug)]
pub struct MarginMonitor {
    total_budget: Decimal,
    universe: Vec<Instrument>,
    inner: RwLock<Inner>,
}

impl MarginMonitor {
    pub fn new(total_budget: Decimal, universe: Vec<Instrument>) -> Self {
        Self {
            total_budget,
            universe,
            inner: RwLock::new(Inner {
                baseline_margin: None,
                excluded_margin: Decimal::ZERO,
                snapshots: Vec::new(),
            }),
        }
    }

    /// Sets `excluded_margin` (margin from positions outside this session's
    /// universe, e.g. long-term holdings) — maintained separately from the
    /// baseline per the source's `excluded_margin` column.
    pub fn set_excluded_margin(&self, excluded_margin: Decimal) {
        self.inner.write().excluded_margin = excluded_margin;
    }

    /// Records `used_margin` as the session baseline. A no-op if already
    /// captured this session — baseline capture runs once, shortly after
    /// market open.
    pub fn capture_baseline(&self, used_margin: Decimal) {
        let mut inner = self.inner.write();
        if inner.baseline_margin.is_none() {
            inner.baseline_margin = Some(used_margin);
        }
    }

    /// Explicitly clears the baseline so the next `capture_baseline` call
    /// takes effect — capturing again is otherwise a no-op within the same
    /// session.
    pub fn clear_baseline(&self) {
        self.inner.write().baseline_margin = None;
    }

    pub fn baseline_margin(&self) -> Option<Decimal> {
        self.inner.read().baseline_margin
    }

    /// Fetches funds and positions, filters positions to this session's
    /// instrument universe, computes utilisation, and records the snapshot.
    pub async fn snapshot(
        &self,
        gateway: &dyn BrokerGateway,
        recorded_at: DateTime<Utc>,
    ) -> Result<MarginSnapshot, GatewayError> {
        let funds = gateway.funds().await?;
        let positions = gateway.positions().await?;

        let universe_symbols: Vec<&'static str> =
            self.universe.iter().map(Instrument::as_str).collect();
        let filtered: Vec<BrokerPosition> = positions
            .into_iter()
            .filter(|p| {
                let symbol_upper = p.symbol.to_uppercase();
                universe_symbols.iter().any(|s| symbol_upper.contains(s))
            })
            .collect();

        let (baseline, excluded) = {
            let inner = self.inner.read();
            (inner.baseline_margin.unwrap_or(Decimal::ZERO), inner.excluded_margin)
        };
        let intraday_used = funds.used_margin - baseline - excluded;
        let utilisation_pct = if self.total_budget > Decimal::ZERO {
            intraday_used / self.total_budget * Decimal::from(100)
        } else {
            Decimal::ZERO
        };

        let snapshot = MarginSnapshot {
            recorded_at,
            total_margin_used: funds.used_margin,
            available_cash: funds.available_cash,
            collateral: funds.collateral,
            baseline_margin: baseline,
            excluded_margin: excluded,
            intraday_used,
            total_budget: self.total_budget,
            utilisation_pct,
            positions: filtered,
        };

        self.inner.write().snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    pub fn latest_utilisation_pct(&self) -> Option<Decimal> {
        self.inner.read().snapshots.last().map(|s| s.utilisation_pct)
    }

    /// Generates the end-of-day summary from this session's recorded
    /// snapshots.
    pub fn end_of_day_summary(&self, session_date: chrono::NaiveDate) -> Option<DailySummary> {
        let inner = self.inner.read();
        if inner.snapshots.is_empty() {
            return None;
        }
        let peak = inner
            .snapshots
            .iter()
            .map(|s| s.utilisation_pct)
            .max()
            .unwrap_or(Decimal::ZERO);
        let closing = inner.snapshots.last().unwrap().utilisation_pct;

        Some(DailySummary {
            session_date,
            snapshot_count: inner.snapshots.len(),
            peak_utilisation_pct: peak,
            closing_utilisation_pct: closing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use basso_execution::gateway::{
        Funds, OrderId, OrderKind, OrderStatusReport, PlaceOrderAck,
    };
    use basso_markets::exchange::ExchangeId;
    use basso_markets::side::Side;
    use rust_decimal_macros::dec;

    #[derive(Debug)]
    struct StubGateway {
        used_margin: Decimal,
        positions: Vec<BrokerPosition>,
    }

    #[async_trait]
    impl BrokerGateway for StubGateway {
        async fn funds(&self) -> Result<Funds, GatewayError> {
            Ok(Funds {
                used_margin: self.used_margin,
                available_cash: dec!(1_000_000),
                collateral: dec!(0),
                m2m_realized: dec!(0),
                m2m_unrealized: dec!(0),
            })
        }

        async fn quote(&self, _symbol: &str, _exchange: ExchangeId) -> Result<basso_execution::gateway::Quote, GatewayError> {
            unimplemented!()
        }

        async fn positions(&self) -> Result<Vec<BrokerPosition>, GatewayError> {
            Ok(self.positions.clone())
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
            unimplemented!()
        }

        async fn order_status(&self, _id: OrderId) -> Result<OrderStatusReport, GatewayError> {
            unimplemented!()
        }

        async fn modify_order(&self, _id: OrderId, _new_price: Decimal) -> Result<(), GatewayError> {
            unimplemented!()
        }

        async fn cancel_order(&self, _id: OrderId) -> Result<(), GatewayError> {
            unimplemented!()
        }
    }

    fn now() -> DateTime<Utc> {
        chrono::TimeZone::timestamp_opt(&Utc, 1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn baseline_capture_is_once_per_session() {
        let monitor = MarginMonitor::new(dec!(1_000_000), vec![Instrument::Nifty]);
        monitor.capture_baseline(dec!(200_000));
        monitor.capture_baseline(dec!(999_999));
        assert_eq!(monitor.baseline_margin(), Some(dec!(200_000)));

        monitor.clear_baseline();
        monitor.capture_baseline(dec!(999_999));
        assert_eq!(monitor.baseline_margin(), Some(dec!(999_999)));
    }

    #[tokio::test]
    async fn snapshot_filters_positions_to_universe_and_computes_utilisation() {
        let monitor = MarginMonitor::new(dec!(1_000_000), vec![Instrument::Nifty]);
        monitor.capture_baseline(dec!(100_000));

        let gateway = StubGateway {
            used_margin: dec!(500_000),
            positions: vec![
                BrokerPosition {
                    symbol: "NIFTY25JAN25000CE".into(),
                    exchange: ExchangeId::Nse,
                    quantity: -75,
                    average_price: dec!(120),
                },
                BrokerPosition {
                    symbol: "GOLDM25FEBFUT".into(),
                    exchange: ExchangeId::Mcx,
                    quantity: 100,
                    average_price: dec!(60000),
                },
            ],
        };

        let snapshot = monitor.snapshot(&gateway, now()).await.unwrap();
        assert_eq!(snapshot.positions.len(), 1);
        assert_eq!(snapshot.intraday_used, dec!(400_000));
        assert_eq!(snapshot.utilisation_pct, dec!(40));
        assert_eq!(monitor.latest_utilisation_pct(), Some(dec!(40)));
    }
}
