//! The singleton portfolio aggregate.
//!
//! A single `parking_lot::RwLock` guards the whole aggregate; mutators take
//! `&self` and hold the write lock for the duration of the mutation so that
//! an admission decision can be re-validated immediately before commit
//! (compare-and-set by `version`).

use basso_markets::instrument::{InstrumentConfig, Limiter};
use basso_markets::position::{Position, PositionId, PositionStatus};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use thiserror::Error;

/// Hard cap on `total_risk_percent` after any admission.
pub const MAX_PORTFOLIO_RISK_PERCENT: Decimal = dec!(15);

/// How `equity` is derived from `closed_equity` and open unrealized P&L.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquityMode {
    Closed,
    Open,
    Blended { unrealized_weight: Decimal },
}

impl Default for EquityMode {
    fn default() -> Self {
        EquityMode::Blended {
            unrealized_weight: dec!(0.5),
        }
    }
}

/// A read-only view of the aggregate at a point in time.
#[derive(Debug, Clone)]
pub struct PortfolioSnapshot {
    pub version: u64,
    pub closed_equity: Decimal,
    pub equity: Decimal,
    pub total_risk_amount: Decimal,
    pub total_risk_percent: Decimal,
    pub total_vol_amount: Decimal,
    pub total_vol_percent: Decimal,
    pub margin_used: Decimal,
    pub positions: HashMap<PositionId, Position>,
}

#[derive(Debug, Error, PartialEq)]
pub enum AdmissionError {
    #[error("admission would push total_risk_percent to {projected}%, above the {cap}% cap")]
    RiskCapExceeded { projected: Decimal, cap: Decimal },
}

#[derive(Debug)]
struct Inner {
    version: u64,
    initial_capital: Decimal,
    closed_equity: Decimal,
    equity_mode: EquityMode,
    margin_used: Decimal,
    positions: HashMap<PositionId, Position>,
}

impl Inner {
    fn equity(&self) -> Decimal {
        let unrealized: Decimal = self
            .positions
            .values()
            .filter(|p| p.is_open())
            .map(|p| p.unrealized_pnl)
            .sum();
        match self.equity_mode {
            EquityMode::Closed => self.closed_equity,
            EquityMode::Open => self.closed_equity + unrealized,
            EquityMode::Blended { unrealized_weight } => {
                self.closed_equity + unrealized_weight * unrealized
            }
        }
    }

    fn total_risk_amount(&self) -> Decimal {
        self.positions
            .values()
            .filter(|p| p.is_open())
            .map(|p| (p.entry_price - p.current_stop).max(Decimal::ZERO) * Decimal::from(p.quantity))
            .sum()
    }

    fn total_risk_percent(&self) -> Decimal {
        percent_of(self.total_risk_amount(), self.equity())
    }

    /// Sum over open positions of `atr_at_entry * point_value * quantity`,
    /// the same per-unit volatility cost `PositionSizer::lot_V` sizes
    /// against.
    /// Instruments this platform doesn't size (no `InstrumentConfig`) are
    /// excluded rather than panicking — they cannot occur via
    /// `SignalEngine::process`'s own sizing step, which rejects any signal
    /// for an unconfigured instrument before a position is ever admitted.
    fn total_vol_amount(&self) -> Decimal {
        self.positions
            .values()
            .filter(|p| p.is_open())
            .filter_map(|p| {
                let config = InstrumentConfig::for_instrument(p.instrument)?;
                Some(p.atr_at_entry * config.point_value * Decimal::from(p.quantity))
            })
            .sum()
    }

    fn total_vol_percent(&self) -> Decimal {
        percent_of(self.total_vol_amount(), self.equity())
    }

    fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            version: self.version,
            closed_equity: self.closed_equity,
            equity: self.equity(),
            total_risk_amount: self.total_risk_amount(),
            total_risk_percent: self.total_risk_percent(),
            total_vol_amount: self.total_vol_amount(),
            total_vol_percent: self.total_vol_percent(),
            margin_used: self.margin_used,
            positions: self.positions.clone(),
        }
    }
}

fn percent_of(amount: Decimal, base: Decimal) -> Decimal {
    if base.is_zero() {
        Decimal::ZERO
    } else {
        amount / base * dec!(100)
    }
}

/// The singleton portfolio aggregate. Clone-and-share via `Arc` at the
/// `basso-core` engine boundary; this type itself is already `Send + Sync`.
#[derive(Debug)]
pub struct PortfolioState {
    inner: RwLock<Inner>,
}

impl PortfolioState {
    pub fn new(initial_capital: Decimal, equity_mode: EquityMode) -> Self {
        Self {
            inner: RwLock::new(Inner {
                version: 0,
                initial_capital,
                closed_equity: initial_capital,
                equity_mode,
                margin_used: Decimal::ZERO,
                positions: HashMap::new(),
            }),
        }
    }

    pub fn current_state(&self) -> PortfolioSnapshot {
        self.inner.read().snapshot()
    }

    /// Admits `position` unless doing so would push `total_risk_percent`
    /// above [`MAX_PORTFOLIO_RISK_PERCENT`]. The check and the insert happen
    /// under the same write-lock acquisition so no concurrent admission can
    /// slip in between.
    pub fn add_position(&self, position: Position) -> Result<PortfolioSnapshot, AdmissionError> {
        let mut inner = self.inner.write();

        let added_risk =
            (position.entry_price - position.initial_stop).max(Decimal::ZERO) * Decimal::from(position.quantity);
        let projected_amount = inner.total_risk_amount() + added_risk;
        let projected_percent = percent_of(projected_amount, inner.equity());

        if projected_percent > MAX_PORTFOLIO_RISK_PERCENT {
            return Err(AdmissionError::RiskCapExceeded {
                projected: projected_percent,
                cap: MAX_PORTFOLIO_RISK_PERCENT,
            });
        }

        inner.positions.insert(position.id, position);
        inner.version += 1;
        Ok(inner.snapshot())
    }

    /// Closing always admits.
    pub fn close_position(&self, id: PositionId, realized_pnl: Decimal) -> PortfolioSnapshot {
        let mut inner = self.inner.write();
        if let Some(position) = inner.positions.get_mut(&id) {
            position.status = PositionStatus::Closed;
            position.realized_pnl = realized_pnl;
            inner.closed_equity += realized_pnl;
        }
        inner.version += 1;
        inner.snapshot()
    }

    pub fn update_unrealized(&self, id: PositionId, unrealized_pnl: Decimal) -> PortfolioSnapshot {
        let mut inner = self.inner.write();
        if let Some(position) = inner.positions.get_mut(&id) {
            position.unrealized_pnl = unrealized_pnl;
        }
        inner.version += 1;
        inner.snapshot()
    }

    pub fn update_stop(
        &self,
        id: PositionId,
        current_stop: Decimal,
        highest_close: Decimal,
    ) -> PortfolioSnapshot {
        let mut inner = self.inner.write();
        if let Some(position) = inner.positions.get_mut(&id) {
            position.current_stop = current_stop;
            position.highest_close = highest_close;
        }
        inner.version += 1;
        inner.snapshot()
    }

    /// Marks a synthetic position whose rollback leg failed to close, so it
    /// survives admission/closing bookkeeping but is flagged for the next
    /// boot-time integrity check.
    pub fn mark_requires_attention(&self, id: PositionId) {
        let mut inner = self.inner.write();
        if let Some(position) = inner.positions.get_mut(&id) {
            position.status = PositionStatus::RequiresAttention;
        }
        inner.version += 1;
    }
}

/// Limiter bookkeeping helper re-exported for callers that need to record
/// which constraint bound a just-admitted position alongside the portfolio
/// mutation (kept separate from `PortfolioState` since `Limiter` is set once
/// at entry, never revisited).
pub fn limiter_label(limiter: Limiter) -> &'static str {
    match limiter {
        Limiter::Risk => "RISK",
        Limiter::Vol => "VOL",
        Limiter::Margin => "MARGIN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basso_markets::instrument::Instrument;
    use chrono::{TimeZone, Utc};

    fn position(id: u64, entry: Decimal, stop: Decimal, qty: u32) -> Position {
        Position::new(
            PositionId(id),
            Instrument::BankNifty,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            entry,
            1,
            qty,
            stop,
            dec!(350),
            Limiter::Risk,
        )
    }

    #[test]
    fn admission_is_rejected_above_the_risk_cap() {
        let portfolio = PortfolioState::new(dec!(1_000_000), EquityMode::Closed);
        // risk-per-unit 525 * qty 2000 = 1,050,000 >> 15% of 1,000,000.
        let err = portfolio
            .add_position(position(1, dec!(52000), dec!(51475), 2000))
            .unwrap_err();
        assert!(matches!(err, AdmissionError::RiskCapExceeded { .. }));
    }

    #[test]
    fn admission_within_cap_increments_version() {
        let portfolio = PortfolioState::new(dec!(10_000_000), EquityMode::Closed);
        let before = portfolio.current_state().version;
        portfolio
            .add_position(position(1, dec!(52000), dec!(51475), 70))
            .unwrap();
        assert_eq!(portfolio.current_state().version, before + 1);
    }

    #[test]
    fn closing_always_admits_and_rolls_realized_pnl_into_closed_equity() {
        let portfolio = PortfolioState::new(dec!(10_000_000), EquityMode::Closed);
        portfolio
            .add_position(position(1, dec!(52000), dec!(51475), 70))
            .unwrap();
        let before_equity = portfolio.current_state().closed_equity;
        let snapshot = portfolio.close_position(PositionId(1), dec!(5000));
        assert_eq!(snapshot.closed_equity, before_equity + dec!(5000));
    }

    #[test]
    fn total_vol_percent_is_derived_from_open_positions_atr_exposure() {
        let portfolio = PortfolioState::new(dec!(10_000_000), EquityMode::Closed);
        portfolio
            .add_position(position(1, dec!(52000), dec!(51475), 70))
            .unwrap();
        // Bank Nifty point_value = 35, atr = 350 (fixed by the `position` test
        // helper), quantity 70 -> vol_amount = 350 * 35 * 70 = 857,500.
        let snapshot = portfolio.current_state();
        assert_eq!(snapshot.total_vol_amount, dec!(857_500));
        assert_eq!(
            snapshot.total_vol_percent,
            percent_of(dec!(857_500), dec!(10_000_000))
        );

        portfolio.close_position(PositionId(1), dec!(0));
        assert_eq!(portfolio.current_state().total_vol_amount, Decimal::ZERO);
    }
}
