//! Executed exposures.

use crate::instrument::Instrument;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct PositionId(pub u64);

/// Lifecycle state of a position.
///
/// `RequiresAttention` is the distinguished state a failed synthetic
/// rollback leaves behind: `status` stays `Open` but is tagged, so
/// the next session's boot-time integrity check can surface it rather than
/// silently treating the position as healthy.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum PositionStatus {
    Open,
    Closed,
    Rolling,
    RequiresAttention,
}

/// An executed exposure in one instrument.
///
/// Owned exclusively by `PortfolioState`; holds no back-reference to its
/// owner (Design Note: "cyclic lifetimes between PortfolioState and
/// Position"). Created only by `OrderExecutor` on fill, closed only by
/// `OrderExecutor` on exit; `StopManager` may only mutate `current_stop` and
/// `highest_close`, and `MarginMonitor` only `unrealized_pnl` — enforced by
/// routing those updates through `PortfolioState`'s mutators rather than
/// exposing `&mut Position` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub instrument: Instrument,
    pub entry_instant: DateTime<Utc>,
    pub entry_price: Decimal,
    pub lots: u32,
    pub quantity: u32,
    pub initial_stop: Decimal,
    pub current_stop: Decimal,
    pub highest_close: Decimal,
    pub atr_at_entry: Decimal,
    pub status: PositionStatus,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub limiter_at_entry: crate::instrument::Limiter,
    pub expiry: Option<DateTime<Utc>>,
    pub contract_month: Option<String>,
}

impl Position {
    pub fn new(
        id: PositionId,
        instrument: Instrument,
        entry_instant: DateTime<Utc>,
        entry_price: Decimal,
        lots: u32,
        quantity: u32,
        initial_stop: Decimal,
        atr_at_entry: Decimal,
        limiter_at_entry: crate::instrument::Limiter,
    ) -> Self {
        Self {
            id,
            instrument,
            entry_instant,
            entry_price,
            lots,
            quantity,
            initial_stop,
            current_stop: initial_stop,
            highest_close: entry_price,
            atr_at_entry,
            status: PositionStatus::Open,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            limiter_at_entry,
            expiry: None,
            contract_month: None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, PositionStatus::Open | PositionStatus::RequiresAttention)
    }

    /// `entry_price - initial_stop`, the per-unit initial risk ("1 R").
    pub fn initial_risk(&self) -> Decimal {
        self.entry_price - self.initial_stop
    }

    /// Rollover execution semantics remain an open question: whether a
    /// rollover is a market-close + market-open pair or a
    /// combined spread order) are not conclusively determined. This only
    /// reports whether a rollover is due; `basso-hedge`/`basso-execution`
    /// must not act on it without product confirmation.
    pub fn needs_rollover(&self, _now: DateTime<Utc>) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn new_position_seeds_stop_and_highest_close_from_entry() {
        let pos = Position::new(
            PositionId(1),
            Instrument::BankNifty,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            dec!(52000),
            2,
            70,
            dec!(51475),
            dec!(350),
            crate::instrument::Limiter::Risk,
        );
        assert_eq!(pos.current_stop, dec!(51475));
        assert_eq!(pos.highest_close, dec!(52000));
        assert_eq!(pos.initial_risk(), dec!(525));
        assert!(pos.is_open());
    }
}
