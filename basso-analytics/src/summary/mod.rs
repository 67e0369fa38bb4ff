//! Out-of-scope rollup shapes: `daily_summary`.
//!
//! One summary struct plus an incremental generator that tracks session
//! start/end and is queried for a finished report, scoped down to what
//! the hedge/margin side of this platform actually reports: no per-asset or
//! per-instrument tear sheets, and no backtesting-framework generality or
//! tick-level P&L accounting.

use chrono::{DateTime, Utc};
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::metric::{profit_factor::ProfitFactor, win_rate::WinRate};

/// End-of-day rollup of the session's hedge activity, generated by the
/// `basso-hedge` EOD job and handed to whatever out-of-scope sink a
/// deployment wires in: an end-of-day job generates a daily summary from
/// the session's margin snapshots.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct DailySummary {
    pub session_date: DateTime<Utc>,
    pub peak_utilisation_pct: Decimal,
    pub closing_utilisation_pct: Decimal,
    pub hedge_spend: Decimal,
    pub hedges_bought: u32,
    pub hedges_sold: u32,
    pub fallback_lookups: u32,
}

/// End-of-session rollup of the signal engine's trading activity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct TradingDaySummary {
    pub session_date: DateTime<Utc>,
    pub signals_received: u32,
    pub signals_duplicate: u32,
    pub signals_rejected: u32,
    pub signals_executed: u32,
    pub realized_pnl: Decimal,
    pub win_rate: Option<WinRate>,
    pub profit_factor: Option<ProfitFactor>,
}

/// Incrementally accumulates a [`TradingDaySummary`] over a session.
///
/// Callers push one closed-trade outcome at a time and call
/// [`TradingDaySummaryGenerator::generate`] once at end of day.
#[derive(Debug, Clone)]
pub struct TradingDaySummaryGenerator {
    session_date: DateTime<Utc>,
    signals_received: u32,
    signals_duplicate: u32,
    signals_rejected: u32,
    signals_executed: u32,
    realized_pnl: Decimal,
    wins: Decimal,
    closed_trades: Decimal,
    gross_profit: Decimal,
    gross_loss: Decimal,
}

impl TradingDaySummaryGenerator {
    pub fn init(session_date: DateTime<Utc>) -> Self {
        Self {
            session_date,
            signals_received: 0,
            signals_duplicate: 0,
            signals_rejected: 0,
            signals_executed: 0,
            realized_pnl: Decimal::ZERO,
            wins: Decimal::ZERO,
            closed_trades: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
        }
    }

    pub fn record_signal_received(&mut self) {
        self.signals_received += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.signals_duplicate += 1;
    }

    pub fn record_rejected(&mut self) {
        self.signals_rejected += 1;
    }

    pub fn record_executed(&mut self) {
        self.signals_executed += 1;
    }

    /// Records one closed trade's realized P&L for the win-rate/profit-factor
    /// rollup.
    pub fn record_closed_trade(&mut self, realized_pnl: Decimal) {
        self.realized_pnl += realized_pnl;
        self.closed_trades += Decimal::ONE;
        if realized_pnl > Decimal::ZERO {
            self.wins += Decimal::ONE;
            self.gross_profit += realized_pnl;
        } else {
            self.gross_loss += realized_pnl.abs();
        }
    }

    pub fn generate(&self) -> TradingDaySummary {
        TradingDaySummary {
            session_date: self.session_date,
            signals_received: self.signals_received,
            signals_duplicate: self.signals_duplicate,
            signals_rejected: self.signals_rejected,
            signals_executed: self.signals_executed,
            realized_pnl: self.realized_pnl,
            win_rate: WinRate::calculate(self.wins, self.closed_trades),
            profit_factor: ProfitFactor::calculate(self.gross_profit, self.gross_loss),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn generator_rolls_up_duplicate_and_win_counts() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 15, 0).unwrap();
        let mut gen = TradingDaySummaryGenerator::init(start);
        gen.record_signal_received();
        gen.record_executed();
        gen.record_closed_trade(dec!(5000));
        gen.record_signal_received();
        gen.record_duplicate();
        gen.record_signal_received();
        gen.record_rejected();

        let summary = gen.generate();
        assert_eq!(summary.signals_received, 3);
        assert_eq!(summary.signals_duplicate, 1);
        assert_eq!(summary.signals_rejected, 1);
        assert_eq!(summary.signals_executed, 1);
        assert_eq!(summary.realized_pnl, dec!(5000));
        assert_eq!(summary.win_rate.unwrap().value, Decimal::ONE);
    }
}
