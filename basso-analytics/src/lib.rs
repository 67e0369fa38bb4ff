//! # Analytics
//!
//! Out-of-scope collaborator interface: analytics rollups are external to
//! this platform's core engineering effort. This crate carries the
//! financial-metric primitives (Sharpe, Win Rate, Profit Factor) and the
//! `DailySummary` shape for the `daily_summary` persisted table,
//! without a concrete rollup pipeline: the hedge orchestrator and margin
//! monitor hand `DailySummary`-shaped records to whatever sink a deployment
//! wires in, and computing/distributing them over a real dataset is outside
//! this repository's core.
//!
//! ## Module structure
//!
//! ```text
//! analytics/
//!  ├─ metric/   # Sharpe, Win Rate, Profit Factor
//!  ├─ summary/  # DailySummary, HedgeDaySummary
//!  └─ time.rs   # TimeInterval definitions used by metric::sharpe
//! ```
//!
//! ## Example
//!
//! ```rust
//! use basso_analytics::metric::sharpe::SharpeRatio;
//! use basso_analytics::time::Daily;
//! use rust_decimal_macros::dec;
//!
//! let risk_free = dec!(0.0015); // 0.15%
//! let mean_ret = dec!(0.0025); // 0.25%
//! let std_dev = dec!(0.0200); // 2.00%
//!
//! let sharpe = SharpeRatio::calculate(risk_free, mean_ret, std_dev, Daily);
//! assert_eq!(sharpe.value, dec!(0.05));
//! ```

/// Financial metrics used to grade a session or backtest run.
pub mod metric;

/// `DailySummary`/`HedgeDaySummary` shapes for the out-of-scope rollup sink.
pub mod summary;

/// Time-interval definitions used by [`metric::sharpe`].
pub mod time;

use chrono::{DateTime, Utc};

/// Trait for types that carry a timestamp.
pub trait Timed {
    /// Returns the timestamp of this item.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// A value paired with the instant it was observed.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedValue<T> {
    pub value: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> TimedValue<T> {
    pub fn new(value: T, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }
}

impl<T> Timed for TimedValue<T> {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
