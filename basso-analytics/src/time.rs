//! Time intervals used to annualise or rebase periodic metrics.
//!
//! `Daily`/`Annual252`/`Annual365` supply the trait and the three concrete
//! markers a metric can be expressed over or rescaled to.

use chrono::TimeDelta;

/// A named span of time a metric can be expressed over or rescaled to.
pub trait TimeInterval {
    /// The wall-clock duration this interval represents.
    fn interval(&self) -> TimeDelta;
}

impl TimeInterval for TimeDelta {
    fn interval(&self) -> TimeDelta {
        *self
    }
}

/// One trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Daily;

impl TimeInterval for Daily {
    fn interval(&self) -> TimeDelta {
        TimeDelta::days(1)
    }
}

/// 252 trading days (NSE/MCX business-day convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Annual252;

impl TimeInterval for Annual252 {
    fn interval(&self) -> TimeDelta {
        TimeDelta::days(252)
    }
}

/// 365 calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Annual365;

impl TimeInterval for Annual365 {
    fn interval(&self) -> TimeDelta {
        TimeDelta::days(365)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_is_one_day() {
        assert_eq!(Daily.interval(), TimeDelta::days(1));
    }

    #[test]
    fn annual_252_vs_365() {
        assert!(Annual252.interval() < Annual365.interval());
    }
}
