//! Financial metrics for grading a session or backtest run.
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

/// Gross profit over gross loss.
pub mod profit_factor;

/// Excess return per unit of return volatility.
pub mod sharpe;

/// Fraction of winning trades.
pub mod win_rate;
