//! `SystemConfig`: the single configuration aggregate for a full trading
//! system, loaded once at process start rather than reached for as a
//! global singleton.
//!
//! TOML-plus-env-override, scoped to this platform's closed instrument set
//! and component defaults.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for a full `basso` process.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SystemConfig {
    pub initial_capital: Decimal,
    pub duplicate_detector: DuplicateDetectorConfig,
    pub validator: ValidatorConfig,
    pub portfolio: PortfolioConfig,
    pub margin: MarginConfig,
    pub hedge: HedgeConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(10_000_000),
            duplicate_detector: DuplicateDetectorConfig::default(),
            validator: ValidatorConfig::default(),
            portfolio: PortfolioConfig::default(),
            margin: MarginConfig::default(),
            hedge: HedgeConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Parses a TOML configuration file, then applies `BASSO_`-prefixed
    /// environment-variable overrides — any config file key may be
    /// overridden via this prefix convention.
    ///
    /// Only a small, explicitly enumerated set of keys are override-able —
    /// the full nested config is not auto-derived from env vars, favouring
    /// explicit, typed configuration over reflection-based binding.
    pub fn load(toml_source: &str) -> Result<Self, ConfigError> {
        let mut config: SystemConfig =
            toml::from_str(toml_source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("BASSO_INITIAL_CAPITAL") {
            if let Ok(parsed) = value.parse::<Decimal>() {
                self.initial_capital = parsed;
            }
        }
        if let Ok(value) = std::env::var("BASSO_DUPLICATE_WINDOW_SECONDS") {
            if let Ok(parsed) = value.parse::<u64>() {
                self.duplicate_detector.window = Duration::from_secs(parsed);
            }
        }
        if let Ok(value) = std::env::var("BASSO_MAX_HEDGE_COST_PER_DAY") {
            if let Ok(parsed) = value.parse::<Decimal>() {
                self.hedge.max_hedge_cost_per_day = parsed;
            }
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Capacity ~1000, default 60s window.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DuplicateDetectorConfig {
    #[serde(with = "duration_secs")]
    pub window: Duration,
    pub capacity: usize,
    pub prune_every_n_checks: u32,
}

impl Default for DuplicateDetectorConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            capacity: 1000,
            prune_every_n_checks: 50,
        }
    }
}

/// Defaults for the two-stage signal-validation policy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValidatorConfig {
    pub max_divergence_base_entry_percent: Decimal,
    pub max_divergence_pyramid_percent: Decimal,
    pub max_divergence_exit_percent: Decimal,
    pub divergence_warning_threshold_percent: Decimal,
    pub max_risk_increase_pyramid_percent: Decimal,
    pub max_risk_increase_base_percent: Decimal,
    pub min_lots_after_adjustment: u32,
    pub reject_chase_for_pyramids: bool,
    pub age_warning_seconds: u64,
    pub age_elevated_seconds: u64,
    pub age_stale_seconds: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_divergence_base_entry_percent: dec!(2.0),
            max_divergence_pyramid_percent: dec!(1.0),
            max_divergence_exit_percent: dec!(1.0),
            divergence_warning_threshold_percent: dec!(0.5),
            max_risk_increase_pyramid_percent: dec!(20.0),
            max_risk_increase_base_percent: dec!(50.0),
            min_lots_after_adjustment: 1,
            reject_chase_for_pyramids: true,
            age_warning_seconds: 10,
            age_elevated_seconds: 30,
            age_stale_seconds: 60,
        }
    }
}

/// `PortfolioConfig` defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PortfolioConfig {
    pub max_portfolio_risk_percent: Decimal,
    pub max_portfolio_vol_percent: Decimal,
    pub max_margin_utilization_percent: Decimal,
    pub pyramid_risk_block_percent: Decimal,
    pub pyramid_vol_block_percent: Decimal,
    pub blended_unrealized_weight: Decimal,
    pub atr_pyramid_spacing: Decimal,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            max_portfolio_risk_percent: dec!(15.0),
            max_portfolio_vol_percent: dec!(5.0),
            max_margin_utilization_percent: dec!(60.0),
            pyramid_risk_block_percent: dec!(12.0),
            pyramid_vol_block_percent: dec!(4.0),
            blended_unrealized_weight: dec!(0.5),
            atr_pyramid_spacing: dec!(0.5),
        }
    }
}

/// Margin-monitor defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarginConfig {
    #[serde(with = "duration_secs")]
    pub snapshot_interval: Duration,
    /// Intraday margin budget `MarginMonitor::snapshot` computes utilisation
    /// against. Distinct from `initial_capital`: this is the margin the
    /// operator has set aside for the day's baskets, not the account's
    /// total equity.
    pub total_budget: Decimal,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: Duration::from_secs(5 * 60),
            total_budget: dec!(5_000_000),
        }
    }
}

/// Hedge-orchestrator defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HedgeConfig {
    pub entry_trigger_percent: Decimal,
    pub entry_target_percent: Decimal,
    pub exit_trigger_percent: Decimal,
    pub lookahead_minutes: i64,
    pub exit_buffer_minutes: i64,
    pub min_premium: Decimal,
    pub max_premium: Decimal,
    pub max_hedge_cost_per_day: Decimal,
    pub cooldown_seconds: u64,
    pub min_exit_value: Decimal,
    /// Cadence of the orchestrator's project → decide → select → execute
    /// tick; distinct from `margin.snapshot_interval` since a hedge
    /// decision needs a fresher utilisation read than the end-of-day
    /// summary does.
    pub tick_interval_seconds: u64,
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            entry_trigger_percent: dec!(95),
            entry_target_percent: dec!(85),
            exit_trigger_percent: dec!(70),
            lookahead_minutes: 5,
            exit_buffer_minutes: 15,
            min_premium: dec!(2),
            max_premium: dec!(6),
            max_hedge_cost_per_day: dec!(50_000),
            cooldown_seconds: 120,
            min_exit_value: dec!(0.50),
            tick_interval_seconds: 60,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = SystemConfig::default();
        assert_eq!(config.portfolio.max_portfolio_risk_percent, dec!(15.0));
        assert_eq!(config.hedge.entry_trigger_percent, dec!(95));
        assert_eq!(config.duplicate_detector.window, Duration::from_secs(60));
    }

    #[test]
    fn toml_round_trips_with_overrides() {
        let toml_source = r#"
            initial_capital = "5000000"

            [duplicate_detector]
            window = 30
            capacity = 500
            prune_every_n_checks = 10

            [validator]
            max_divergence_base_entry_percent = "2.0"
            max_divergence_pyramid_percent = "1.0"
            max_divergence_exit_percent = "1.0"
            divergence_warning_threshold_percent = "0.5"
            max_risk_increase_pyramid_percent = "20.0"
            max_risk_increase_base_percent = "50.0"
            min_lots_after_adjustment = 1
            reject_chase_for_pyramids = true
            age_warning_seconds = 10
            age_elevated_seconds = 30
            age_stale_seconds = 60

            [portfolio]
            max_portfolio_risk_percent = "15.0"
            max_portfolio_vol_percent = "5.0"
            max_margin_utilization_percent = "60.0"
            pyramid_risk_block_percent = "12.0"
            pyramid_vol_block_percent = "4.0"
            blended_unrealized_weight = "0.5"
            atr_pyramid_spacing = "0.5"

            [margin]
            snapshot_interval = 300
            total_budget = "5000000"

            [hedge]
            entry_trigger_percent = "95"
            entry_target_percent = "85"
            exit_trigger_percent = "70"
            lookahead_minutes = 5
            exit_buffer_minutes = 15
            min_premium = "2"
            max_premium = "6"
            max_hedge_cost_per_day = "50000"
            cooldown_seconds = 120
            min_exit_value = "0.50"
            tick_interval_seconds = 60
        "#;

        let config = SystemConfig::load(toml_source).unwrap();
        assert_eq!(config.initial_capital, dec!(5_000_000));
        assert_eq!(config.duplicate_detector.capacity, 500);
    }
}
