//! Margin-constants table and hedge configuration.
//!
//! Empirical per-basket margin requirements by `(index, expiry_type,
//! has_hedge)`, and the thresholds/timing/selection/safety parameters the
//! orchestrator reads every tick.

use basso_markets::instrument::Instrument;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ExpiryType {
    ZeroDte,
    OneDte,
    TwoDte,
}

/// One row of the empirical per-basket margin table.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MarginRow {
    index: Instrument,
    expiry: ExpiryType,
    without_hedge: Decimal,
    with_hedge: Decimal,
}

/// Empirical per-basket margin requirements, SENSEX only ever trades 0DTE (Thursday
/// expiry); NIFTY's 1DTE/2DTE rows are used on the days preceding its
/// Tuesday expiry.
const MARGIN_TABLE: &[MarginRow] = &[
    MarginRow {
        index: Instrument::Sensex,
        expiry: ExpiryType::ZeroDte,
        without_hedge: dec!(366666.67),
        with_hedge: dec!(160000.00),
    },
    MarginRow {
        index: Instrument::Nifty,
        expiry: ExpiryType::ZeroDte,
        without_hedge: dec!(433333.33),
        with_hedge: dec!(186666.67),
    },
    MarginRow {
        index: Instrument::Nifty,
        expiry: ExpiryType::OneDte,
        without_hedge: dec!(320000.00),
        with_hedge: dec!(140000.00),
    },
    MarginRow {
        index: Instrument::Nifty,
        expiry: ExpiryType::TwoDte,
        without_hedge: dec!(320000.00),
        with_hedge: dec!(140000.00),
    },
];

/// Whether a table lookup used the expiry type asked for, or fell back to
/// the index's 1DTE row (Open Question 1: "made loud, not silent" — the
/// caller must log and notify on `Fallback`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginLookup {
    Exact,
    Fallback { requested: ExpiryType },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginLookupResult {
    pub per_basket: Decimal,
    pub lookup: MarginLookup,
}

/// Per-basket margin for `(index, expiry, has_hedge)`. Any `index` other
/// than `Nifty`/`Sensex` has no row and is a caller bug, not a runtime
/// fallback case — the hedge orchestrator never calls this for any other
/// instrument.
///
/// Any `(index, expiry)` combination absent from the table — e.g. SENSEX's
/// 1DTE/2DTE, which it never trades — falls back to the index's 1DTE row.
pub fn margin_per_basket(index: Instrument, expiry: ExpiryType, has_hedge: bool) -> MarginLookupResult {
    if let Some(row) = MARGIN_TABLE.iter().find(|r| r.index == index && r.expiry == expiry) {
        return MarginLookupResult {
            per_basket: if has_hedge { row.with_hedge } else { row.without_hedge },
            lookup: MarginLookup::Exact,
        };
    }

    // Prefer the index's own 1DTE row; SENSEX only ever carries a ZeroDte
    // row (it has no 1DTE/2DTE expiries), so fall back further to any row
    // for this index rather than panicking.
    let fallback_row = MARGIN_TABLE
        .iter()
        .find(|r| r.index == index && r.expiry == ExpiryType::OneDte)
        .or_else(|| MARGIN_TABLE.iter().find(|r| r.index == index))
        .expect("hedge orchestrator only looks up margin for indices carrying at least one table row");

    MarginLookupResult {
        per_basket: if has_hedge {
            fallback_row.with_hedge
        } else {
            fallback_row.without_hedge
        },
        lookup: MarginLookup::Fallback { requested: expiry },
    }
}

/// Estimated margin reduction from adding one hedge pair (CE + PE), for
/// `num_baskets` baskets.
pub fn hedge_benefit(index: Instrument, expiry: ExpiryType, num_baskets: u32) -> Decimal {
    let without = margin_per_basket(index, expiry, false).per_basket;
    let with = margin_per_basket(index, expiry, true).per_basket;
    (without - with) * Decimal::from(num_baskets)
}

/// Lots-per-basket for the two index instruments the orchestrator straddles
/// (distinct from `Instrument::lot_size`, which is quantity-per-lot).
pub fn lots_per_basket(index: Instrument) -> u32 {
    match index {
        Instrument::Sensex => 10,
        _ => 1,
    }
}

/// OTM-distance band (in strike points from spot) eligible for hedging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtmBand {
    pub min: Decimal,
    pub max: Decimal,
}

pub fn otm_band(index: Instrument) -> OtmBand {
    match index {
        Instrument::Sensex => OtmBand {
            min: dec!(500),
            max: dec!(2500),
        },
        _ => OtmBand {
            min: dec!(200),
            max: dec!(1000),
        },
    }
}

/// Thresholds, timing, selection, and safety parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HedgeConfig {
    pub entry_trigger_pct: Decimal,
    pub entry_target_pct: Decimal,
    pub exit_trigger_pct: Decimal,
    pub lookahead_minutes: i64,
    pub exit_buffer_minutes: i64,
    pub min_premium: Decimal,
    pub max_premium: Decimal,
    pub max_hedge_cost_per_day: Decimal,
    pub cooldown: Duration,
    pub min_exit_value: Decimal,
    pub limit_order_buffer_pct: Decimal,
    pub order_timeout: Duration,
}

impl Default for HedgeConfig {
    fn default() -> Self {
        HedgeConfig {
            entry_trigger_pct: dec!(95),
            entry_target_pct: dec!(85),
            exit_trigger_pct: dec!(70),
            lookahead_minutes: 5,
            exit_buffer_minutes: 15,
            min_premium: dec!(2),
            max_premium: dec!(6),
            max_hedge_cost_per_day: dec!(50000),
            cooldown: Duration::from_secs(120),
            min_exit_value: dec!(0.50),
            limit_order_buffer_pct: dec!(0.10),
            order_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_lookup_returns_table_value_for_sensex_zero_dte() {
        let result = margin_per_basket(Instrument::Sensex, ExpiryType::ZeroDte, false);
        assert_eq!(result.per_basket, dec!(366666.67));
        assert_eq!(result.lookup, MarginLookup::Exact);
    }

    #[test]
    fn sensex_one_dte_lookup_falls_back_to_its_only_row_without_panicking() {
        let result = margin_per_basket(Instrument::Sensex, ExpiryType::OneDte, false);
        assert_eq!(result.per_basket, dec!(366666.67));
        assert_eq!(result.lookup, MarginLookup::Fallback { requested: ExpiryType::OneDte });
    }

    #[test]
    fn hedge_benefit_is_difference_scaled_by_baskets() {
        let benefit = hedge_benefit(Instrument::Nifty, ExpiryType::ZeroDte, 2);
        assert_eq!(benefit, (dec!(433333.33) - dec!(186666.67)) * dec!(2));
    }

    #[test]
    fn otm_band_differs_by_index() {
        assert_eq!(otm_band(Instrument::Nifty).max, dec!(1000));
        assert_eq!(otm_band(Instrument::Sensex).max, dec!(2500));
    }
}
