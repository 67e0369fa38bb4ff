//! Pyramid admission gate.
//!
//! Three independent predicates all gate a `PYRAMID` signal, and the
//! portfolio-gate projection uses a fixed conservative lot estimate rather
//! than the sizer's real output.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Conservative lot estimate used only for the portfolio-gate projection,
/// never for actual order sizing.
pub const PORTFOLIO_GATE_ESTIMATED_LOTS: u32 = 5;

/// Default ATR spacing required between successive pyramids.
pub const DEFAULT_ATR_PYRAMID_SPACING: Decimal = dec!(0.5);

/// Default portfolio-gate caps.
pub const DEFAULT_PYRAMID_RISK_BLOCK_PERCENT: Decimal = dec!(12);
pub const DEFAULT_PYRAMID_VOL_BLOCK_PERCENT: Decimal = dec!(4);

/// Which of the three predicates failed, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateFailure {
    Instrument,
    Portfolio,
    Profit,
}

/// Everything the three predicates need, precomputed by the caller
/// (`basso-core`'s `SignalEngine`) so this module stays pure.
#[derive(Debug, Clone, Copy)]
pub struct PyramidGateInput {
    pub price: Decimal,
    pub base_entry_price: Decimal,
    pub initial_risk: Decimal,
    pub last_pyramid_price: Decimal,
    pub atr: Decimal,
    pub atr_pyramid_spacing: Decimal,
    pub projected_risk_percent: Decimal,
    pub projected_vol_percent: Decimal,
    pub pyramid_risk_block_percent: Decimal,
    pub pyramid_vol_block_percent: Decimal,
    pub instrument_unrealized_pnl: Decimal,
}

/// Outcome of evaluating all three gates, carrying the diagnostics the audit
/// trail records regardless of pass/fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidGateResult {
    pub price_move_r: Decimal,
    pub atr_spacing: Decimal,
    pub projected_risk_percent: Decimal,
    pub projected_vol_percent: Decimal,
    pub failures: [Option<GateFailure>; 3],
}

impl PyramidGateResult {
    pub fn admitted(&self) -> bool {
        self.failures.iter().all(Option::is_none)
    }
}

/// Evaluates the instrument, portfolio, and profit gates independently and
/// reports every failing predicate (not just the first).
pub fn evaluate(input: PyramidGateInput) -> PyramidGateResult {
    let price_move_r = input.price - input.base_entry_price;
    let atr_spacing = if input.atr.is_zero() {
        Decimal::ZERO
    } else {
        (input.price - input.last_pyramid_price) / input.atr
    };

    let instrument_ok = price_move_r > input.initial_risk && atr_spacing >= input.atr_pyramid_spacing;
    let portfolio_ok = input.projected_risk_percent <= input.pyramid_risk_block_percent
        && input.projected_vol_percent <= input.pyramid_vol_block_percent;
    let profit_ok = input.instrument_unrealized_pnl > Decimal::ZERO;

    let failures = [
        (!instrument_ok).then_some(GateFailure::Instrument),
        (!portfolio_ok).then_some(GateFailure::Portfolio),
        (!profit_ok).then_some(GateFailure::Profit),
    ];

    PyramidGateResult {
        price_move_r,
        atr_spacing,
        projected_risk_percent: input.projected_risk_percent,
        projected_vol_percent: input.projected_vol_percent,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> PyramidGateInput {
        PyramidGateInput {
            price: dec!(52500),
            base_entry_price: dec!(52000),
            initial_risk: dec!(400),
            last_pyramid_price: dec!(52000),
            atr: dec!(350),
            atr_pyramid_spacing: DEFAULT_ATR_PYRAMID_SPACING,
            projected_risk_percent: dec!(10),
            projected_vol_percent: dec!(3),
            pyramid_risk_block_percent: DEFAULT_PYRAMID_RISK_BLOCK_PERCENT,
            pyramid_vol_block_percent: DEFAULT_PYRAMID_VOL_BLOCK_PERCENT,
            instrument_unrealized_pnl: dec!(1500),
        }
    }

    #[test]
    fn all_gates_pass_when_every_predicate_holds() {
        let result = evaluate(base_input());
        assert!(result.admitted());
    }

    #[test]
    fn instrument_gate_fails_when_move_is_too_small() {
        let mut input = base_input();
        input.price = dec!(52100); // move of 100 < initial_risk of 400
        let result = evaluate(input);
        assert!(!result.admitted());
        assert_eq!(result.failures[0], Some(GateFailure::Instrument));
    }

    #[test]
    fn portfolio_gate_fails_over_risk_block() {
        let mut input = base_input();
        input.projected_risk_percent = dec!(13);
        let result = evaluate(input);
        assert_eq!(result.failures[1], Some(GateFailure::Portfolio));
    }

    #[test]
    fn profit_gate_fails_on_non_positive_unrealized_pnl() {
        let mut input = base_input();
        input.instrument_unrealized_pnl = dec!(0);
        let result = evaluate(input);
        assert_eq!(result.failures[2], Some(GateFailure::Profit));
    }
}
