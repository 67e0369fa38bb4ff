//! Tom-Basso triple-constraint position sizing.

use basso_markets::instrument::{InstrumentConfig, Limiter};
use basso_markets::signal::Signal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Capital and margin snapshot the sizer needs beyond the signal and static
/// instrument config.
#[derive(Debug, Clone, Copy)]
pub struct SizingInput {
    pub equity_high: Decimal,
    pub available_margin: Decimal,
    pub max_margin_util_percent: Decimal,
}

/// The three candidate lot counts and the binding constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingResult {
    pub lot_r: u32,
    pub lot_v: u32,
    pub lot_m: u32,
    pub final_lots: u32,
    /// `None` only when `final_lots == 0` and no limiter could bind.
    pub limiter: Option<Limiter>,
}

/// Computes `lot_R`, `lot_V`, `lot_M` and takes the minimum, using the
/// signal's declared `kind` to pick the initial vs ongoing risk/vol percents
/// is the caller's job — `config`'s percents here are whichever the caller
/// selected for this admission.
pub fn size_position(
    signal: &Signal,
    config: &InstrumentConfig,
    risk_percent: Decimal,
    vol_percent: Decimal,
    input: SizingInput,
) -> SizingResult {
    let risk_per_unit = signal.initial_risk();
    let atr = signal.atr;

    let lot_r = floor_lots(
        input.equity_high * risk_percent / dec!(100),
        risk_per_unit * config.point_value,
    );
    let lot_v = floor_lots(
        input.equity_high * vol_percent / dec!(100),
        atr * config.point_value,
    );
    let lot_m = floor_lots(
        input.available_margin * input.max_margin_util_percent / dec!(100),
        config.margin_per_lot,
    );

    let final_lots = lot_r.min(lot_v).min(lot_m);
    let limiter = if final_lots == 0 {
        None
    } else if final_lots == lot_r {
        Some(Limiter::Risk)
    } else if final_lots == lot_v {
        Some(Limiter::Vol)
    } else {
        Some(Limiter::Margin)
    };

    SizingResult {
        lot_r,
        lot_v,
        lot_m,
        final_lots,
        limiter,
    }
}

fn floor_lots(budget: Decimal, per_lot_cost: Decimal) -> u32 {
    if per_lot_cost <= Decimal::ZERO {
        return 0;
    }
    (budget / per_lot_cost)
        .floor()
        .to_u32()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use basso_markets::instrument::{Instrument, BANK_NIFTY_CONFIG};
    use basso_markets::signal::{SignalKind, Slot};
    use chrono::{TimeZone, Utc};

    fn signal() -> Signal {
        Signal::try_new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            SignalKind::BaseEntry,
            Instrument::BankNifty,
            Slot::Long(1),
            dec!(52000),
            dec!(51475),
            1,
            dec!(350),
            dec!(0.5),
            dec!(51900),
            None,
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn binding_limiter_is_the_minimum_of_the_three() {
        let signal = signal();
        let result = size_position(
            &signal,
            &BANK_NIFTY_CONFIG,
            dec!(0.5),
            dec!(0.5),
            SizingInput {
                equity_high: dec!(10_000_000),
                available_margin: dec!(1_000_000),
                max_margin_util_percent: dec!(60),
            },
        );
        assert_eq!(result.final_lots, result.lot_r.min(result.lot_v).min(result.lot_m));
        assert!(result.limiter.is_some());
    }

    #[test]
    fn zero_budget_yields_zero_lots_and_no_limiter() {
        let signal = signal();
        let result = size_position(
            &signal,
            &BANK_NIFTY_CONFIG,
            dec!(0.5),
            dec!(0.5),
            SizingInput {
                equity_high: dec!(0),
                available_margin: dec!(0),
                max_margin_util_percent: dec!(60),
            },
        );
        assert_eq!(result.final_lots, 0);
        assert_eq!(result.limiter, None);
    }
}
