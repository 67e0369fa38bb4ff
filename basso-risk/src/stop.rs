//! Per-position ATR trailing stop.
//!
//! Initial stop is `entry - initial_atr_mult * atr`; every subsequent
//! update ratchets `current_stop` up and never down.

use basso_markets::instrument::InstrumentConfig;
use rust_decimal::Decimal;

/// Initial stop at entry: `entry - initial_atr_mult * atr`.
pub fn initial_stop(entry: Decimal, atr: Decimal, config: &InstrumentConfig) -> Decimal {
    entry - config.initial_atr_mult * atr
}

/// The result of feeding one price tick through the trailing-stop ratchet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopUpdate {
    pub highest_close: Decimal,
    pub current_stop: Decimal,
}

/// Advances `(highest_close, current_stop)` for one tick.
///
/// `current_stop` is monotone non-decreasing by construction: the new value
/// is `max(current_stop, trailing)`, never assigned directly from
/// `trailing`. Idempotent for an unchanged `(price, atr)` pair.
pub fn update_trailing_stop(
    highest_close: Decimal,
    current_stop: Decimal,
    price: Decimal,
    atr: Decimal,
    config: &InstrumentConfig,
) -> StopUpdate {
    let highest_close = highest_close.max(price);
    let trailing = highest_close - config.trailing_atr_mult * atr;
    let current_stop = current_stop.max(trailing);
    StopUpdate {
        highest_close,
        current_stop,
    }
}

/// `price < current_stop` — the position's stop has been breached.
pub fn stop_hit(current_stop: Decimal, price: Decimal) -> bool {
    price < current_stop
}

#[cfg(test)]
mod tests {
    use super::*;
    use basso_markets::instrument::BANK_NIFTY_CONFIG;
    use rust_decimal_macros::dec;

    #[test]
    fn initial_stop_is_entry_minus_atr_multiple() {
        let stop = initial_stop(dec!(52000), dec!(350), &BANK_NIFTY_CONFIG);
        assert_eq!(stop, dec!(52000) - dec!(1.5) * dec!(350));
    }

    #[test]
    fn trailing_stop_never_decreases() {
        let config = &BANK_NIFTY_CONFIG;
        let first = update_trailing_stop(dec!(52000), dec!(51475), dec!(52500), dec!(350), config);
        assert!(first.current_stop >= dec!(51475));

        let second = update_trailing_stop(
            first.highest_close,
            first.current_stop,
            dec!(52100), // price drops from the prior high
            dec!(350),
            config,
        );
        assert!(second.current_stop >= first.current_stop);
        assert_eq!(second.highest_close, first.highest_close);
    }

    #[test]
    fn update_is_idempotent_for_unchanged_inputs() {
        let config = &BANK_NIFTY_CONFIG;
        let first = update_trailing_stop(dec!(52000), dec!(51475), dec!(52500), dec!(350), config);
        let second =
            update_trailing_stop(first.highest_close, first.current_stop, dec!(52500), dec!(350), config);
        assert_eq!(first, second);
    }

    #[test]
    fn stop_hit_when_price_below_current_stop() {
        assert!(stop_hit(dec!(51475), dec!(51400)));
        assert!(!stop_hit(dec!(51475), dec!(51500)));
    }
}
