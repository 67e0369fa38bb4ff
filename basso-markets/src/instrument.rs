//! Supported instruments and their static/date-dependent trading parameters.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The closed set of instruments this platform accepts signals for.
///
/// `Nifty`/`Sensex` are the index underlyings the auto-hedge orchestrator
/// (`basso-hedge`) straddles and hedges; `BankNifty`/`GoldMini`/`SilverMini`
/// are the instruments the signal engine sizes and trails stops for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum Instrument {
    BankNifty,
    GoldMini,
    Copper,
    SilverMini,
    Nifty,
    Sensex,
}

impl Instrument {
    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::BankNifty => "BANK_NIFTY",
            Instrument::GoldMini => "GOLD_MINI",
            Instrument::Copper => "COPPER",
            Instrument::SilverMini => "SILVER_MINI",
            Instrument::Nifty => "NIFTY",
            Instrument::Sensex => "SENSEX",
        }
    }

    pub fn exchange(&self) -> crate::exchange::ExchangeId {
        match self {
            Instrument::BankNifty | Instrument::Nifty | Instrument::Sensex => {
                crate::exchange::ExchangeId::Nse
            }
            Instrument::GoldMini | Instrument::Copper | Instrument::SilverMini => {
                crate::exchange::ExchangeId::Mcx
            }
        }
    }

    /// Lot size for this instrument on `on_date`. Bank Nifty's lot size has
    /// changed repeatedly over NSE circulars; every other instrument here is
    /// fixed. This is the *only* lot-size lookup in the codebase — an
    /// earlier, separate static table is not carried forward (see
    /// `DESIGN.md`, Open Question 2).
    pub fn lot_size(&self, on_date: NaiveDate) -> u32 {
        match self {
            Instrument::BankNifty => bank_nifty_lot_size(on_date),
            Instrument::GoldMini => 100,
            Instrument::Copper => 2500,
            Instrument::SilverMini => 5,
            Instrument::Nifty => 75,
            Instrument::Sensex => 10,
        }
    }
}

impl Display for Instrument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Instrument {
    type Err = UnknownInstrument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BANK_NIFTY" => Ok(Instrument::BankNifty),
            "GOLD_MINI" => Ok(Instrument::GoldMini),
            "COPPER" => Ok(Instrument::Copper),
            "SILVER_MINI" => Ok(Instrument::SilverMini),
            "NIFTY" => Ok(Instrument::Nifty),
            "SENSEX" => Ok(Instrument::Sensex),
            other => Err(UnknownInstrument(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown instrument: {0}")]
pub struct UnknownInstrument(pub String);

/// Fallback lot size for dates before the earliest recorded circular.
const BANKNIFTY_DEFAULT_LOT_SIZE: u32 = 25;

/// Historical Bank Nifty lot size, newest effective date first. Ported from
/// the NSE F&O circular history the original Python implementation keeps for
/// backtesting fidelity (`lot_size_history.py::BANKNIFTY_LOT_SIZE_HISTORY`).
fn bank_nifty_lot_size(on_date: NaiveDate) -> u32 {
    let history: [(NaiveDate, u32); 11] = [
        (NaiveDate::from_ymd_opt(2025, 12, 30).unwrap(), 30),
        (NaiveDate::from_ymd_opt(2025, 4, 25).unwrap(), 35),
        (NaiveDate::from_ymd_opt(2024, 11, 20).unwrap(), 30),
        (NaiveDate::from_ymd_opt(2023, 7, 1).unwrap(), 15),
        (NaiveDate::from_ymd_opt(2020, 5, 4).unwrap(), 25),
        (NaiveDate::from_ymd_opt(2018, 10, 26).unwrap(), 20),
        (NaiveDate::from_ymd_opt(2016, 4, 29).unwrap(), 40),
        (NaiveDate::from_ymd_opt(2015, 8, 28).unwrap(), 30),
        (NaiveDate::from_ymd_opt(2010, 4, 30).unwrap(), 25),
        (NaiveDate::from_ymd_opt(2007, 2, 23).unwrap(), 50),
        (NaiveDate::from_ymd_opt(2005, 6, 13).unwrap(), 100),
    ];
    history
        .iter()
        .find(|(effective, _)| on_date >= *effective)
        .map(|(_, lot_size)| *lot_size)
        .unwrap_or(BANKNIFTY_DEFAULT_LOT_SIZE)
}

/// Which Tom-Basso limiter bound the final lot count.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum Limiter {
    Risk,
    Vol,
    Margin,
}

/// Static, non-date-dependent trading parameters for an instrument.
///
/// Only instruments the signal engine actively sizes/trails carry a config;
/// `Nifty`/`Sensex` (hedge-orchestrator underlyings) do not, since they are
/// never sized by `PositionSizer` in this system — only the index baskets
/// scheduled in `basso-hedge` are.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct InstrumentConfig {
    pub instrument: Instrument,
    pub point_value: Decimal,
    pub margin_per_lot: Decimal,
    pub initial_risk_percent: Decimal,
    pub ongoing_risk_percent: Decimal,
    pub initial_vol_percent: Decimal,
    pub ongoing_vol_percent: Decimal,
    pub initial_atr_mult: Decimal,
    pub trailing_atr_mult: Decimal,
    pub max_pyramids: u32,
}

impl InstrumentConfig {
    /// Lookup the static config for `instrument`, or `None` if this platform
    /// does not size/trail it (e.g. the hedge-orchestrator's index
    /// underlyings).
    pub fn for_instrument(instrument: Instrument) -> Option<&'static InstrumentConfig> {
        match instrument {
            Instrument::BankNifty => Some(&BANK_NIFTY_CONFIG),
            Instrument::GoldMini => Some(&GOLD_MINI_CONFIG),
            Instrument::Copper | Instrument::SilverMini | Instrument::Nifty | Instrument::Sensex => {
                None
            }
        }
    }
}

/// Per-instrument static configuration defaults.
pub static BANK_NIFTY_CONFIG: InstrumentConfig = InstrumentConfig {
    instrument: Instrument::BankNifty,
    point_value: dec!(35),
    margin_per_lot: dec!(270000),
    initial_risk_percent: dec!(0.5),
    ongoing_risk_percent: dec!(1.0),
    initial_vol_percent: dec!(0.5),
    ongoing_vol_percent: dec!(0.7),
    initial_atr_mult: dec!(1.5),
    trailing_atr_mult: dec!(2.5),
    max_pyramids: 5,
};

pub static GOLD_MINI_CONFIG: InstrumentConfig = InstrumentConfig {
    instrument: Instrument::GoldMini,
    point_value: dec!(10),
    margin_per_lot: dec!(105000),
    initial_risk_percent: dec!(0.5),
    ongoing_risk_percent: dec!(1.0),
    initial_vol_percent: dec!(0.2),
    ongoing_vol_percent: dec!(0.3),
    initial_atr_mult: dec!(1.0),
    trailing_atr_mult: dec!(2.0),
    max_pyramids: 3,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_nifty_lot_size_follows_circular_history() {
        assert_eq!(
            Instrument::BankNifty.lot_size(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
            15
        );
        assert_eq!(
            Instrument::BankNifty.lot_size(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()),
            30
        );
        assert_eq!(
            Instrument::BankNifty.lot_size(NaiveDate::from_ymd_opt(1999, 1, 1).unwrap()),
            BANKNIFTY_DEFAULT_LOT_SIZE
        );
    }

    #[test]
    fn fixed_lot_sizes() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(Instrument::GoldMini.lot_size(d), 100);
        assert_eq!(Instrument::Copper.lot_size(d), 2500);
        assert_eq!(Instrument::SilverMini.lot_size(d), 5);
    }

    #[test]
    fn config_lookup_is_limited_to_sized_instruments() {
        assert!(InstrumentConfig::for_instrument(Instrument::BankNifty).is_some());
        assert!(InstrumentConfig::for_instrument(Instrument::GoldMini).is_some());
        assert!(InstrumentConfig::for_instrument(Instrument::Nifty).is_none());
    }

    #[test]
    fn instrument_parses_from_webhook_strings() {
        assert_eq!(
            "bank_nifty".parse::<Instrument>().unwrap(),
            Instrument::BankNifty
        );
        assert!("dogecoin".parse::<Instrument>().is_err());
    }
}
