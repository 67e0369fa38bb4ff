//! Exchange identifiers for the venues this platform trades on.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Identifies a trading venue.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum ExchangeId {
    /// National Stock Exchange of India (equity-index derivatives).
    Nse,
    /// Multi Commodity Exchange of India (commodity futures).
    Mcx,
    /// In-memory simulator used for backtests and tests.
    Simulated,
}

impl ExchangeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Nse => "NSE",
            ExchangeId::Mcx => "MCX",
            ExchangeId::Simulated => "SIMULATED",
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, ExchangeId::Simulated)
    }
}

impl FromStr for ExchangeId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NSE" => Ok(ExchangeId::Nse),
            "MCX" => Ok(ExchangeId::Mcx),
            "SIMULATED" => Ok(ExchangeId::Simulated),
            _ => Err(()),
        }
    }
}

impl Display for ExchangeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip() {
        assert_eq!(ExchangeId::Nse.to_string(), "NSE");
        assert_eq!(ExchangeId::from_str("nse").unwrap(), ExchangeId::Nse);
        assert!(ExchangeId::from_str("nasdaq").is_err());
    }

    #[test]
    fn test_flag() {
        assert!(ExchangeId::Simulated.is_test());
        assert!(!ExchangeId::Nse.is_test());
    }
}
