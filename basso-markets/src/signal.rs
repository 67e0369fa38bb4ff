//! Externally generated trading signals.

use crate::instrument::Instrument;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// The kind of intention a signal expresses.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum SignalKind {
    BaseEntry,
    Pyramid,
    Exit,
    EodMonitor,
}

impl Display for SignalKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalKind::BaseEntry => "BASE_ENTRY",
            SignalKind::Pyramid => "PYRAMID",
            SignalKind::Exit => "EXIT",
            SignalKind::EodMonitor => "EOD_MONITOR",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BASE_ENTRY" => Ok(SignalKind::BaseEntry),
            "PYRAMID" => Ok(SignalKind::Pyramid),
            "EXIT" => Ok(SignalKind::Exit),
            "EOD_MONITOR" => Ok(SignalKind::EodMonitor),
            other => Err(format!("unknown signal kind: {other}")),
        }
    }
}

/// Symbolic position slot a signal refers to within an instrument's ladder
/// of base entry + pyramids.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum Slot {
    Long(u8),
    All,
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Long(n) => write!(f, "Long_{n}"),
            Slot::All => write!(f, "ALL"),
        }
    }
}

impl std::str::FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ALL") {
            return Ok(Slot::All);
        }
        let n = s
            .strip_prefix("Long_")
            .or_else(|| s.strip_prefix("long_"))
            .and_then(|n| n.parse::<u8>().ok())
            .ok_or_else(|| format!("unknown slot: {s}"))?;
        Ok(Slot::Long(n))
    }
}

/// An externally generated intention to trade.
///
/// Immutable once constructed; `try_new` is the single validating
/// constructor so malformed signals cannot exist in interior code (Design
/// Note: "ad-hoc dynamic dict payloads... parse-at-the-edge").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub received_at: DateTime<Utc>,
    pub chart_ts: DateTime<Utc>,
    pub kind: SignalKind,
    pub instrument: Instrument,
    pub slot: Slot,
    pub price: Decimal,
    pub stop: Decimal,
    pub suggested_lots: u32,
    pub atr: Decimal,
    pub er: Decimal,
    pub supertrend: Decimal,
    pub reason: Option<String>,
    pub roc: Option<Decimal>,
    pub highest: Option<Decimal>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SignalValidationError {
    #[error("EXIT signals require a reason")]
    MissingExitReason,
    #[error("stop ({stop}) must be below price ({price}) for a long slot")]
    StopNotBelowPrice { stop: Decimal, price: Decimal },
    #[error("stop must be positive")]
    NonPositiveStop,
}

impl Signal {
    /// Validates the core invariants: non-EXIT kinds need
    /// `stop > 0` and `stop < price`; EXIT kinds need a `reason`.
    pub fn try_new(
        received_at: DateTime<Utc>,
        chart_ts: DateTime<Utc>,
        kind: SignalKind,
        instrument: Instrument,
        slot: Slot,
        price: Decimal,
        stop: Decimal,
        suggested_lots: u32,
        atr: Decimal,
        er: Decimal,
        supertrend: Decimal,
        reason: Option<String>,
        roc: Option<Decimal>,
        highest: Option<Decimal>,
    ) -> Result<Self, SignalValidationError> {
        if kind == SignalKind::Exit {
            if reason.is_none() {
                return Err(SignalValidationError::MissingExitReason);
            }
        } else {
            if stop <= Decimal::ZERO {
                return Err(SignalValidationError::NonPositiveStop);
            }
            if stop >= price {
                return Err(SignalValidationError::StopNotBelowPrice { stop, price });
            }
        }

        Ok(Self {
            received_at,
            chart_ts,
            kind,
            instrument,
            slot,
            price,
            stop,
            suggested_lots,
            atr,
            er,
            supertrend,
            reason,
            roc,
            highest,
        })
    }

    /// `entry - stop`, the per-unit "1 R" of initial risk.
    pub fn initial_risk(&self) -> Decimal {
        self.price - self.stop
    }

    pub fn fingerprint(&self) -> SignalFingerprint {
        SignalFingerprint {
            instrument: self.instrument,
            kind: self.kind,
            slot: self.slot,
            chart_ts: self.chart_ts,
        }
    }

    /// `received_at - chart_ts`, used by the condition-stage age bucket.
    pub fn age(&self) -> Duration {
        (self.received_at - self.chart_ts)
            .to_std()
            .unwrap_or_default()
    }

    /// Parses a chart-alert webhook body into a validated [`Signal`].
    ///
    /// The webhook transport itself (HTTP framework, routing, auth) is out
    /// of scope for this platform; this is the one typed parse-at-the-edge
    /// function that a deployment's webhook handler calls once it has the
    /// request body in hand, so malformed JSON or an invalid signal can
    /// never cross into the rest of the pipeline. `received_at` is supplied
    /// by the caller (the handler's clock), not carried in the payload.
    pub fn try_from_webhook_json(
        body: Bytes,
        received_at: DateTime<Utc>,
    ) -> Result<Signal, SignalParseError> {
        let envelope: WebhookEnvelope =
            serde_json::from_slice(&body).map_err(|e| SignalParseError::Json(e.to_string()))?;

        let kind = envelope
            .kind
            .parse::<SignalKind>()
            .map_err(SignalParseError::UnknownKind)?;
        let instrument = Instrument::from_str(&envelope.instrument)
            .map_err(|_| SignalParseError::UnknownInstrument(envelope.instrument.clone()))?;
        let slot = envelope
            .position
            .parse::<Slot>()
            .map_err(SignalParseError::UnknownSlot)?;

        Signal::try_new(
            received_at,
            envelope.timestamp,
            kind,
            instrument,
            slot,
            envelope.price,
            envelope.stop,
            envelope.lots,
            envelope.atr,
            envelope.er,
            envelope.supertrend,
            envelope.reason,
            envelope.roc,
            envelope.highest,
        )
        .map_err(SignalParseError::Invalid)
    }
}

/// The raw chart-alert JSON shape, translated into this crate's own
/// vocabulary by
/// [`Signal::try_from_webhook_json`].
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    kind: String,
    instrument: String,
    position: String,
    price: Decimal,
    stop: Decimal,
    #[serde(default)]
    lots: u32,
    #[serde(default)]
    atr: Decimal,
    #[serde(default)]
    er: Decimal,
    #[serde(default)]
    supertrend: Decimal,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    roc: Option<Decimal>,
    #[serde(default)]
    highest: Option<Decimal>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalParseError {
    #[error("malformed webhook body: {0}")]
    Json(String),
    #[error("unknown signal type: {0}")]
    UnknownKind(String),
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),
    #[error("unknown position slot: {0}")]
    UnknownSlot(String),
    #[error(transparent)]
    Invalid(#[from] SignalValidationError),
}

/// Identity of a signal for duplicate detection.
///
/// Two fingerprints match when the `(instrument, kind, slot)` triple is
/// equal and their `chart_ts` values are within the detector's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalFingerprint {
    pub instrument: Instrument,
    pub kind: SignalKind,
    pub slot: Slot,
    pub chart_ts: DateTime<Utc>,
}

impl SignalFingerprint {
    pub fn matches(&self, other: &SignalFingerprint, window: Duration) -> bool {
        if self.instrument != other.instrument || self.kind != other.kind || self.slot != other.slot
        {
            return false;
        }
        let delta = (self.chart_ts - other.chart_ts).abs();
        delta
            .to_std()
            .map(|d| d <= window)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn exit_requires_reason() {
        let err = Signal::try_new(
            ts(10),
            ts(0),
            SignalKind::Exit,
            Instrument::BankNifty,
            Slot::Long(1),
            dec!(52000),
            dec!(51650),
            2,
            dec!(350),
            dec!(0.5),
            dec!(51900),
            None,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, SignalValidationError::MissingExitReason);
    }

    #[test]
    fn base_entry_requires_stop_below_price() {
        let err = Signal::try_new(
            ts(10),
            ts(0),
            SignalKind::BaseEntry,
            Instrument::BankNifty,
            Slot::Long(1),
            dec!(52000),
            dec!(52100),
            2,
            dec!(350),
            dec!(0.5),
            dec!(51900),
            None,
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SignalValidationError::StopNotBelowPrice { .. }));
    }

    #[test]
    fn fingerprints_match_within_window() {
        let a = Signal::try_new(
            ts(10),
            ts(0),
            SignalKind::BaseEntry,
            Instrument::BankNifty,
            Slot::Long(1),
            dec!(52000),
            dec!(51650),
            2,
            dec!(350),
            dec!(0.5),
            dec!(51900),
            None,
            None,
            None,
        )
        .unwrap();
        let b = Signal {
            chart_ts: ts(30),
            ..a.clone()
        };
        assert!(a
            .fingerprint()
            .matches(&b.fingerprint(), Duration::from_secs(60)));
        assert!(!a
            .fingerprint()
            .matches(&b.fingerprint(), Duration::from_secs(10)));
    }

    #[test]
    fn slot_parses_and_displays() {
        assert_eq!("Long_3".parse::<Slot>().unwrap(), Slot::Long(3));
        assert_eq!("ALL".parse::<Slot>().unwrap(), Slot::All);
        assert_eq!(Slot::Long(2).to_string(), "Long_2");
    }

    #[test]
    fn webhook_json_parses_into_a_validated_signal() {
        let body = Bytes::from(
            r#"{
                "timestamp": "2026-03-02T09:20:00Z",
                "type": "BASE_ENTRY",
                "instrument": "BANK_NIFTY",
                "position": "Long_1",
                "price": "52000",
                "stop": "51650",
                "lots": 2,
                "atr": "350",
                "er": "0.5",
                "supertrend": "51900"
            }"#,
        );
        let signal = Signal::try_from_webhook_json(body, ts(30)).unwrap();
        assert_eq!(signal.instrument, Instrument::BankNifty);
        assert_eq!(signal.kind, SignalKind::BaseEntry);
        assert_eq!(signal.slot, Slot::Long(1));
        assert_eq!(signal.suggested_lots, 2);
    }

    #[test]
    fn webhook_json_rejects_unknown_instrument() {
        let body = Bytes::from(
            r#"{
                "timestamp": "2026-03-02T09:20:00Z",
                "type": "BASE_ENTRY",
                "instrument": "DOGE",
                "position": "Long_1",
                "price": "52000",
                "stop": "51650"
            }"#,
        );
        let err = Signal::try_from_webhook_json(body, ts(30)).unwrap_err();
        assert!(matches!(err, SignalParseError::UnknownInstrument(_)));
    }
}
