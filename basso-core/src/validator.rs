//! Two-stage signal validation: condition checks before any broker call,
//! execution checks after fetching the broker's live quote.
//!
//! Every numeric default is wired through
//! `basso_core::system::config::ValidatorConfig`; validation is expressed as
//! plain functions returning a result-shaped enum rather than using
//! exceptions for control flow.

use crate::system::config::ValidatorConfig;
use basso_execution::gateway::{BrokerGateway, GatewayError};
use basso_markets::exchange::ExchangeId;
use basso_markets::signal::{Signal, SignalKind, Slot};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

/// Age bucket of `received_at - chart_ts` (condition stage).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBucket {
    Normal,
    Warning,
    Elevated,
    Stale,
}

pub fn age_bucket(signal: &Signal, config: &ValidatorConfig) -> AgeBucket {
    let age = signal.age();
    if age <= Duration::from_secs(config.age_warning_seconds) {
        AgeBucket::Normal
    } else if age <= Duration::from_secs(config.age_elevated_seconds) {
        AgeBucket::Warning
    } else if age <= Duration::from_secs(config.age_stale_seconds) {
        AgeBucket::Elevated
    } else {
        AgeBucket::Stale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warning,
    Elevated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionAccepted {
    pub severity: Severity,
    pub age_bucket_outcome: AgeBucket,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionRejected {
    #[error("EXIT {slot:?} has no matching open position")]
    ExitWithoutOpenPosition { slot: Slot },
    #[error("PYRAMID {slot:?} has no base entry on record")]
    PyramidWithoutBase { slot: Slot },
    #[error("BASE_ENTRY {slot:?} duplicates an already-open slot")]
    BaseEntryDuplicatesSlot { slot: Slot },
}

/// What the condition stage needs to know about the instrument's existing
/// slot ladder, precomputed by the caller (`SignalEngine`) from the
/// `PortfolioState` snapshot — this module stays pure and has no knowledge
/// of `PortfolioState` itself.
#[derive(Debug, Clone)]
pub struct ExistingSlots {
    pub open_slots: Vec<Slot>,
}

impl ExistingSlots {
    fn has(&self, slot: Slot) -> bool {
        self.open_slots.iter().any(|s| *s == slot)
    }

    fn has_base(&self) -> bool {
        self.open_slots.iter().any(|s| matches!(s, Slot::Long(1)))
    }
}

/// The condition stage: fields well-formed (enforced by `Signal::try_new`'s
/// validating constructor), age bucket, and slot validity against existing
/// positions.
pub fn check_condition(
    signal: &Signal,
    existing: &ExistingSlots,
    config: &ValidatorConfig,
) -> Result<ConditionAccepted, ConditionRejected> {
    match signal.kind {
        SignalKind::Exit => {
            if signal.slot != Slot::All && !existing.has(signal.slot) {
                return Err(ConditionRejected::ExitWithoutOpenPosition { slot: signal.slot });
            }
        }
        SignalKind::Pyramid => {
            if !existing.has_base() {
                return Err(ConditionRejected::PyramidWithoutBase { slot: signal.slot });
            }
        }
        SignalKind::BaseEntry => {
            if existing.has(signal.slot) {
                return Err(ConditionRejected::BaseEntryDuplicatesSlot { slot: signal.slot });
            }
        }
        SignalKind::EodMonitor => {}
    }

    let bucket = age_bucket(signal, config);
    let severity = match bucket {
        AgeBucket::Normal => Severity::Ok,
        AgeBucket::Warning => Severity::Warning,
        AgeBucket::Elevated | AgeBucket::Stale => Severity::Elevated,
    };

    Ok(ConditionAccepted {
        severity,
        age_bucket_outcome: bucket,
    })
}

/// Divergence and risk-increase figures the execution stage computes from
/// the broker's live quote. `is_long` distinguishes a long slot (favourable
/// = broker price below signal price) from a short one (reversed).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionFigures {
    pub divergence_percent: Decimal,
    pub risk_increase_percent: Decimal,
    pub favourable: bool,
}

pub fn compute_execution_figures(signal: &Signal, broker_ltp: Decimal, is_long: bool) -> ExecutionFigures {
    let divergence = (broker_ltp - signal.price) / signal.price * dec!(100);
    let risk_increase = if signal.price == signal.stop {
        Decimal::ZERO
    } else {
        (broker_ltp - signal.stop) / (signal.price - signal.stop) * dec!(100) - dec!(100)
    };
    let favourable = if is_long {
        broker_ltp < signal.price
    } else {
        broker_ltp > signal.price
    };
    ExecutionFigures {
        divergence_percent: divergence,
        risk_increase_percent: risk_increase,
        favourable,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionRejectReason {
    DivergenceTooHigh,
    Chase,
    StaleWithHighDivergence,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionDecision {
    Accept { favourable_slippage: bool },
    Resize { adjusted_lots: u32 },
    Reject { reason: ExecutionRejectReason },
    /// Broker price unavailable after retries: proceed with the signal's
    /// own price and flag `validation_bypassed` in the audit.
    Bypass,
}

/// The execution stage policy matrix. Applied once a quote has been
/// obtained (or retries exhausted — see [`fetch_ltp_with_retry`]).
#[allow(clippy::too_many_arguments)]
pub fn check_execution(
    signal: &Signal,
    broker_ltp: Decimal,
    is_long: bool,
    age_bucket_outcome: AgeBucket,
    config: &ValidatorConfig,
) -> ExecutionDecision {
    let figures = compute_execution_figures(signal, broker_ltp, is_long);
    let abs_divergence = figures.divergence_percent.abs();

    if abs_divergence <= config.divergence_warning_threshold_percent {
        return ExecutionDecision::Accept {
            favourable_slippage: figures.favourable,
        };
    }

    let kind_limit = match signal.kind {
        SignalKind::BaseEntry => config.max_divergence_base_entry_percent,
        SignalKind::Pyramid => config.max_divergence_pyramid_percent,
        SignalKind::Exit | SignalKind::EodMonitor => config.max_divergence_exit_percent,
    };

    if figures.favourable && abs_divergence <= kind_limit {
        return ExecutionDecision::Accept {
            favourable_slippage: true,
        };
    }

    if !figures.favourable && abs_divergence > kind_limit {
        return ExecutionDecision::Reject {
            reason: ExecutionRejectReason::DivergenceTooHigh,
        };
    }

    if age_bucket_outcome == AgeBucket::Stale
        && abs_divergence > config.max_divergence_exit_percent
    {
        return ExecutionDecision::Reject {
            reason: ExecutionRejectReason::StaleWithHighDivergence,
        };
    }

    let risk_kind_limit = match signal.kind {
        SignalKind::Pyramid => Some(config.max_risk_increase_pyramid_percent),
        SignalKind::BaseEntry => Some(config.max_risk_increase_base_percent),
        SignalKind::Exit | SignalKind::EodMonitor => None,
    };

    if let Some(limit) = risk_kind_limit {
        if figures.risk_increase_percent > limit {
            if signal.kind == SignalKind::Pyramid && config.reject_chase_for_pyramids {
                return ExecutionDecision::Reject {
                    reason: ExecutionRejectReason::Chase,
                };
            }

            // Shrink suggested_lots so post-resize risk-in-rupees matches
            // the pre-resize baseline, never below `min_lots_after_adjustment`.
            let scale = dec!(100) / (dec!(100) + figures.risk_increase_percent);
            let adjusted = (Decimal::from(signal.suggested_lots) * scale)
                .floor()
                .to_u32()
                .unwrap_or(0)
                .max(config.min_lots_after_adjustment);
            return ExecutionDecision::Resize {
                adjusted_lots: adjusted,
            };
        }
    }

    ExecutionDecision::Accept {
        favourable_slippage: figures.favourable,
    }
}

/// Retry policy for the broker quote: three attempts with 0.5s/1.0s/2.0s
/// back-off. Returns `None` once retries are exhausted, at which point the
/// caller proceeds as `Bypass`.
pub async fn fetch_ltp_with_retry(
    gateway: &dyn BrokerGateway,
    symbol: &str,
    exchange: ExchangeId,
) -> Option<Decimal> {
    const BACKOFFS_MS: [u64; 3] = [500, 1000, 2000];
    for backoff_ms in BACKOFFS_MS {
        match gateway.quote(symbol, exchange).await {
            Ok(quote) => return Some(quote.ltp),
            Err(GatewayError::Timeout(_)) | Err(GatewayError::Unreachable(_)) => {
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            Err(GatewayError::OrderRejected(_)) => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use basso_markets::instrument::Instrument;
    use chrono::{TimeZone, Utc};

    fn signal(kind: SignalKind, slot: Slot) -> Signal {
        Signal::try_new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            kind,
            Instrument::BankNifty,
            slot,
            dec!(52000),
            dec!(51650),
            2,
            dec!(350),
            dec!(0.5),
            dec!(51900),
            if kind == SignalKind::Exit {
                Some("stop hit".to_string())
            } else {
                None
            },
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn base_entry_rejected_when_slot_already_open() {
        let existing = ExistingSlots {
            open_slots: vec![Slot::Long(1)],
        };
        let err = check_condition(
            &signal(SignalKind::BaseEntry, Slot::Long(1)),
            &existing,
            &ValidatorConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, ConditionRejected::BaseEntryDuplicatesSlot { slot: Slot::Long(1) });
    }

    #[test]
    fn pyramid_rejected_without_base() {
        let existing = ExistingSlots { open_slots: vec![] };
        let err = check_condition(
            &signal(SignalKind::Pyramid, Slot::Long(2)),
            &existing,
            &ValidatorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConditionRejected::PyramidWithoutBase { .. }));
    }

    #[test]
    fn exit_rejected_without_matching_open_position() {
        let existing = ExistingSlots { open_slots: vec![] };
        let err = check_condition(
            &signal(SignalKind::Exit, Slot::Long(1)),
            &existing,
            &ValidatorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConditionRejected::ExitWithoutOpenPosition { .. }));
    }

    #[test]
    fn small_divergence_within_warning_threshold_accepts() {
        let decision = check_execution(
            &signal(SignalKind::BaseEntry, Slot::Long(1)),
            dec!(52050), // +0.096% divergence
            true,
            AgeBucket::Normal,
            &ValidatorConfig::default(),
        );
        assert!(matches!(decision, ExecutionDecision::Accept { .. }));
    }

    #[test]
    fn unfavourable_divergence_beyond_kind_limit_rejects() {
        let decision = check_execution(
            &signal(SignalKind::Pyramid, Slot::Long(2)),
            dec!(53500), // unfavourable for a long, well beyond 1% pyramid limit
            true,
            AgeBucket::Normal,
            &ValidatorConfig::default(),
        );
        assert_eq!(
            decision,
            ExecutionDecision::Reject {
                reason: ExecutionRejectReason::DivergenceTooHigh
            }
        );
    }

    #[test]
    fn risk_increase_beyond_pyramid_limit_resizes() {
        // price 52000/stop 51650, broker LTP 52120.
        let sig = signal(SignalKind::Pyramid, Slot::Long(2));
        let mut config = ValidatorConfig::default();
        config.reject_chase_for_pyramids = false;
        let decision = check_execution(&sig, dec!(52120), true, AgeBucket::Normal, &config);
        assert!(matches!(decision, ExecutionDecision::Resize { .. }));
    }
}
