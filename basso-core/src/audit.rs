//! Append-only audit trail: one [`AuditRecord`] per signal the engine
//! processes, regardless of outcome.
//!
//! A narrow repository trait with a `parking_lot`-guarded backing;
//! `InMemoryAuditStore` is the only implementation this workspace ships —
//! persisted state is expressed via traits, with concrete persistence left
//! to the integrator.

use crate::error::AuditOutcome;
use crate::validator::{AgeBucket, ExecutionDecision};
use async_trait::async_trait;
use basso_markets::instrument::Limiter;
use basso_markets::signal::{Signal, SignalFingerprint};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One full record of a signal's trip through the engine pipeline.
///
/// Every field besides `signal`/`fingerprint`/`outcome`/`recorded_at` is
/// optional because the pipeline can terminate at any stage: a duplicate
/// never reaches validation, a validation rejection never reaches sizing,
/// and so on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub recorded_at: DateTime<Utc>,
    pub signal: Signal,
    pub fingerprint: SignalFingerprint,
    pub outcome: AuditOutcome,
    pub age_bucket: Option<AgeBucketLabel>,
    pub execution_decision: Option<ExecutionDecisionLabel>,
    pub sized_lots: Option<u32>,
    pub limiter: Option<Limiter>,
    pub risk_percent_after: Option<Decimal>,
    pub order_id: Option<u64>,
    pub rejection_reason: Option<String>,
    pub validation_bypassed: bool,
}

/// Serializable mirror of [`AgeBucket`] (the original has no `Serialize`
/// derive since it never crosses a process boundary on its own).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBucketLabel {
    Normal,
    Warning,
    Elevated,
    Stale,
}

impl From<AgeBucket> for AgeBucketLabel {
    fn from(value: AgeBucket) -> Self {
        match value {
            AgeBucket::Normal => AgeBucketLabel::Normal,
            AgeBucket::Warning => AgeBucketLabel::Warning,
            AgeBucket::Elevated => AgeBucketLabel::Elevated,
            AgeBucket::Stale => AgeBucketLabel::Stale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExecutionDecisionLabel {
    Accept { favourable_slippage: bool },
    Resize { adjusted_lots: u32 },
    Reject,
    Bypass,
}

impl From<&ExecutionDecision> for ExecutionDecisionLabel {
    fn from(value: &ExecutionDecision) -> Self {
        match value {
            ExecutionDecision::Accept { favourable_slippage } => ExecutionDecisionLabel::Accept {
                favourable_slippage: *favourable_slippage,
            },
            ExecutionDecision::Resize { adjusted_lots } => ExecutionDecisionLabel::Resize {
                adjusted_lots: *adjusted_lots,
            },
            ExecutionDecision::Reject { .. } => ExecutionDecisionLabel::Reject,
            ExecutionDecision::Bypass => ExecutionDecisionLabel::Bypass,
        }
    }
}

/// Append-only audit storage capability. Implementations must never allow
/// a record to be mutated or removed once appended.
#[async_trait]
pub trait AuditStore: Send + Sync + std::fmt::Debug {
    async fn append(&self, record: AuditRecord);
    async fn recent(&self, limit: usize) -> Vec<AuditRecord>;
    async fn count(&self) -> usize;
}

/// In-process, non-persistent implementation. Suitable for `backtest` runs
/// and as the default in `live` until an integrator wires a durable store
/// behind the same trait.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, record: AuditRecord) {
        self.records.lock().push(record);
    }

    async fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let records = self.records.lock();
        let start = records.len().saturating_sub(limit);
        records[start..].to_vec()
    }

    async fn count(&self) -> usize {
        self.records.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basso_markets::instrument::Instrument;
    use basso_markets::signal::{SignalKind, Slot};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn signal() -> Signal {
        Signal::try_new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
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
        .unwrap()
    }

    fn record() -> AuditRecord {
        let signal = signal();
        AuditRecord {
            recorded_at: signal.received_at,
            fingerprint: signal.fingerprint(),
            signal,
            outcome: AuditOutcome::Processed,
            age_bucket: Some(AgeBucketLabel::Normal),
            execution_decision: Some(ExecutionDecisionLabel::Accept {
                favourable_slippage: false,
            }),
            sized_lots: Some(2),
            limiter: Some(Limiter::Risk),
            risk_percent_after: Some(dec!(8.5)),
            order_id: Some(1),
            rejection_reason: None,
            validation_bypassed: false,
        }
    }

    #[tokio::test]
    async fn append_then_recent_returns_in_insertion_order() {
        let store = InMemoryAuditStore::new();
        store.append(record()).await;
        store.append(record()).await;
        assert_eq!(store.count().await, 2);
        assert_eq!(store.recent(10).await.len(), 2);
    }

    #[tokio::test]
    async fn recent_caps_at_requested_limit() {
        let store = InMemoryAuditStore::new();
        for _ in 0..5 {
            store.append(record()).await;
        }
        assert_eq!(store.recent(2).await.len(), 2);
    }
}
