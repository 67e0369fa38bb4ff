//! Human-in-the-loop confirmation gate: the mechanism by which an
//! elevated-risk action (a pyramid add past the portfolio's warning
//! threshold, a hedge spend past its cooldown) can pause for an operator's
//! decision without blocking the engine's other signals.
//!
//! A bounded `tokio::sync::mpsc` channel carries requests to whichever
//! channel(s) are enabled, each paired with a `oneshot` reply; the first
//! reply wins and a timeout resolves to the caller's supplied default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ConfirmationKind {
    PyramidPastRiskWarning,
    HedgeSpendPastCooldown,
    ManualOverrideRequested,
    /// A synthetic multi-leg rollback itself failed to close:
    /// `RollbackFailed` is terminal regardless of this request's answer, but
    /// the operator still needs paging so the exposed leg gets manual
    /// attention before the next session.
    SyntheticRollbackFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Decision {
    Approve,
    Deny,
}

/// Free-form key/value context shown to the operator alongside the request
/// (instrument, divergence percent, proposed spend, and so on).
pub type Context = HashMap<String, String>;

/// A request an operator (or a default-decision timeout) must resolve.
#[derive(Debug)]
pub struct ConfirmationRequest {
    pub kind: ConfirmationKind,
    pub context: Context,
    pub requested_at: DateTime<Utc>,
    reply: oneshot::Sender<Decision>,
}

impl ConfirmationRequest {
    pub fn resolve(self, decision: Decision) {
        let _ = self.reply.send(decision);
    }
}

/// Bounded channel between signal-processing tasks asking for a decision
/// and whatever surface (CLI prompt, webhook callback, notifier reply)
/// resolves it. A full queue or an expired `timeout` both resolve to
/// `default_decision` rather than block the caller.
#[derive(Debug, Clone)]
pub struct ConfirmationBus {
    sender: mpsc::Sender<ConfirmationRequest>,
}

impl ConfirmationBus {
    /// `capacity` bounds how many outstanding requests may queue before new
    /// ones fall back to their default decision immediately. Must be at
    /// least 1.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ConfirmationRequest>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Requests a decision, waiting up to `timeout`. Returns
    /// `default_decision` if the queue is saturated or the timeout elapses
    /// before an operator responds — never block the pipeline
    /// indefinitely on a human.
    pub async fn request(
        &self,
        kind: ConfirmationKind,
        context: Context,
        timeout: Duration,
        default_decision: Decision,
    ) -> Decision {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ConfirmationRequest {
            kind,
            context,
            requested_at: Utc::now(),
            reply: reply_tx,
        };

        if self.sender.try_send(request).is_err() {
            return default_decision;
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(decision)) => decision,
            _ => default_decision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn operator_approval_resolves_before_timeout() {
        let (bus, mut receiver) = ConfirmationBus::new(4);

        let handle = tokio::spawn(async move {
            bus.request(
                ConfirmationKind::PyramidPastRiskWarning,
                Context::new(),
                Duration::from_secs(5),
                Decision::Deny,
            )
            .await
        });

        let request = receiver.recv().await.unwrap();
        request.resolve(Decision::Approve);

        assert_eq!(handle.await.unwrap(), Decision::Approve);
    }

    #[tokio::test]
    async fn unanswered_request_falls_back_to_default_after_timeout() {
        let (bus, _receiver) = ConfirmationBus::new(4);
        let decision = bus
            .request(
                ConfirmationKind::HedgeSpendPastCooldown,
                Context::new(),
                Duration::from_millis(20),
                Decision::Deny,
            )
            .await;
        assert_eq!(decision, Decision::Deny);
    }

    #[tokio::test]
    async fn saturated_queue_falls_back_to_default_immediately() {
        let (bus, _receiver) = ConfirmationBus::new(1);
        // Occupies the single buffer slot; nothing ever drains `_receiver`.
        let first_bus = bus.clone();
        tokio::spawn(async move {
            let _ = first_bus
                .request(
                    ConfirmationKind::ManualOverrideRequested,
                    Context::new(),
                    Duration::from_secs(5),
                    Decision::Deny,
                )
                .await;
        });
        tokio::task::yield_now().await;

        let decision = bus
            .request(
                ConfirmationKind::ManualOverrideRequested,
                Context::new(),
                Duration::from_secs(1),
                Decision::Approve,
            )
            .await;
        assert_eq!(decision, Decision::Approve);
    }
}
