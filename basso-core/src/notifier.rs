//! Operator-notification capability: the hedge loop,
//! the engine, and the `live` command all raise notifications through one
//! narrow trait. Only a logging implementation ships — Telegram/email/SMS
//! transports are named as out-of-scope integrator responsibilities.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum NotificationKind {
    HedgeBuy,
    HedgeSell,
    HedgeFailure,
    EntryImminent,
    Heartbeat,
    DailySummary,
    ConfirmationRequest,
    MarginFallback,
}

/// Free-form key/value payload rendered into the notification body.
pub type NotificationContext = HashMap<String, String>;

#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub context: NotificationContext,
}

/// Capability for surfacing an event to whatever is watching the system.
/// Implementations must not block the caller on a slow transport — the
/// engine and hedge loop fire-and-forget these.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    async fn notify(&self, notification: Notification);
}

/// The only shipped implementation: emits a structured `tracing` event at
/// a level derived from the notification kind.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::HedgeFailure => {
                tracing::error!(
                    kind = ?notification.kind,
                    context = ?notification.context,
                    "{}",
                    notification.message
                );
            }
            NotificationKind::EntryImminent
            | NotificationKind::ConfirmationRequest
            | NotificationKind::MarginFallback => {
                tracing::warn!(
                    kind = ?notification.kind,
                    context = ?notification.context,
                    "{}",
                    notification.message
                );
            }
            NotificationKind::HedgeBuy
            | NotificationKind::HedgeSell
            | NotificationKind::Heartbeat
            | NotificationKind::DailySummary => {
                tracing::info!(
                    kind = ?notification.kind,
                    context = ?notification.context,
                    "{}",
                    notification.message
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_notifier_accepts_every_kind_without_panicking() {
        let notifier = LoggingNotifier;
        for kind in [
            NotificationKind::HedgeBuy,
            NotificationKind::HedgeSell,
            NotificationKind::HedgeFailure,
            NotificationKind::EntryImminent,
            NotificationKind::Heartbeat,
            NotificationKind::DailySummary,
            NotificationKind::ConfirmationRequest,
            NotificationKind::MarginFallback,
        ] {
            notifier
                .notify(Notification {
                    kind,
                    message: "test".to_string(),
                    context: NotificationContext::new(),
                })
                .await;
        }
    }
}
