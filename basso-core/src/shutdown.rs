//! Graceful-shutdown signal: refuse new webhooks, allow in-flight signals to
//! reach a terminal state, flush audit writes, then exit.
//!
//! A `tokio::sync::watch<bool>` broadcasts the shutdown request to every
//! long-lived loop (the margin-snapshot ticker, the hedge-tick ticker); each
//! loop's `tokio::select!` races its own ticker against `ShutdownSignal::
//! recv`'s `changed()` and breaks out cleanly instead of being aborted
//! mid-iteration.

use tokio::sync::watch;

/// Sending half: held by the process's top-level command loop.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    sender: watch::Sender<bool>,
}

impl ShutdownSignal {
    /// Returns the signal plus one receiver; clone the receiver per task
    /// with `ShutdownSignal::subscribe`.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Marks shutdown requested. Idempotent — a second call is a no-op
    /// beyond re-sending the same `true` value.
    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }
}

/// `true` once `ShutdownSignal::trigger` has been called, for loops that
/// poll rather than `select!` on a fast-changing condition.
pub async fn wait_for_shutdown(receiver: &mut watch::Receiver<bool>) {
    loop {
        if *receiver.borrow() {
            return;
        }
        if receiver.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_every_subscriber() {
        let (signal, _root_receiver) = ShutdownSignal::new();
        let mut a = signal.subscribe();
        let mut b = signal.subscribe();

        signal.trigger();

        wait_for_shutdown(&mut a).await;
        wait_for_shutdown(&mut b).await;
    }

    #[tokio::test]
    async fn wait_returns_immediately_once_already_triggered() {
        let (signal, mut receiver) = ShutdownSignal::new();
        signal.trigger();
        // Should not hang even though no further send happens.
        wait_for_shutdown(&mut receiver).await;
    }
}
