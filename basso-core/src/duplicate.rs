//! Thread-safe rolling-window fingerprint set.
//!
//! A `parking_lot`-guarded bounded FIFO-evicted queue of fingerprints,
//! pruned periodically against the configured window.

use basso_markets::clock::Clock;
use basso_markets::signal::{Signal, SignalFingerprint};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateDetectorStats {
    pub checked: u64,
    pub duplicates: u64,
    pub forgotten: u64,
    pub pruned: u64,
}

/// Bounded, FIFO-evicted sequence of fingerprints (default cap 1000),
/// periodically pruned of entries older than `now - window`.
#[derive(Debug)]
pub struct DuplicateDetector {
    clock: Arc<dyn Clock>,
    window: Duration,
    capacity: usize,
    prune_every_n_checks: u32,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    fingerprints: VecDeque<SignalFingerprint>,
    stats: DuplicateDetectorStats,
}

impl DuplicateDetector {
    pub fn new(
        clock: Arc<dyn Clock>,
        window: Duration,
        capacity: usize,
        prune_every_n_checks: u32,
    ) -> Self {
        Self {
            clock,
            window,
            capacity,
            prune_every_n_checks,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Returns `true` and does **not** mutate state if `signal` matches an
    /// existing fingerprint within the window; otherwise records the
    /// fingerprint and returns `false`.
    pub fn is_duplicate(&self, signal: &Signal) -> bool {
        let fingerprint = signal.fingerprint();
        let mut inner = self.inner.lock();
        inner.stats.checked += 1;

        let is_duplicate = inner
            .fingerprints
            .iter()
            .any(|existing| existing.matches(&fingerprint, self.window));

        if is_duplicate {
            inner.stats.duplicates += 1;
            return true;
        }

        if inner.fingerprints.len() >= self.capacity {
            inner.fingerprints.pop_front();
        }
        inner.fingerprints.push_back(fingerprint);

        if inner.stats.checked % u64::from(self.prune_every_n_checks) == 0 {
            self.prune_locked(&mut inner);
        }

        false
    }

    /// Evicts `signal`'s fingerprint so a retried identical signal is
    /// admissible again — called by the engine on any non-duplicate failure
    /// — called on any non-duplicate processing failure.
    pub fn forget(&self, signal: &Signal) {
        let fingerprint = signal.fingerprint();
        let mut inner = self.inner.lock();
        let before = inner.fingerprints.len();
        inner
            .fingerprints
            .retain(|existing| !existing.matches(&fingerprint, self.window));
        if inner.fingerprints.len() < before {
            inner.stats.forgotten += 1;
        }
    }

    pub fn stats(&self) -> DuplicateDetectorStats {
        self.inner.lock().stats
    }

    fn prune_locked(&self, inner: &mut Inner) {
        let now = self.clock.now();
        let before = inner.fingerprints.len();
        inner.fingerprints.retain(|fp| {
            (now - fp.chart_ts)
                .to_std()
                .map(|age| age <= self.window)
                .unwrap_or(true)
        });
        inner.stats.pruned += (before - inner.fingerprints.len()) as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basso_markets::clock::FixedClock;
    use basso_markets::instrument::Instrument;
    use basso_markets::signal::{SignalKind, Slot};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn signal(chart_ts_secs: i64) -> Signal {
        signal_for_slot(1, chart_ts_secs)
    }

    fn signal_for_slot(slot: u8, chart_ts_secs: i64) -> Signal {
        Signal::try_new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Utc.timestamp_opt(1_700_000_000 + chart_ts_secs, 0).unwrap(),
            SignalKind::BaseEntry,
            Instrument::BankNifty,
            Slot::Long(slot),
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

    fn detector() -> DuplicateDetector {
        let clock = Arc::new(FixedClock::new(Utc.timestamp_opt(1_700_000_100, 0).unwrap()));
        DuplicateDetector::new(clock, Duration::from_secs(60), 1000, 50)
    }

    #[test]
    fn second_identical_signal_within_window_is_duplicate() {
        let detector = detector();
        assert!(!detector.is_duplicate(&signal(0)));
        assert!(detector.is_duplicate(&signal(15)));
        assert_eq!(detector.stats().duplicates, 1);
    }

    #[test]
    fn signal_outside_window_is_not_duplicate() {
        let detector = detector();
        assert!(!detector.is_duplicate(&signal(0)));
        assert!(!detector.is_duplicate(&signal(120)));
    }

    #[test]
    fn forget_permits_retry_of_the_same_signal() {
        let detector = detector();
        assert!(!detector.is_duplicate(&signal(0)));
        detector.forget(&signal(0));
        assert!(!detector.is_duplicate(&signal(0)));
        assert_eq!(detector.stats().forgotten, 1);
    }

    #[test]
    fn capacity_evicts_oldest_fingerprint_fifo() {
        let clock = Arc::new(FixedClock::new(Utc.timestamp_opt(1_700_000_100, 0).unwrap()));
        let detector = DuplicateDetector::new(clock, Duration::from_secs(60), 2, 50);
        assert!(!detector.is_duplicate(&signal_for_slot(1, 0)));
        assert!(!detector.is_duplicate(&signal_for_slot(2, 0)));
        assert!(!detector.is_duplicate(&signal_for_slot(3, 0)));
        // slot 1's fingerprint was evicted to keep capacity at 2.
        assert!(!detector.is_duplicate(&signal_for_slot(1, 0)));
    }
}
