//! Today's scheduled strategy entries, with lookahead.
//!
//! A per-date cache of today's entries ordered by `entry_time`,
//! `next_entry`/`entries_within`/`is_entry_imminent`/`should_hold_hedges`
//! over that cache.

use basso_markets::clock::Clock;
use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Asia::Kolkata;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Schema for the (conceptual, storage-neutral) `strategy_schedule` table —
/// loadable from a JSON file by `basso verify`/`basso live`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScheduledEntry {
    pub portfolio_name: String,
    pub entry_time: NaiveTime,
    pub exit_time: Option<NaiveTime>,
    pub index_name: String,
    pub expiry_type: String,
    pub day_of_week: Weekday,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingEntry {
    pub entry: ScheduledEntry,
    pub seconds_until: i64,
    pub entry_datetime: DateTime<Utc>,
}

#[derive(Debug)]
struct Cache {
    date: chrono::NaiveDate,
    entries: Vec<ScheduledEntry>,
}

/// Caches today's (IST calendar date) schedule; `clear_cache` forces a
/// reload on the next call, matching the source's `clear_cache` method.
#[derive(Debug)]
pub struct StrategySchedule {
    clock: Arc<dyn Clock>,
    all_entries: Vec<ScheduledEntry>,
    cache: Mutex<Option<Cache>>,
    lookahead_minutes: i64,
    exit_buffer_minutes: i64,
}

impl StrategySchedule {
    pub fn new(
        clock: Arc<dyn Clock>,
        all_entries: Vec<ScheduledEntry>,
        lookahead_minutes: i64,
        exit_buffer_minutes: i64,
    ) -> Self {
        Self {
            clock,
            all_entries,
            cache: Mutex::new(None),
            lookahead_minutes,
            exit_buffer_minutes,
        }
    }

    fn now_ist(&self) -> DateTime<chrono_tz::Tz> {
        self.clock.now().with_timezone(&Kolkata)
    }

    fn today_schedule(&self) -> Vec<ScheduledEntry> {
        let today_ist = self.now_ist();
        let today = today_ist.date_naive();
        let weekday = today_ist.weekday();

        let mut cache = self.cache.lock();
        if let Some(existing) = cache.as_ref() {
            if existing.date == today {
                return existing.entries.clone();
            }
        }

        let mut entries: Vec<ScheduledEntry> = self
            .all_entries
            .iter()
            .filter(|e| e.day_of_week == weekday)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.entry_time);

        *cache = Some(Cache {
            date: today,
            entries: entries.clone(),
        });
        entries
    }

    pub fn clear_cache(&self) {
        *self.cache.lock() = None;
    }

    /// The next scheduled entry still ahead of now, or `None` if the
    /// session's entries have all passed.
    pub fn next_entry(&self) -> Option<UpcomingEntry> {
        let now_ist = self.now_ist();
        let current_time = now_ist.time();

        self.today_schedule()
            .into_iter()
            .find(|entry| entry.entry_time > current_time)
            .map(|entry| self.to_upcoming(entry, now_ist))
    }

    /// All entries whose `entry_time` falls within `minutes` from now.
    pub fn entries_within(&self, minutes: i64) -> Vec<UpcomingEntry> {
        let now_ist = self.now_ist();
        let current_time = now_ist.time();
        let window_end = (now_ist + chrono::Duration::minutes(minutes)).time();

        self.today_schedule()
            .into_iter()
            .filter(|entry| entry.entry_time > current_time && entry.entry_time <= window_end)
            .map(|entry| self.to_upcoming(entry, now_ist))
            .collect()
    }

    /// `true` when `next_entry` falls within `lookahead_minutes`.
    pub fn is_entry_imminent(&self) -> Option<UpcomingEntry> {
        let next = self.next_entry()?;
        (next.seconds_until <= self.lookahead_minutes * 60).then_some(next)
    }

    /// `true` when any entry falls within `exit_buffer_minutes` — holding
    /// hedges through an imminent entry avoids churn.
    pub fn should_hold_hedges(&self) -> bool {
        !self.entries_within(self.exit_buffer_minutes).is_empty()
    }

    fn to_upcoming(&self, entry: ScheduledEntry, now_ist: DateTime<chrono_tz::Tz>) -> UpcomingEntry {
        let entry_datetime_ist = Kolkata
            .from_local_datetime(&now_ist.date_naive().and_time(entry.entry_time))
            .single()
            .unwrap_or_else(|| now_ist);
        let entry_datetime = entry_datetime_ist.with_timezone(&Utc);
        let seconds_until = (entry_datetime - now_ist.with_timezone(&Utc)).num_seconds();

        UpcomingEntry {
            entry,
            seconds_until,
            entry_datetime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basso_markets::clock::FixedClock;
    use chrono::TimeZone;

    fn schedule_with_clock(clock: Arc<FixedClock>) -> StrategySchedule {
        let entries = vec![
            ScheduledEntry {
                portfolio_name: "bank_nifty_am".into(),
                entry_time: NaiveTime::from_hms_opt(9, 25, 0).unwrap(),
                exit_time: None,
                index_name: "BANK_NIFTY".into(),
                expiry_type: "0DTE".into(),
                day_of_week: Weekday::Mon,
            },
            ScheduledEntry {
                portfolio_name: "nifty_straddle".into(),
                entry_time: NaiveTime::from_hms_opt(9, 40, 0).unwrap(),
                exit_time: None,
                index_name: "NIFTY".into(),
                expiry_type: "1DTE".into(),
                day_of_week: Weekday::Mon,
            },
        ];
        StrategySchedule::new(clock, entries, 5, 15)
    }

    // 2024-01-01 is a Monday. 03:50 UTC == 09:20 IST.
    fn monday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 3, 50, 0).unwrap()
    }

    #[test]
    fn next_entry_returns_earliest_entry_still_ahead() {
        let clock = Arc::new(FixedClock::new(monday_morning()));
        let schedule = schedule_with_clock(clock);
        let next = schedule.next_entry().unwrap();
        assert_eq!(next.entry.portfolio_name, "bank_nifty_am");
        assert_eq!(next.seconds_until, 300);
    }

    #[test]
    fn entry_imminent_only_within_lookahead_window() {
        let clock = Arc::new(FixedClock::new(monday_morning()));
        let schedule = schedule_with_clock(clock.clone());
        assert!(schedule.is_entry_imminent().is_some());

        clock.set(Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap());
        schedule.clear_cache();
        assert!(schedule.is_entry_imminent().is_none());
    }

    #[test]
    fn should_hold_hedges_true_within_exit_buffer() {
        let clock = Arc::new(FixedClock::new(monday_morning()));
        let schedule = schedule_with_clock(clock);
        assert!(schedule.should_hold_hedges());
    }

    #[test]
    fn no_entries_left_returns_none() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let schedule = schedule_with_clock(clock);
        assert!(schedule.next_entry().is_none());
        assert!(!schedule.should_hold_hedges());
    }
}
