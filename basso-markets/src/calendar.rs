//! Market-hour and holiday predicates.
//!
//! Holiday tables are loaded as inert configuration data, never baked into
//! code or mixed with the database (Design Note: "file-based state
//! persistence alongside a database... use files only for inert
//! configuration").

use crate::instrument::Instrument;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Asia::Kolkata;
use chrono_tz::Tz;

/// The single business timezone day semantics are evaluated in.
pub const BUSINESS_TZ: Tz = Kolkata;

/// Market-hour and holiday predicates for an exchange session.
pub trait Calendar: Send + Sync + std::fmt::Debug {
    fn is_holiday(&self, date: NaiveDate) -> bool;
    fn market_open(&self, instrument: Instrument, date: NaiveDate) -> NaiveTime;
    fn market_close(&self, instrument: Instrument, date: NaiveDate) -> NaiveTime;

    fn is_market_open(&self, instrument: Instrument, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&BUSINESS_TZ);
        let date = local.date_naive();
        if self.is_holiday(date) || is_weekend(date) {
            return false;
        }
        let time = local.time();
        time >= self.market_open(instrument, date) && time < self.market_close(instrument, date)
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    use chrono::Datelike;
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

/// A calendar backed by a static holiday list and the documented NSE/MCX
/// session hours.
///
/// NSE (and Bank Nifty) always runs 09:15–15:30 IST. MCX aligns its close
/// with COMEX/US trading hours and therefore shifts with US daylight
/// saving: 23:30 IST while the US observes DST (second Sunday of March
/// through the first Sunday of November), 23:55 IST otherwise.
#[derive(Debug, Clone)]
pub struct StaticCalendar {
    holidays: Vec<NaiveDate>,
}

impl StaticCalendar {
    pub fn new(holidays: Vec<NaiveDate>) -> Self {
        Self { holidays }
    }

    fn mcx_close(&self, date: NaiveDate) -> NaiveTime {
        if us_observes_dst(date) {
            NaiveTime::from_hms_opt(23, 30, 0).unwrap()
        } else {
            NaiveTime::from_hms_opt(23, 55, 0).unwrap()
        }
    }
}

impl Calendar for StaticCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    fn market_open(&self, instrument: Instrument, _date: NaiveDate) -> NaiveTime {
        match instrument {
            Instrument::GoldMini | Instrument::Copper | Instrument::SilverMini => {
                NaiveTime::from_hms_opt(9, 0, 0).unwrap()
            }
            Instrument::BankNifty | Instrument::Nifty | Instrument::Sensex => {
                NaiveTime::from_hms_opt(9, 15, 0).unwrap()
            }
        }
    }

    fn market_close(&self, instrument: Instrument, date: NaiveDate) -> NaiveTime {
        match instrument {
            Instrument::GoldMini | Instrument::Copper | Instrument::SilverMini => self.mcx_close(date),
            Instrument::BankNifty | Instrument::Nifty | Instrument::Sensex => {
                NaiveTime::from_hms_opt(15, 30, 0).unwrap()
            }
        }
    }
}

/// US Eastern daylight saving runs from the second Sunday in March to the
/// first Sunday in November.
fn us_observes_dst(date: NaiveDate) -> bool {
    use chrono::Datelike;
    let year = date.year();
    let dst_start = nth_sunday(year, 3, 2);
    let dst_end = nth_sunday(year, 11, 1);
    date >= dst_start && date < dst_end
}

fn nth_sunday(year: i32, month: u32, n: u32) -> NaiveDate {
    use chrono::Datelike;
    let first_of_month = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let first_weekday = first_of_month.weekday().num_days_from_sunday();
    let offset_to_first_sunday = (7 - first_weekday) % 7;
    let day = 1 + offset_to_first_sunday + 7 * (n - 1);
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Convenience: current instant converted to `Asia/Kolkata`.
pub fn now_ist() -> DateTime<Tz> {
    Utc::now().with_timezone(&BUSINESS_TZ)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcx_close_shifts_with_us_dst() {
        let cal = StaticCalendar::new(vec![]);
        let summer = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let winter = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(
            cal.market_close(Instrument::GoldMini, summer),
            NaiveTime::from_hms_opt(23, 30, 0).unwrap()
        );
        assert_eq!(
            cal.market_close(Instrument::GoldMini, winter),
            NaiveTime::from_hms_opt(23, 55, 0).unwrap()
        );
    }

    #[test]
    fn weekend_and_holiday_close_the_market() {
        let holiday = NaiveDate::from_ymd_opt(2026, 1, 26).unwrap();
        let cal = StaticCalendar::new(vec![holiday]);
        let instant = Kolkata
            .from_local_datetime(&holiday.and_hms_opt(10, 0, 0).unwrap())
            .unwrap()
            .with_timezone(&Utc);
        assert!(!cal.is_market_open(Instrument::BankNifty, instant));
    }

    #[test]
    fn nse_session_hours() {
        let cal = StaticCalendar::new(vec![]);
        let monday = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        assert_eq!(monday.weekday(), chrono::Weekday::Mon);
        let open = Kolkata
            .from_local_datetime(&monday.and_hms_opt(10, 0, 0).unwrap())
            .unwrap()
            .with_timezone(&Utc);
        assert!(cal.is_market_open(Instrument::BankNifty, open));
        let closed = Kolkata
            .from_local_datetime(&monday.and_hms_opt(16, 0, 0).unwrap())
            .unwrap()
            .with_timezone(&Utc);
        assert!(!cal.is_market_open(Instrument::BankNifty, closed));
    }
}
