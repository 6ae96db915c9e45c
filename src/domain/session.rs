//! Regular trading session hours and the weekday trading calendar.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for SessionHours {
    fn default() -> Self {
        // US equities regular session
        SessionHours {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl SessionHours {
    pub fn open_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.open)
    }

    pub fn close_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.close)
    }

    pub fn length_minutes(&self) -> i64 {
        (self.close - self.open).num_minutes()
    }

    /// True for timestamps in `[open, close)`.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let t = ts.time();
        t >= self.open && t < self.close
    }

    pub fn minutes_since_open(&self, ts: NaiveDateTime) -> i64 {
        (ts - self.open_at(ts.date())).num_minutes()
    }

    pub fn minutes_until_close(&self, ts: NaiveDateTime) -> i64 {
        (self.close_at(ts.date()) - ts).num_minutes()
    }
}

pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Weekdays in `[start, end]`. Exchange holidays are left to the data
/// provider, which reports them as missing data.
pub fn trading_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        if is_trading_day(current) {
            days.push(current);
        }
        current += Duration::days(1);
    }
    days
}

/// Weekdays of one calendar month. Returns an empty list for an invalid month.
pub fn month_trading_days(year: i32, month: u32) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match next_month {
        Some(next) => trading_days(first, next - Duration::days(1)),
        None => Vec::new(),
    }
}
