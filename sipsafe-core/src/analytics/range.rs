//! Requested analytics ranges and the time windows they cover.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Time range selectable for historical analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnalyticsRange {
    #[serde(rename = "1d")]
    OneDay,
    #[default]
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "1y")]
    OneYear,
    /// Behaves exactly like one year: the last 12 calendar months.
    #[serde(rename = "all")]
    All,
}

/// Bucket size used for a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Hour-of-day, 24 buckets
    Hour,
    /// Calendar day
    Day,
    /// Calendar month
    Month,
}

impl AnalyticsRange {
    pub const ALL: [AnalyticsRange; 5] = [
        AnalyticsRange::OneDay,
        AnalyticsRange::OneWeek,
        AnalyticsRange::OneMonth,
        AnalyticsRange::OneYear,
        AnalyticsRange::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsRange::OneDay => "1d",
            AnalyticsRange::OneWeek => "1w",
            AnalyticsRange::OneMonth => "1m",
            AnalyticsRange::OneYear => "1y",
            AnalyticsRange::All => "all",
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            AnalyticsRange::OneDay => Granularity::Hour,
            AnalyticsRange::OneWeek | AnalyticsRange::OneMonth => Granularity::Day,
            AnalyticsRange::OneYear | AnalyticsRange::All => Granularity::Month,
        }
    }

    /// Number of buckets the range produces.
    pub fn bucket_count(&self) -> usize {
        match self {
            AnalyticsRange::OneDay => 24,
            AnalyticsRange::OneWeek => 7,
            AnalyticsRange::OneMonth => 30,
            AnalyticsRange::OneYear | AnalyticsRange::All => 12,
        }
    }

    /// Window covered by this range at `now`, evaluated in `now`'s timezone.
    ///
    /// Day and month ranges are aligned to calendar boundaries so that every
    /// in-window record lands in exactly one bucket.
    pub fn window<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Window {
        let tz = now.timezone();
        let today = now.date_naive();
        let now_utc = now.with_timezone(&Utc);

        match self.granularity() {
            Granularity::Hour => Window {
                start: now_utc - Duration::hours(24),
                end: now_utc,
                end_inclusive: true,
                now: now_utc,
            },
            Granularity::Day => {
                let days_back = self.bucket_count() as i64 - 1;
                let first = today - Duration::days(days_back);
                let tomorrow = today + Duration::days(1);
                Window {
                    start: local_midnight(&tz, first),
                    end: local_midnight(&tz, tomorrow),
                    end_inclusive: false,
                    now: now_utc,
                }
            }
            Granularity::Month => {
                let (year, month) = shift_month(today.year(), today.month(), -11);
                let (next_year, next_month) = shift_month(today.year(), today.month(), 1);
                Window {
                    start: local_midnight(&tz, first_of_month(year, month)),
                    end: local_midnight(&tz, first_of_month(next_year, next_month)),
                    end_inclusive: false,
                    now: now_utc,
                }
            }
        }
    }
}

impl fmt::Display for AnalyticsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyticsRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(AnalyticsRange::OneDay),
            "1w" => Ok(AnalyticsRange::OneWeek),
            "1m" => Ok(AnalyticsRange::OneMonth),
            "1y" => Ok(AnalyticsRange::OneYear),
            "all" => Ok(AnalyticsRange::All),
            other => Err(Error::InvalidInput(format!(
                "unknown analytics range '{}' (expected 1d, 1w, 1m, 1y or all)",
                other
            ))),
        }
    }
}

/// Time span records must fall in to be counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The rolling 24h window includes `now` itself
    pub end_inclusive: bool,
    now: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && (ts < self.end || (self.end_inclusive && ts == self.end))
    }

    /// Equal-length span ending where this window starts: `[start - (now - start), start)`.
    pub fn previous_period(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let length = self.now - self.start;
        (self.start - length, self.start)
    }
}

/// Midnight of `date` in `tz`, taking the earlier instant when DST makes it ambiguous.
pub(crate) fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::default());
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        // Midnight skipped by a DST jump: fall back to the same wall time read as UTC
        .unwrap_or_else(|| naive.and_utc())
}

/// Add `delta` months to (year, month).
pub(crate) fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

pub(crate) fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}
