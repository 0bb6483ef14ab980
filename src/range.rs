//! Range resolution: turns a dashboard range selector into a concrete window.
//!
//! All windows are half-open `[start, end)` and anchored at the caller's
//! "now" in the caller's time zone, so "midnight" always means local midnight
//! for whoever asked.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone};
use tracing::debug;

use crate::model::TimeRangeOption;

/// A half-open time interval `[start, end)` with `start <= end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeInterval<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl<Tz: TimeZone> TimeInterval<Tz> {
    /// Build an interval, swapping the endpoints if they arrive inverted.
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Length of the interval.
    pub fn span(&self) -> chrono::Duration {
        self.end.clone().signed_duration_since(self.start.clone())
    }

    /// Whether `instant` lies inside `[start, end)`.
    pub fn contains<Tz2: TimeZone>(&self, instant: &DateTime<Tz2>) -> bool {
        let ts = instant.timestamp_millis();
        ts >= self.start.timestamp_millis() && ts < self.end.timestamp_millis()
    }
}

/// Date that `all` reaches back to unless configured otherwise.
pub fn default_history_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Resolves [`TimeRangeOption`] selectors into [`TimeInterval`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeResolver {
    /// Beginning of history for the `all` selector.
    pub history_start: NaiveDate,
}

impl Default for RangeResolver {
    fn default() -> Self {
        Self {
            history_start: default_history_start(),
        }
    }
}

impl RangeResolver {
    pub fn new(history_start: NaiveDate) -> Self {
        Self { history_start }
    }

    /// Resolve a selector against `now`.
    ///
    /// # Selectors
    ///
    /// - `day`: local midnight today until now
    /// - `week`: midnight seven calendar days ago until now
    /// - `month`: midnight one calendar month ago until now (day overflow rolls forward)
    /// - `all`: midnight of `history_start` until now
    /// - `custom`: the supplied range; without one it behaves exactly like `day`
    ///
    /// The result always satisfies `start <= end`.
    pub fn resolve<Tz: TimeZone>(
        &self,
        option: TimeRangeOption,
        now: DateTime<Tz>,
        custom: Option<TimeInterval<Tz>>,
    ) -> TimeInterval<Tz> {
        let today = now.date_naive();

        let start_date = match option {
            TimeRangeOption::Day => today,
            TimeRangeOption::Week => today.checked_sub_days(Days::new(7)).unwrap_or(today),
            TimeRangeOption::Month => previous_month(today),
            TimeRangeOption::All => self.history_start,
            TimeRangeOption::Custom => match custom {
                Some(range) => return TimeInterval::new(range.start, range.end),
                None => {
                    debug!("Custom range requested without bounds, using day range");
                    today
                }
            },
        };

        let start = start_of_day(&now.timezone(), start_date)
            .filter(|start| *start <= now)
            .unwrap_or_else(|| now.clone());

        TimeInterval { start, end: now }
    }
}

/// Same day of month one month earlier.
///
/// Days the previous month lacks roll forward into the current one, so
/// 31 March maps to 2 March in a leap year.
fn previous_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = match date.month() {
        1 => (date.year() - 1, 12),
        m => (date.year(), m - 1),
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_days(Days::new(u64::from(date.day0()))))
        .unwrap_or(date)
}

/// First instant of `date` in `tz`, if local midnight exists there.
fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Tz>> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        // Midnight skipped by a DST jump; the first hour of the day is the next best floor
        .or_else(|| {
            tz.from_local_datetime(&(midnight + chrono::Duration::hours(1)))
                .earliest()
        })
}
