//! Binning engine: granularity selection, partitioning and event assignment.
//!
//! Buckets are produced by fixed-width advance from the interval start. They
//! are never realigned to calendar boundaries; a weekly window starting at
//! 14:00 yields day buckets running 14:00 to 14:00, labelled by the wall
//! clock of each bucket start.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};

use crate::model::Event;
use crate::range::TimeInterval;

const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Longest span rendered with hourly buckets.
const HOURLY_MAX_MS: i64 = 24 * HOUR_MS;
/// Longest span rendered with weekday buckets.
const WEEKDAY_MAX_MS: i64 = 168 * HOUR_MS;
/// Longest span rendered with month/day buckets.
const DAILY_MAX_MS: i64 = 720 * HOUR_MS;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Bucket layout chosen from the span of the requested interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// 24 one-hour buckets labelled `"H:00"`.
    Hourly,
    /// 7 one-day buckets labelled with the weekday short name.
    Weekdays,
    /// `n` one-day buckets labelled `"M/D"`.
    Days(u32),
    /// `n` one-week buckets labelled `"Week N"`.
    Weeks(u32),
}

impl Granularity {
    /// Pick the granularity for an interval span.
    ///
    /// # Thresholds
    ///
    /// Inclusive upper bounds, first match wins:
    ///
    /// - `<= 24h`: [`Granularity::Hourly`]
    /// - `<= 168h`: [`Granularity::Weekdays`]
    /// - `<= 720h`: [`Granularity::Days`] with `ceil(span / 24h)` buckets
    /// - otherwise: [`Granularity::Weeks`] with `ceil(span / 168h)` buckets
    ///
    /// Negative spans are treated as zero, which lands in the hourly branch.
    pub fn for_span(span: Duration) -> Self {
        let ms = span.num_milliseconds().max(0);

        if ms <= HOURLY_MAX_MS {
            Granularity::Hourly
        } else if ms <= WEEKDAY_MAX_MS {
            Granularity::Weekdays
        } else if ms <= DAILY_MAX_MS {
            Granularity::Days(ceil_div(ms, DAY_MS))
        } else {
            Granularity::Weeks(ceil_div(ms, WEEK_MS))
        }
    }

    /// Number of buckets; never zero.
    pub fn bucket_count(&self) -> u32 {
        match *self {
            Granularity::Hourly => 24,
            Granularity::Weekdays => 7,
            Granularity::Days(n) | Granularity::Weeks(n) => n.max(1),
        }
    }

    /// Width of every bucket.
    pub fn width(&self) -> Duration {
        match self {
            Granularity::Hourly => Duration::hours(1),
            Granularity::Weekdays | Granularity::Days(_) => Duration::days(1),
            Granularity::Weeks(_) => Duration::weeks(1),
        }
    }

    /// Short name used in reports and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Weekdays => "weekday",
            Granularity::Days(_) => "daily",
            Granularity::Weeks(_) => "weekly",
        }
    }

    /// Presentation label for the bucket at `index` starting at `start`.
    pub fn label<Tz: TimeZone>(&self, index: usize, start: &DateTime<Tz>) -> String {
        match self {
            Granularity::Hourly => format!("{}:00", start.hour()),
            Granularity::Weekdays => {
                WEEKDAYS[start.weekday().num_days_from_sunday() as usize].to_string()
            }
            Granularity::Days(_) => format!("{}/{}", start.month(), start.day()),
            Granularity::Weeks(_) => format!("Week {}", index + 1),
        }
    }
}

fn ceil_div(value: i64, divisor: i64) -> u32 {
    let quotient = (value + divisor - 1) / divisor;
    u32::try_from(quotient).unwrap_or(u32::MAX).max(1)
}

/// One contiguous slice of the requested interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket<Tz: TimeZone> {
    pub index: usize,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub label: String,
}

/// Split `interval` into `granularity.bucket_count()` contiguous buckets.
///
/// Bucket `i` covers `[start + i*width, start + (i+1)*width)`. When the final
/// bucket straddles `interval.end` its end is clamped to it. Short spans in
/// the hourly and weekday branches produce trailing buckets that lie wholly
/// past `interval.end`; those keep their full width and simply stay empty.
pub fn partition<Tz: TimeZone>(
    interval: &TimeInterval<Tz>,
    granularity: Granularity,
) -> Vec<Bucket<Tz>> {
    let count = granularity.bucket_count() as usize;
    let width = granularity.width();

    let mut buckets = Vec::with_capacity(count);
    let mut start = interval.start.clone();

    for index in 0..count {
        let mut end = start.clone() + width;
        if index + 1 == count && start < interval.end && end > interval.end {
            end = interval.end.clone();
        }

        let label = granularity.label(index, &start);
        buckets.push(Bucket {
            index,
            start,
            end: end.clone(),
            label,
        });
        start = end;
    }

    buckets
}

/// Events partitioned into buckets.
#[derive(Debug, Clone)]
pub struct Binned<'a, Tz: TimeZone> {
    pub granularity: Granularity,
    pub buckets: Vec<Bucket<Tz>>,
    /// Events per bucket, index-aligned with `buckets`.
    pub events: Vec<Vec<&'a Event>>,
    /// Events outside the interval or without a usable timestamp.
    pub dropped: usize,
}

impl<'a, Tz: TimeZone> Binned<'a, Tz> {
    /// Number of events in each bucket.
    pub fn counts(&self) -> Vec<u64> {
        self.events.iter().map(|bucket| bucket.len() as u64).collect()
    }

    /// Number of events that landed in some bucket.
    pub fn assigned(&self) -> usize {
        self.events.iter().map(Vec::len).sum()
    }
}

/// Index of the bucket `timestamp` falls into, if any.
///
/// Returns `None` for instants outside `[interval.start, interval.end)` and
/// for indices past the last bucket.
pub fn bucket_index<Tz: TimeZone, Tz2: TimeZone>(
    interval: &TimeInterval<Tz>,
    granularity: Granularity,
    timestamp: &DateTime<Tz2>,
) -> Option<usize> {
    if !interval.contains(timestamp) {
        return None;
    }

    let offset = timestamp.timestamp_millis() - interval.start.timestamp_millis();
    let index = offset / granularity.width().num_milliseconds();

    usize::try_from(index)
        .ok()
        .filter(|&index| index < granularity.bucket_count() as usize)
}

/// Partition `interval` with the granularity its span calls for and assign
/// each event to exactly one bucket or drop it.
pub fn assign<'a, Tz: TimeZone>(
    events: &'a [Event],
    interval: &TimeInterval<Tz>,
) -> Binned<'a, Tz> {
    let granularity = Granularity::for_span(interval.span());
    let buckets = partition(interval, granularity);

    let mut per_bucket: Vec<Vec<&'a Event>> = vec![Vec::new(); buckets.len()];
    let mut dropped = 0;

    for event in events {
        let index = event
            .timestamp
            .as_ref()
            .and_then(|ts| bucket_index(interval, granularity, ts));

        match index {
            Some(index) => per_bucket[index].push(event),
            None => dropped += 1,
        }
    }

    Binned {
        granularity,
        buckets,
        events: per_bucket,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PpeFlags;
    use chrono::Utc;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn interval(start: DateTime<Utc>, span: Duration) -> TimeInterval<Utc> {
        TimeInterval::new(start, start + span)
    }

    fn event_at(id: i64, timestamp: Option<DateTime<Utc>>) -> Event {
        Event {
            id,
            subject_id: id,
            zone_id: 1,
            timestamp,
            ppe: PpeFlags::default(),
            location: "yard".to_string(),
        }
    }

    fn assert_contiguous(buckets: &[Bucket<Utc>], interval: &TimeInterval<Utc>) {
        assert_eq!(buckets[0].start, interval.start);
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for bucket in buckets {
            assert!(bucket.start < bucket.end, "empty bucket {}", bucket.index);
        }
    }

    #[test]
    fn test_granularity_thresholds() {
        assert_eq!(Granularity::for_span(Duration::zero()), Granularity::Hourly);
        assert_eq!(Granularity::for_span(Duration::hours(24)), Granularity::Hourly);
        assert_eq!(
            Granularity::for_span(Duration::hours(24) + Duration::seconds(1)),
            Granularity::Weekdays
        );
        assert_eq!(Granularity::for_span(Duration::hours(168)), Granularity::Weekdays);
        assert_eq!(Granularity::for_span(Duration::hours(169)), Granularity::Days(8));
        assert_eq!(Granularity::for_span(Duration::hours(720)), Granularity::Days(30));
        assert_eq!(Granularity::for_span(Duration::hours(721)), Granularity::Weeks(5));
        assert_eq!(Granularity::for_span(Duration::hours(-5)), Granularity::Hourly);
    }

    #[test]
    fn test_partial_hour_past_a_day_keeps_a_bucket() {
        let start = at(2024, 3, 15, 0);
        let range = interval(start, Duration::hours(24) + Duration::minutes(30));
        let granularity = Granularity::for_span(range.span());

        assert_eq!(granularity, Granularity::Weekdays);
        assert_eq!(partition(&range, granularity).len(), 7);

        let late = start + Duration::hours(24) + Duration::minutes(15);
        assert_eq!(bucket_index(&range, granularity, &late), Some(1));
    }

    #[test]
    fn test_ten_hours_is_hourly() {
        let start = at(2024, 3, 15, 0);
        let range = interval(start, Duration::hours(10));
        let granularity = Granularity::for_span(range.span());
        let buckets = partition(&range, granularity);

        assert_eq!(granularity, Granularity::Hourly);
        assert_eq!(buckets.len(), 24);
        assert_eq!(buckets[0].label, "0:00");
        assert_eq!(buckets[23].label, "23:00");
        assert_contiguous(&buckets, &range);

        let ts = start + Duration::minutes(210);
        assert_eq!(bucket_index(&range, granularity, &ts), Some(3));
    }

    #[test]
    fn test_five_days_uses_weekday_labels() {
        // 2024-03-17 is a Sunday
        let range = interval(at(2024, 3, 17, 0), Duration::days(5));
        let binned = assign(&[], &range);

        assert_eq!(binned.granularity, Granularity::Weekdays);
        let labels: Vec<_> = binned.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]);
    }

    #[test]
    fn test_ten_days_uses_month_day_labels() {
        let range = interval(at(2024, 2, 25, 0), Duration::days(10));
        let buckets = partition(&range, Granularity::for_span(range.span()));

        assert_eq!(buckets.len(), 10);
        assert_eq!(buckets[0].label, "2/25");
        assert_eq!(buckets[4].label, "2/29");
        assert_eq!(buckets[5].label, "3/1");
        assert_eq!(buckets[9].end, range.end);
        assert_contiguous(&buckets, &range);
    }

    #[test]
    fn test_weekly_labels_and_clamped_end() {
        let range = interval(at(2024, 1, 1, 0), Duration::days(45) + Duration::hours(6));
        let granularity = Granularity::for_span(range.span());
        let buckets = partition(&range, granularity);

        assert_eq!(granularity, Granularity::Weeks(7));
        assert_eq!(buckets[0].label, "Week 1");
        assert_eq!(buckets[6].label, "Week 7");
        assert_eq!(buckets[6].end, range.end);
        assert_contiguous(&buckets, &range);
    }

    #[test]
    fn test_exact_multiple_ends_on_interval_end() {
        let range = interval(at(2024, 1, 1, 0), Duration::days(20));
        let buckets = partition(&range, Granularity::for_span(range.span()));

        assert_eq!(buckets.len(), 20);
        assert_eq!(buckets[19].end, range.end);
        assert_eq!(buckets[19].end - buckets[19].start, Duration::days(1));
    }

    #[test]
    fn test_mid_day_start_drifts_labels() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap();
        let range = interval(start, Duration::days(12));
        let buckets = partition(&range, Granularity::for_span(range.span()));

        assert_eq!(buckets[1].start, Utc.with_ymd_and_hms(2024, 3, 2, 14, 0, 0).unwrap());
        assert_eq!(buckets[1].label, "3/2");
    }

    #[test]
    fn test_zero_span_still_yields_hourly_buckets() {
        let now = at(2024, 3, 15, 9);
        let range = TimeInterval::new(now, now);
        let events = [event_at(1, Some(now))];
        let binned = assign(&events, &range);

        assert_eq!(binned.buckets.len(), 24);
        assert_eq!(binned.buckets[0].label, "9:00");
        assert_eq!(binned.assigned(), 0);
        assert_eq!(binned.dropped, 1);
    }

    #[test]
    fn test_assignment_conserves_events() {
        let start = at(2024, 3, 10, 0);
        let range = interval(start, Duration::days(3));
        let events = vec![
            event_at(1, Some(start)),
            event_at(2, Some(start + Duration::hours(30))),
            event_at(3, Some(start + Duration::hours(71))),
            event_at(4, Some(start - Duration::seconds(1))),
            event_at(5, Some(range.end)),
            event_at(6, None),
        ];

        let binned = assign(&events, &range);

        assert_eq!(binned.counts(), vec![1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(binned.dropped, 3);
        assert_eq!(binned.assigned() + binned.dropped, events.len());
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let start = at(2024, 3, 10, 0);
        let range = interval(start, Duration::days(40));
        let events: Vec<_> = (0..50)
            .map(|i| event_at(i, Some(start + Duration::hours(i * 19))))
            .collect();

        let first = assign(&events, &range);
        let second = assign(&events, &range);

        assert_eq!(first.counts(), second.counts());
        assert_eq!(first.buckets, second.buckets);
        assert_eq!(first.dropped, second.dropped);
    }
}
