//! Folds that turn events into dashboard aggregates.
//!
//! Scalar stats and the compliance breakdown are computed over the event set
//! handed in by the caller, which the API narrows with [`events_within`]
//! first. The chart series are computed per bucket from
//! [`crate::binning::assign`].
//!
//! # Known approximations
//!
//! Events carry neither a person/vehicle discriminator nor a zone-entry flag.
//! Vehicle counts are therefore always zero and every event counts as a zone
//! entry. These are kept as-is until the event schema grows the fields.

use std::collections::HashSet;

use chrono::{SecondsFormat, TimeZone, Utc};

use crate::binning::{Binned, assign};
use crate::model::{
    ChartDataPoint, DashboardReport, DashboardStats, DetectionSeries, Event,
    PpeComplianceBreakdown, PpeFlags, ReportRange, TimeSeriesSet,
};
use crate::range::TimeInterval;

/// PPE classification of a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpeStatus {
    Compliant,
    MissingHardHat,
    MissingVest,
    MissingBoth,
}

impl PpeStatus {
    /// Classify helmet/vest flags into exactly one status.
    pub fn classify(flags: &PpeFlags) -> Self {
        match (flags.has_helmet, flags.has_vest) {
            (true, true) => PpeStatus::Compliant,
            (false, true) => PpeStatus::MissingHardHat,
            (true, false) => PpeStatus::MissingVest,
            (false, false) => PpeStatus::MissingBoth,
        }
    }
}

/// Whether an event is a PPE breach (missing helmet or missing vest).
pub fn is_breach(event: &Event) -> bool {
    !event.ppe.has_helmet || !event.ppe.has_vest
}

/// A chartable per-bucket metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Persons,
    Vehicles,
    PpeBreaches,
    ZoneEntries,
}

impl Metric {
    /// Whether `event` counts towards this metric.
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Metric::Persons | Metric::ZoneEntries => true,
            Metric::Vehicles => false,
            Metric::PpeBreaches => is_breach(event),
        }
    }
}

/// Events whose timestamp lies inside `interval`.
///
/// Events without a readable timestamp cannot be placed in any window and
/// are dropped.
pub fn events_within<Tz: TimeZone>(
    events: Vec<Event>,
    interval: &TimeInterval<Tz>,
) -> Vec<Event> {
    events
        .into_iter()
        .filter(|e| e.timestamp.is_some_and(|ts| interval.contains(&ts)))
        .collect()
}

/// Scalar dashboard counters over the given event set.
pub fn dashboard_stats(events: &[Event]) -> DashboardStats {
    let subjects: HashSet<i64> = events.iter().map(|e| e.subject_id).collect();
    let ppe_breaches = events.iter().filter(|e| is_breach(e)).count();

    DashboardStats {
        detected_persons: subjects.len() as u64,
        detected_vehicles: 0,
        ppe_breaches: ppe_breaches as u64,
        forbidden_zone_entries: events.len() as u64,
    }
}

/// Four-way PPE breakdown over the given event set.
pub fn ppe_compliance(events: &[Event]) -> PpeComplianceBreakdown {
    events
        .iter()
        .fold(PpeComplianceBreakdown::default(), |mut acc, event| {
            match PpeStatus::classify(&event.ppe) {
                PpeStatus::Compliant => acc.compliant += 1,
                PpeStatus::MissingHardHat => acc.missing_hard_hat += 1,
                PpeStatus::MissingVest => acc.missing_vest += 1,
                PpeStatus::MissingBoth => acc.missing_both += 1,
            }
            acc
        })
}

/// Count of events in each bucket matching `metric`.
pub fn metric_counts<Tz: TimeZone>(binned: &Binned<'_, Tz>, metric: Metric) -> Vec<u64> {
    binned
        .events
        .iter()
        .map(|bucket| bucket.iter().filter(|e| metric.matches(e)).count() as u64)
        .collect()
}

/// Bar chart series from already binned events.
pub fn detection_series_from<Tz: TimeZone>(binned: &Binned<'_, Tz>) -> DetectionSeries {
    DetectionSeries {
        labels: binned.buckets.iter().map(|b| b.label.clone()).collect(),
        persons: binned.counts(),
        vehicles: metric_counts(binned, Metric::Vehicles),
    }
}

/// Line chart series from already binned events.
pub fn time_series_from<Tz: TimeZone>(binned: &Binned<'_, Tz>) -> TimeSeriesSet {
    let timestamps: Vec<String> = binned
        .buckets
        .iter()
        .map(|b| {
            b.start
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        })
        .collect();

    let series = |metric: Metric| -> Vec<ChartDataPoint> {
        timestamps
            .iter()
            .zip(metric_counts(binned, metric))
            .map(|(timestamp, value)| ChartDataPoint {
                timestamp: timestamp.clone(),
                value,
            })
            .collect()
    };

    TimeSeriesSet {
        persons: series(Metric::Persons),
        vehicles: series(Metric::Vehicles),
        ppe_breaches: series(Metric::PpeBreaches),
        zone_entries: series(Metric::ZoneEntries),
    }
}

/// Detection bar chart for `events` over `interval`.
pub fn detection_series<Tz: TimeZone>(
    events: &[Event],
    interval: &TimeInterval<Tz>,
) -> DetectionSeries {
    detection_series_from(&assign(events, interval))
}

/// Multi-metric time series for `events` over `interval`.
pub fn time_series<Tz: TimeZone>(
    events: &[Event],
    interval: &TimeInterval<Tz>,
) -> TimeSeriesSet {
    time_series_from(&assign(events, interval))
}

/// Build the full dashboard report, binning the events once.
pub fn build_report<Tz: TimeZone>(
    events: &[Event],
    interval: &TimeInterval<Tz>,
) -> DashboardReport {
    let binned = assign(events, interval);

    DashboardReport {
        range: ReportRange {
            start: interval.start.with_timezone(&Utc),
            end: interval.end.with_timezone(&Utc),
            granularity: binned.granularity.name().to_string(),
            bucket_count: binned.buckets.len(),
        },
        stats: dashboard_stats(events),
        compliance: ppe_compliance(events),
        detections: detection_series_from(&binned),
        time_series: time_series_from(&binned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
    }

    fn event(id: i64, subject_id: i64, offset: Duration, helmet: bool, vest: bool) -> Event {
        Event {
            id,
            subject_id,
            zone_id: 1,
            timestamp: Some(start() + offset),
            ppe: PpeFlags {
                has_helmet: helmet,
                has_vest: vest,
            },
            location: "Entrance gate".to_string(),
        }
    }

    fn day() -> TimeInterval<Utc> {
        TimeInterval::new(start(), start() + Duration::hours(12))
    }

    #[test]
    fn test_classify_all_combinations() {
        let cases = [
            (true, true, PpeStatus::Compliant),
            (false, true, PpeStatus::MissingHardHat),
            (true, false, PpeStatus::MissingVest),
            (false, false, PpeStatus::MissingBoth),
        ];
        for (has_helmet, has_vest, expected) in cases {
            let flags = PpeFlags {
                has_helmet,
                has_vest,
            };
            assert_eq!(PpeStatus::classify(&flags), expected);
        }
    }

    #[test]
    fn test_compliance_one_of_each() {
        let events = vec![
            event(1, 1, Duration::hours(1), false, true),
            event(2, 2, Duration::hours(1), true, false),
            event(3, 3, Duration::hours(1), false, false),
            event(4, 4, Duration::hours(1), true, true),
        ];

        let breakdown = ppe_compliance(&events);

        assert_eq!(
            breakdown,
            PpeComplianceBreakdown {
                compliant: 1,
                missing_hard_hat: 1,
                missing_vest: 1,
                missing_both: 1,
            }
        );
        assert_eq!(breakdown.total(), events.len() as u64);
    }

    #[test]
    fn test_stats_counts_distinct_subjects() {
        let events = vec![
            event(1, 10, Duration::hours(1), true, true),
            event(2, 10, Duration::hours(2), false, true),
            event(3, 11, Duration::hours(3), true, false),
        ];

        let stats = dashboard_stats(&events);

        assert_eq!(stats.detected_persons, 2);
        assert_eq!(stats.detected_vehicles, 0);
        assert_eq!(stats.ppe_breaches, 2);
        assert_eq!(stats.forbidden_zone_entries, 3);
    }

    #[test]
    fn test_events_within_keeps_window_only() {
        let mut undated = event(5, 5, Duration::hours(1), true, true);
        undated.timestamp = None;
        let events = vec![
            event(1, 1, Duration::days(-30), false, false),
            event(2, 2, Duration::hours(1), false, true),
            event(3, 3, Duration::hours(12), true, true),
            event(4, 4, Duration::zero(), true, false),
            undated,
        ];

        let kept = events_within(events, &day());
        let ids: Vec<i64> = kept.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 4]);

        let stats = dashboard_stats(&kept);
        assert_eq!(stats.detected_persons, 2);
        assert_eq!(stats.ppe_breaches, 2);
        assert_eq!(stats.forbidden_zone_entries, 2);
        assert_eq!(ppe_compliance(&kept).missing_both, 0);
    }

    #[test]
    fn test_detection_series_aligned() {
        let events = vec![
            event(1, 1, Duration::minutes(90), true, true),
            event(2, 2, Duration::minutes(100), true, true),
            event(3, 3, Duration::hours(5), true, true),
        ];

        let series = detection_series(&events, &day());

        assert_eq!(series.labels.len(), 24);
        assert_eq!(series.persons.len(), 24);
        assert_eq!(series.vehicles.len(), 24);
        assert_eq!(series.labels[1], "1:00");
        assert_eq!(series.persons[1], 2);
        assert_eq!(series.persons[5], 1);
        assert_eq!(series.persons.iter().sum::<u64>(), 3);
        assert!(series.vehicles.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_time_series_metrics() {
        let events = vec![
            event(1, 1, Duration::minutes(30), true, true),
            event(2, 2, Duration::minutes(45), false, true),
            event(3, 3, Duration::hours(2), true, false),
        ];

        let set = time_series(&events, &day());

        assert_eq!(set.persons.len(), 24);
        assert_eq!(set.persons[0].timestamp, "2024-03-15T00:00:00.000Z");
        assert_eq!(set.persons[1].timestamp, "2024-03-15T01:00:00.000Z");
        assert_eq!(set.persons[0].value, 2);
        assert_eq!(set.ppe_breaches[0].value, 1);
        assert_eq!(set.ppe_breaches[2].value, 1);
        assert_eq!(set.zone_entries[2].value, 1);
        assert!(set.vehicles.iter().all(|p| p.value == 0));

        for series in [&set.vehicles, &set.ppe_breaches, &set.zone_entries] {
            let stamps: Vec<_> = series.iter().map(|p| &p.timestamp).collect();
            let expected: Vec<_> = set.persons.iter().map(|p| &p.timestamp).collect();
            assert_eq!(stamps, expected);
        }
    }

    #[test]
    fn test_empty_events_yield_zero_buckets() {
        let interval = TimeInterval::new(start(), start() + Duration::days(60));
        let report = build_report(&[], &interval);

        assert_eq!(report.stats, DashboardStats::default());
        assert_eq!(report.compliance.total(), 0);
        assert_eq!(report.range.granularity, "weekly");
        assert_eq!(report.range.bucket_count, 9);
        assert_eq!(report.detections.persons, vec![0; 9]);
        assert_eq!(report.time_series.zone_entries.len(), 9);
        assert!(report.time_series.persons.iter().all(|p| p.value == 0));
    }

    #[test]
    fn test_report_is_idempotent() {
        let events = vec![
            event(1, 1, Duration::minutes(30), true, true),
            event(2, 2, Duration::hours(7), false, false),
        ];
        let before = events.clone();

        let first = serde_json::to_string(&build_report(&events, &day())).unwrap();
        let second = serde_json::to_string(&build_report(&events, &day())).unwrap();

        assert_eq!(first, second);
        assert_eq!(events, before);
    }
}
