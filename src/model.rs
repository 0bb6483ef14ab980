//! Data models for Sitewatch.
//!
//! # Wire Format
//!
//! Events arrive from the monitoring backend as flat camelCase JSON objects.
//! All aggregate types in this module serialize back to camelCase so the
//! dashboard can consume them without any reshaping:
//!
//! - [`DashboardStats`]: scalar counters for the summary cards
//! - [`PpeComplianceBreakdown`]: four-way PPE classification
//! - [`DetectionSeries`]: bar chart labels with index-aligned counts
//! - [`TimeSeriesSet`]: per-metric `{timestamp, value}` arrays
//!
//! Every value here is built fresh per request and never mutated afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Epoch values above this magnitude are read as milliseconds, not seconds.
const EPOCH_MILLIS_THRESHOLD: u64 = 100_000_000_000;

/// A single safety-monitoring event as recorded by the capture device.
///
/// Produced by the backend; the aggregation code only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Backend event identifier.
    pub id: i64,

    /// Tracked subject (track id) that triggered the event.
    pub subject_id: i64,

    /// Zone the subject was detected in.
    pub zone_id: i64,

    /// When the event happened.
    ///
    /// `None` when the backend sent a timestamp that could not be parsed.
    /// Such events fall outside every window and are left out of all aggregates.
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Protective equipment observed on the subject.
    #[serde(flatten)]
    pub ppe: PpeFlags,

    /// Free-form location name (e.g. "Entrance gate").
    #[serde(default)]
    pub location: String,
}

/// Helmet/vest presence flags for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PpeFlags {
    #[serde(default)]
    pub has_helmet: bool,
    #[serde(default)]
    pub has_vest: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Int(i64),
    Float(f64),
    Text(String),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(value) = raw else {
        return Ok(None);
    };

    // Anything we cannot read degrades to "no timestamp" instead of failing the payload
    Ok(match serde_json::from_value::<RawTimestamp>(value) {
        Ok(RawTimestamp::Int(n)) => from_epoch(n),
        Ok(RawTimestamp::Float(f)) if f.is_finite() => from_epoch(f as i64),
        Ok(RawTimestamp::Text(s)) => parse_timestamp(&s),
        _ => None,
    })
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    if n.unsigned_abs() > EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    }
}

/// Parse an event timestamp string.
///
/// Accepts RFC 3339 (`2024-03-01T08:15:00Z`, `...+01:00`) and naive ISO-8601
/// with either a `T` or a space separator. Naive values are local wall-clock
/// time, which is what the capture device writes.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Coarse time range selector offered by the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRangeOption {
    /// Since local midnight.
    #[default]
    Day,
    /// Last seven calendar days.
    Week,
    /// Last calendar month.
    Month,
    /// Since the configured beginning of history.
    All,
    /// Caller supplied bounds.
    Custom,
}

impl TimeRangeOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRangeOption::Day => "day",
            TimeRangeOption::Week => "week",
            TimeRangeOption::Month => "month",
            TimeRangeOption::All => "all",
            TimeRangeOption::Custom => "custom",
        }
    }
}

impl fmt::Display for TimeRangeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRangeOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(TimeRangeOption::Day),
            "week" => Ok(TimeRangeOption::Week),
            "month" => Ok(TimeRangeOption::Month),
            "all" => Ok(TimeRangeOption::All),
            "custom" => Ok(TimeRangeOption::Custom),
            other => Err(format!("unknown time range '{}'", other)),
        }
    }
}

/// Summary counters for the dashboard cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Distinct subjects seen.
    pub detected_persons: u64,

    /// Always zero: events carry no person/vehicle discriminator.
    pub detected_vehicles: u64,

    /// Events missing a helmet or a vest.
    pub ppe_breaches: u64,

    /// Total event count. Events carry no zone-entry flag, so every event counts.
    pub forbidden_zone_entries: u64,
}

/// Exhaustive four-way PPE classification of an event set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PpeComplianceBreakdown {
    pub compliant: u64,
    pub missing_hard_hat: u64,
    pub missing_vest: u64,
    pub missing_both: u64,
}

impl PpeComplianceBreakdown {
    /// Number of classified events.
    pub fn total(&self) -> u64 {
        self.compliant + self.missing_hard_hat + self.missing_vest + self.missing_both
    }
}

/// Bar chart data: labels with index-aligned count arrays of equal length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSeries {
    pub labels: Vec<String>,
    pub persons: Vec<u64>,
    pub vehicles: Vec<u64>,
}

/// One point of a line chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartDataPoint {
    /// Bucket start, RFC 3339 in UTC.
    pub timestamp: String,
    pub value: u64,
}

/// Per-metric time series, all sharing the same bucket timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesSet {
    pub persons: Vec<ChartDataPoint>,
    pub vehicles: Vec<ChartDataPoint>,
    pub ppe_breaches: Vec<ChartDataPoint>,
    pub zone_entries: Vec<ChartDataPoint>,
}

/// The resolved window a report was computed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Granularity name (`hourly`, `weekday`, `daily`, `weekly`).
    pub granularity: String,
    pub bucket_count: usize,
}

/// Everything the dashboard page needs in one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub range: ReportRange,
    pub stats: DashboardStats,
    pub compliance: PpeComplianceBreakdown,
    pub detections: DetectionSeries,
    pub time_series: TimeSeriesSet,
}
