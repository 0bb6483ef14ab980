//! HTTP API handlers for Sitewatch.
//!
//! Each aggregate route resolves the requested range, pulls the matching
//! events from the monitoring backend and runs them through the binning
//! engine. Backend trouble shows up as empty aggregates, never as a 5xx:
//! the dashboard renders zero-valued charts instead of an error page.
//!
//! # Query Parameters
//!
//! - `range`: `day` (default), `week`, `month`, `all` or `custom`
//! - `start`, `end`: RFC 3339 bounds, used by `custom` when both are present
//! - `location_id`: backend location, defaults to the configured one

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::aggregation::{
    build_report, dashboard_stats, detection_series, events_within, ppe_compliance,
    time_series,
};
use crate::backend::{BackendClient, LocationConfig, LocationSummary};
use crate::config::AppConfig;
use crate::model::{
    DashboardReport, DashboardStats, DetectionSeries, Event, PpeComplianceBreakdown,
    TimeRangeOption, TimeSeriesSet,
};
use crate::range::{RangeResolver, TimeInterval};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: BackendClient,
    pub resolver: RangeResolver,
    pub default_location_id: i64,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            backend: BackendClient::new(&config.backend),
            resolver: RangeResolver::new(config.history_start),
            default_location_id: config.default_location_id,
        }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/ppe-compliance", get(get_ppe_compliance))
        .route("/detection-chart", get(get_detection_chart))
        .route("/chart-data", get(get_chart_data))
        .route("/dashboard", get(get_dashboard))
        .route("/locations", get(get_locations))
        .route("/config/current", get(get_current_config))
        .route("/config/location/:location_id", get(get_location_config))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Query parameters shared by the aggregate endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub range: TimeRangeOption,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location_id: Option<i64>,
}

impl RangeQuery {
    fn custom_range(&self) -> Option<TimeInterval<Local>> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(TimeInterval::new(
                start.with_timezone(&Local),
                end.with_timezone(&Local),
            )),
            _ => None,
        }
    }
}

/// Resolve the requested window and fetch the events that fall inside it.
async fn load_window(state: &AppState, query: &RangeQuery) -> (TimeInterval<Local>, Vec<Event>) {
    let interval = state
        .resolver
        .resolve(query.range, Local::now(), query.custom_range());
    let location_id = query.location_id.unwrap_or(state.default_location_id);

    let fetched = state.backend.fetch_events(location_id, &interval).await;
    let fetched_count = fetched.len();
    let events = events_within(fetched, &interval);

    info!(
        range = %query.range,
        location_id,
        start = %interval.start,
        end = %interval.end,
        fetched = fetched_count,
        events = events.len(),
        "Window loaded"
    );

    (interval, events)
}

/// GET /stats - Summary counters for the dashboard cards.
///
/// # Response
///
/// ```json
/// {
///     "detectedPersons": 12,
///     "detectedVehicles": 0,
///     "ppeBreaches": 3,
///     "forbiddenZoneEntries": 40
/// }
/// ```
#[instrument(skip(state))]
pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Json<DashboardStats> {
    let (_, events) = load_window(&state, &query).await;
    Json(dashboard_stats(&events))
}

/// GET /ppe-compliance - Four-way PPE breakdown.
///
/// # Response
///
/// ```json
/// {
///     "compliant": 30,
///     "missingHardHat": 4,
///     "missingVest": 5,
///     "missingBoth": 1
/// }
/// ```
#[instrument(skip(state))]
pub async fn get_ppe_compliance(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Json<PpeComplianceBreakdown> {
    let (_, events) = load_window(&state, &query).await;
    Json(ppe_compliance(&events))
}

/// GET /detection-chart - Bar chart of detections per bucket.
#[instrument(skip(state))]
pub async fn get_detection_chart(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Json<DetectionSeries> {
    let (interval, events) = load_window(&state, &query).await;
    Json(detection_series(&events, &interval))
}

/// GET /chart-data - Per-metric time series.
///
/// # Response
///
/// ```json
/// {
///     "persons": [{"timestamp": "2024-03-15T00:00:00.000Z", "value": 4}, ...],
///     "vehicles": [...],
///     "ppeBreaches": [...],
///     "zoneEntries": [...]
/// }
/// ```
#[instrument(skip(state))]
pub async fn get_chart_data(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Json<TimeSeriesSet> {
    let (interval, events) = load_window(&state, &query).await;
    Json(time_series(&events, &interval))
}

/// GET /dashboard - All aggregates for one window in a single response.
#[instrument(skip(state))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Json<DashboardReport> {
    let (interval, events) = load_window(&state, &query).await;
    let report = build_report(&events, &interval);

    info!(
        granularity = %report.range.granularity,
        buckets = report.range.bucket_count,
        breaches = report.stats.ppe_breaches,
        "Dashboard report built"
    );

    Json(report)
}

/// GET /locations - All configured locations.
#[instrument(skip(state))]
pub async fn get_locations(State(state): State<AppState>) -> Json<Vec<LocationSummary>> {
    Json(state.backend.fetch_all_locations().await)
}

/// GET /config/current - The active location configuration.
///
/// Returns `404 Not Found` when the backend has no active location or
/// cannot be reached.
#[instrument(skip(state))]
pub async fn get_current_config(
    State(state): State<AppState>,
) -> Result<Json<LocationConfig>, StatusCode> {
    state.backend.fetch_current_config().await.map(Json).ok_or_else(|| {
        warn!("No active configuration available");
        StatusCode::NOT_FOUND
    })
}

/// GET /config/location/:location_id - Configuration of one location.
#[instrument(skip(state))]
pub async fn get_location_config(
    State(state): State<AppState>,
    Path(location_id): Path<i64>,
) -> Result<Json<LocationConfig>, StatusCode> {
    state
        .backend
        .fetch_config_by_location(location_id)
        .await
        .map(Json)
        .ok_or_else(|| {
            warn!(location_id, "Location configuration not available");
            StatusCode::NOT_FOUND
        })
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
