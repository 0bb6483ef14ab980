//! Client for the monitoring backend.
//!
//! The backend owns persistence: it stores the events produced by the capture
//! device and the location/zone configuration drawn in the setup UI. This
//! client only reads from it.
//!
//! # Failure handling
//!
//! Every public method maps transport, HTTP status and decoding failures to an
//! explicit "no data" value (`Vec::new()` or `None`) after logging a warning.
//! Aggregation code never sees a backend error.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::Event;
use crate::range::TimeInterval;

/// Where the backend lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Base URL without trailing slash (e.g. "http://127.0.0.1:8000").
    pub base_url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Reasons a backend call produced no data.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend returned {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend reported status '{status}' for {url}")]
    Rejected { url: String, status: String },
}

/// A point of a zone polygon, in snapshot pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A monitored zone as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub zone_id: Option<i64>,
    pub points: Vec<Point>,
    pub name: String,
}

/// A location with its zones and snapshot URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationConfig {
    pub location_id: i64,
    pub location_name: String,
    pub zones: Vec<Zone>,
    /// Absolute URL of the location's reference snapshot.
    pub snapshot_path: String,
}

/// One row of the location picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSummary {
    pub location_id: i64,
    pub location_name: String,
    pub zone_count: i64,
}

#[derive(Debug, Deserialize)]
struct RawZone {
    zone_id: Option<i64>,
    #[serde(default)]
    coords: Vec<Point>,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    location_id: i64,
    location_name: String,
    #[serde(default)]
    zones: Vec<RawZone>,
    snapshot_path: String,
}

#[derive(Debug, Deserialize)]
struct ConfigEnvelope {
    status: String,
    config: Option<RawConfig>,
}

#[derive(Debug, Deserialize)]
struct LocationsEnvelope {
    status: String,
    locations: Option<Vec<LocationSummary>>,
}

/// Read-only client for the monitoring backend.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a client from explicit configuration.
    pub fn new(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    error = %e,
                    timeout_secs = config.timeout_secs,
                    "Failed to build HTTP client, falling back to defaults without timeout"
                );
                reqwest::Client::new()
            });

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the events recorded at a location within `interval`.
    ///
    /// Returns an empty list when the backend is unreachable or answers with
    /// something unusable.
    pub async fn fetch_events<Tz: TimeZone>(
        &self,
        location_id: i64,
        interval: &TimeInterval<Tz>,
    ) -> Vec<Event> {
        let url = format!(
            "{}/events?location_id={}&start={}&end={}",
            self.base_url,
            location_id,
            urlencoding::encode(&rfc3339(&interval.start)),
            urlencoding::encode(&rfc3339(&interval.end)),
        );

        match self.get_json::<Vec<Event>>(&url).await {
            Ok(events) => {
                debug!(location_id, count = events.len(), "Fetched events");
                events
            }
            Err(e) => {
                warn!(location_id, error = %e, "Failed to fetch events, treating as no data");
                Vec::new()
            }
        }
    }

    /// Fetch the currently active location configuration.
    pub async fn fetch_current_config(&self) -> Option<LocationConfig> {
        let url = format!("{}/config/current", self.base_url);
        self.fetch_config(&url).await
    }

    /// Fetch the configuration of a specific location.
    pub async fn fetch_config_by_location(&self, location_id: i64) -> Option<LocationConfig> {
        let url = format!("{}/config/location/{}", self.base_url, location_id);
        self.fetch_config(&url).await
    }

    /// Fetch every known location with its zone count.
    pub async fn fetch_all_locations(&self) -> Vec<LocationSummary> {
        let url = format!("{}/config/locations", self.base_url);

        let result = self
            .get_json::<LocationsEnvelope>(&url)
            .await
            .and_then(|LocationsEnvelope { status, locations }| {
                if status == "success" {
                    Ok(locations.unwrap_or_default())
                } else {
                    Err(BackendError::Rejected {
                        url: url.clone(),
                        status,
                    })
                }
            });

        match result {
            Ok(locations) => locations,
            Err(e) => {
                warn!(error = %e, "Failed to fetch locations, treating as no data");
                Vec::new()
            }
        }
    }

    async fn fetch_config(&self, url: &str) -> Option<LocationConfig> {
        let result = self
            .get_json::<ConfigEnvelope>(url)
            .await
            .and_then(|ConfigEnvelope { status, config }| match config {
                Some(config) if status == "success" => Ok(config),
                _ => Err(BackendError::Rejected {
                    url: url.to_string(),
                    status,
                }),
            });

        match result {
            Ok(raw) => Some(self.to_location_config(raw)),
            Err(e) => {
                warn!(error = %e, "Failed to fetch configuration, treating as no data");
                None
            }
        }
    }

    fn to_location_config(&self, raw: RawConfig) -> LocationConfig {
        LocationConfig {
            location_id: raw.location_id,
            location_name: raw.location_name,
            zones: raw
                .zones
                .into_iter()
                .map(|z| Zone {
                    zone_id: z.zone_id,
                    points: z.coords,
                    name: z.name,
                })
                .collect(),
            snapshot_path: format!("{}{}", self.base_url, raw.snapshot_path),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, BackendError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| BackendError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                url: url.to_string(),
                status,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| BackendError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

fn rfc3339<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}
