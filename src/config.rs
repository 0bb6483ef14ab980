//! Runtime configuration for the Sitewatch server.
//!
//! Everything is read from environment variables once at startup and then
//! passed around as plain values. Invalid values fall back to the default
//! with a warning rather than aborting startup.

use chrono::NaiveDate;
use tracing::warn;

use crate::backend::BackendConfig;
use crate::range::default_history_start;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Default location whose events are aggregated when a request names none.
pub const DEFAULT_LOCATION_ID: i64 = 1;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Port the HTTP API listens on.
    pub port: u16,

    /// Monitoring backend connection.
    pub backend: BackendConfig,

    /// Beginning of history for the `all` range.
    pub history_start: NaiveDate,

    /// Location used when a request does not pass `location_id`.
    pub default_location_id: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            backend: BackendConfig::default(),
            history_start: default_history_start(),
            default_location_id: DEFAULT_LOCATION_ID,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Variables
    ///
    /// - `SITEWATCH_PORT`
    /// - `SITEWATCH_BACKEND_URL`
    /// - `SITEWATCH_BACKEND_TIMEOUT_SECS`
    /// - `SITEWATCH_HISTORY_START` (`YYYY-MM-DD`)
    /// - `SITEWATCH_LOCATION_ID`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend = BackendConfig {
            base_url: lookup("SITEWATCH_BACKEND_URL").unwrap_or(defaults.backend.base_url),
            timeout_secs: parse_or(
                &lookup,
                "SITEWATCH_BACKEND_TIMEOUT_SECS",
                defaults.backend.timeout_secs,
            ),
        };

        let history_start = match lookup("SITEWATCH_HISTORY_START") {
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").unwrap_or_else(|e| {
                warn!(value = %raw, error = %e, "Invalid SITEWATCH_HISTORY_START, using default");
                defaults.history_start
            }),
            None => defaults.history_start,
        };

        Self {
            port: parse_or(&lookup, "SITEWATCH_PORT", defaults.port),
            backend,
            history_start,
            default_location_id: parse_or(
                &lookup,
                "SITEWATCH_LOCATION_ID",
                defaults.default_location_id,
            ),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Invalid configuration value, using default");
            default
        }),
        None => default,
    }
}
