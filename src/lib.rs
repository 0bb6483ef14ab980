//! Sitewatch - dashboard aggregation for construction-site safety monitoring.
//!
//! # Overview
//!
//! A capture device tracks people on site, checks them for a helmet and a
//! high-visibility vest, and reports every detection to the monitoring
//! backend as an event. Sitewatch turns those flat event logs into the
//! numbers and charts the dashboard shows: summary counters, a PPE
//! compliance breakdown and bucketed time series.
//!
//! The aggregation core is pure: `(events, time range) -> aggregates`, with
//! no I/O and no shared state. Fetching events is the job of [`backend`].
//!
//! # Modules
//!
//! - [`model`]: Event and aggregate types
//! - [`range`]: Range selector resolution
//! - [`binning`]: Granularity selection, partitioning and event assignment
//! - [`aggregation`]: Folds producing stats, compliance and chart series
//! - [`backend`]: HTTP client for the monitoring backend
//! - [`config`]: Environment-driven configuration
//! - [`api`]: HTTP API handlers

pub mod aggregation;
pub mod api;
pub mod backend;
pub mod binning;
pub mod config;
pub mod model;
pub mod range;
