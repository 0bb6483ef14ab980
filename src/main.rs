//! Sitewatch - dashboard aggregation for construction-site safety monitoring.
//!
//! # API Endpoints
//!
//! - `GET /stats` - Summary counters
//! - `GET /ppe-compliance` - PPE compliance breakdown
//! - `GET /detection-chart` - Detections per bucket
//! - `GET /chart-data` - Per-metric time series
//! - `GET /dashboard` - All of the above in one response
//! - `GET /locations` - Configured locations
//! - `GET /config/current` - Active location configuration
//! - `GET /config/location/:location_id` - Configuration of one location
//! - `GET /health` - Health check

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sitewatch::api::{AppState, router};
use sitewatch::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("sitewatch=info".parse()?))
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env();

    info!(
        port = config.port,
        backend_url = %config.backend.base_url,
        history_start = %config.history_start,
        location_id = config.default_location_id,
        "Starting Sitewatch server"
    );

    // Create application state
    let state = AppState::from_config(&config);

    // Build router
    let app = router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Sitewatch is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
