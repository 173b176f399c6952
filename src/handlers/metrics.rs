//! Metrics endpoint handler for Prometheus scraping.
//!
//! Gathering drives a full director scrape, so it runs on the blocking pool
//! and leaves the async workers free for concurrent requests.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    GatherFailed,
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            MetricsError::GatherFailed => "Failed to gather metrics",
            MetricsError::EncodingFailed => "Failed to encode metrics",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}

/// Handler for the telemetry path.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing metrics request");

    let registry = state.registry.clone();
    let families = tokio::task::spawn_blocking(move || registry.gather())
        .await
        .map_err(|e| {
            error!("Metrics gathering task failed: {}", e);
            state.metrics.record_request("metrics", 500);
            MetricsError::GatherFailed
        })?;

    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        state.metrics.record_request("metrics", 500);
        return Err(MetricsError::EncodingFailed);
    }

    let body = String::from_utf8(buffer).map_err(|e| {
        error!("Metrics output is not valid UTF-8: {}", e);
        MetricsError::EncodingFailed
    })?;

    state
        .metrics
        .scrape_duration
        .set(start.elapsed().as_secs_f64());
    state.metrics.record_request("metrics", 200);
    debug!(
        "Metrics request served in {:.3}s ({} families)",
        start.elapsed().as_secs_f64(),
        families.len()
    );

    Ok(body)
}
