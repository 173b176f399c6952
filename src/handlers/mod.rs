//! HTTP endpoint handlers for the exporter.
//!
//! - telemetry path (default `/metrics`): Prometheus metrics endpoint,
//!   behind basic auth when configured
//! - any other path: HTML landing page

pub mod auth;
pub mod metrics;
pub mod root;

use axum::{middleware, routing::get, Router};

use crate::state::SharedState;

// Re-export handlers
pub use auth::basic_auth;
pub use metrics::metrics_handler;
pub use root::root_handler;

/// Builds the exporter router. Basic auth only guards the telemetry route.
pub fn router(state: SharedState) -> Router {
    let telemetry_path = state.config.telemetry_path().to_string();
    Router::new()
        .route(&telemetry_path, get(metrics_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), basic_auth))
        .fallback(root_handler)
        .with_state(state)
}
