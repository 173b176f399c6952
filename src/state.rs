//! Application state shared by the HTTP handlers.

use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::metrics::ExporterMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub registry: Registry,
    pub metrics: ExporterMetrics,
    pub config: Arc<Config>,
    /// Director name and UUID, shown on the landing page.
    pub director_name: String,
    pub director_uuid: String,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
