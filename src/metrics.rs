//! Exporter self-metrics: build info and HTTP serving telemetry.

use bosh_exporter::build_info::build_info_gauge;
use prometheus::{CounterVec, Gauge, Opts, Registry};

/// Metrics describing the exporter process itself.
#[derive(Clone)]
pub struct ExporterMetrics {
    pub scrape_duration: Gauge,
    pub http_requests_total: CounterVec, // labels: handler, code
}

impl ExporterMetrics {
    pub fn new(registry: &Registry, namespace: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let build_info = build_info_gauge(namespace)?;
        let scrape_duration = Gauge::with_opts(
            Opts::new(
                "exporter_scrape_duration_seconds",
                "Time spent serving the previous metrics request",
            )
            .namespace(namespace),
        )?;
        let http_requests_total = CounterVec::new(
            Opts::new(
                "exporter_http_requests_total",
                "Total HTTP requests served by the exporter",
            )
            .namespace(namespace),
            &["handler", "code"],
        )?;

        registry.register(Box::new(build_info))?;
        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;

        Ok(Self {
            scrape_duration,
            http_requests_total,
        })
    }

    pub fn record_request(&self, handler: &str, code: u16) {
        let code = code.to_string();
        self.http_requests_total
            .with_label_values(&[handler, code.as_str()])
            .inc();
    }
}
