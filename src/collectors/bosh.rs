//! The collector registered with the Prometheus registry.
//!
//! Every `collect()` fetches a fresh snapshot from the director and runs the
//! enabled sub-collectors over it. Sample state is rebuilt per call, so
//! overlapping scrapes never observe each other's values. Only the scrape
//! counters are shared.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Counter, Gauge, GaugeVec};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use super::{MetricsContext, SubCollector};
use crate::deployments::Fetcher;
use crate::error::Error;
use crate::filters::CollectorsFilter;

/// Per-scrape health gauges.
struct ScrapeMetrics {
    up: GaugeVec,
    last_scrape_error: Gauge,
    last_scrape_timestamp: Gauge,
    last_scrape_duration: Gauge,
}

impl ScrapeMetrics {
    fn new(ctx: &MetricsContext) -> prometheus::Result<Self> {
        Ok(Self {
            up: GaugeVec::new(
                ctx.opts(
                    "up",
                    "Whether the last scrape of a collector's metrics from BOSH succeeded (1) or not (0).",
                ),
                &["collector"],
            )?,
            last_scrape_error: Gauge::with_opts(ctx.opts(
                "last_scrape_error",
                "Whether the last scrape of metrics from BOSH resulted in an error (1 for error, 0 for success).",
            ))?,
            last_scrape_timestamp: Gauge::with_opts(ctx.opts(
                "last_scrape_timestamp",
                "Number of seconds since 1970 since last scrape from BOSH.",
            ))?,
            last_scrape_duration: Gauge::with_opts(ctx.opts(
                "last_scrape_duration_seconds",
                "Duration of the last scrape from BOSH.",
            ))?,
        })
    }

    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.up.desc();
        descs.extend(self.last_scrape_error.desc());
        descs.extend(self.last_scrape_timestamp.desc());
        descs.extend(self.last_scrape_duration.desc());
        descs
    }

    fn families(&self) -> Vec<MetricFamily> {
        let mut families = self.up.collect();
        families.extend(self.last_scrape_error.collect());
        families.extend(self.last_scrape_timestamp.collect());
        families.extend(self.last_scrape_duration.collect());
        families
    }
}

pub struct BoshCollector {
    ctx: MetricsContext,
    fetcher: Fetcher,
    collectors: Vec<Box<dyn SubCollector>>,
    runtime: Handle,
    scrapes_total: Counter,
    scrape_errors_total: Counter,
    template: ScrapeMetrics,
}

impl BoshCollector {
    /// Builds the collector, keeping only the sub-collectors enabled by `filter`.
    ///
    /// Must be called from within a tokio runtime; its handle drives every
    /// later `collect()`.
    pub fn new(
        ctx: MetricsContext,
        fetcher: Fetcher,
        collectors: Vec<Box<dyn SubCollector>>,
        filter: &CollectorsFilter,
    ) -> Result<Self, Error> {
        let runtime = Handle::try_current().map_err(|e| {
            Error::Config(format!("BOSH collector needs a tokio runtime: {}", e))
        })?;
        let metric_error = |e: prometheus::Error| Error::Config(format!("invalid metric: {}", e));

        let scrapes_total = Counter::with_opts(ctx.opts(
            "scrapes_total",
            "Total number of times BOSH was scraped for metrics.",
        ))
        .map_err(metric_error)?;
        let scrape_errors_total = Counter::with_opts(ctx.opts(
            "scrape_errors_total",
            "Total number of times an error occurred scraping BOSH.",
        ))
        .map_err(metric_error)?;
        let template = ScrapeMetrics::new(&ctx).map_err(metric_error)?;

        let collectors: Vec<_> = collectors
            .into_iter()
            .filter(|c| filter.enabled(c.name()))
            .collect();
        debug!(
            "Enabled collectors: {}",
            collectors
                .iter()
                .map(|c| c.name().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            ctx,
            fetcher,
            collectors,
            runtime,
            scrapes_total,
            scrape_errors_total,
            template,
        })
    }

    /// Runs one collection pass.
    pub async fn scrape(&self) -> Vec<MetricFamily> {
        let started = Instant::now();
        self.scrapes_total.inc();

        let metrics = match ScrapeMetrics::new(&self.ctx) {
            Ok(m) => m,
            Err(e) => {
                error!("Failed to build scrape metrics: {}", e);
                self.scrape_errors_total.inc();
                return self.counters();
            }
        };

        let mut failed = false;
        let mut families = Vec::new();

        match self.fetcher.fetch().await {
            Ok(snapshot) => {
                for failure in &snapshot.failures {
                    warn!("Partial scrape: {}", failure);
                    self.scrape_errors_total.inc();
                    failed = true;
                }

                for collector in &self.collectors {
                    let name = collector.name();
                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| collector.collect(&snapshot.deployments)))
                            .unwrap_or_else(|payload| {
                                Err(Error::Collect {
                                    collector: name.to_string(),
                                    message: panic_message(payload),
                                })
                            });

                    let up = match outcome {
                        Ok(mut collected) => {
                            families.append(&mut collected);
                            1.0
                        }
                        Err(e) => {
                            error!("Error collecting {} metrics: {}", name, e);
                            self.scrape_errors_total.inc();
                            failed = true;
                            0.0
                        }
                    };
                    metrics.up.with_label_values(&[name.as_str()]).set(up);
                }
            }
            Err(e) => {
                error!("Error fetching deployments: {}", e);
                self.scrape_errors_total.inc();
                failed = true;
                for collector in &self.collectors {
                    metrics
                        .up
                        .with_label_values(&[collector.name().as_str()])
                        .set(0.0);
                }
            }
        }

        metrics
            .last_scrape_error
            .set(if failed { 1.0 } else { 0.0 });
        metrics
            .last_scrape_timestamp
            .set(chrono::Utc::now().timestamp() as f64);
        metrics
            .last_scrape_duration
            .set(started.elapsed().as_secs_f64());

        families.extend(metrics.families());
        families.extend(self.counters());
        families
    }

    fn counters(&self) -> Vec<MetricFamily> {
        let mut families = self.scrapes_total.collect();
        families.extend(self.scrape_errors_total.collect());
        families
    }
}

impl Collector for BoshCollector {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.scrapes_total.desc();
        descs.extend(self.scrape_errors_total.desc());
        descs.extend(self.template.desc());
        for collector in &self.collectors {
            descs.extend(collector.desc());
        }
        descs
    }

    /// Blocks on the async scrape. Call through `Registry::gather()` off the
    /// async workers, e.g. from `spawn_blocking`.
    fn collect(&self) -> Vec<MetricFamily> {
        tokio::task::block_in_place(|| self.runtime.block_on(self.scrape()))
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
