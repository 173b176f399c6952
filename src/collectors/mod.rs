//! Prometheus collectors for director topology.
//!
//! This module contains the sub-collectors turning a deployment snapshot
//! into metric families, and `BoshCollector` which runs them on every scrape:
//! - `deployments`: releases, stemcells and instance counts per deployment
//! - `jobs`: per-instance health and vitals, per-process health and usage
//! - `service_discovery`: writes the file-based service discovery document
//! - `bosh`: the registered collector driving fetch and sub-collectors

pub mod bosh;
pub mod deployments;
pub mod jobs;
pub mod service_discovery;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts};
use std::time::Instant;

use crate::deployments::DeploymentInfo;
use crate::error::Error;
use crate::filters::CollectorName;

pub use bosh::BoshCollector;
pub use deployments::DeploymentsCollector;
pub use jobs::JobsCollector;
pub use service_discovery::ServiceDiscoveryCollector;

/// Naming and constant labels shared by every metric of the exporter.
#[derive(Debug, Clone)]
pub struct MetricsContext {
    pub namespace: String,
    pub environment: String,
    pub bosh_name: String,
    pub bosh_uuid: String,
}

impl MetricsContext {
    pub fn opts(&self, name: &str, help: &str) -> Opts {
        Opts::new(name, help)
            .namespace(self.namespace.as_str())
            .const_label("environment", self.environment.as_str())
            .const_label("bosh_name", self.bosh_name.as_str())
            .const_label("bosh_uuid", self.bosh_uuid.as_str())
    }
}

/// One independently switchable collection phase.
pub trait SubCollector: Send + Sync {
    fn name(&self) -> CollectorName;

    /// Descriptors of everything `collect` may emit.
    fn desc(&self) -> Vec<&Desc>;

    /// Derives metric families from one snapshot.
    fn collect(&self, deployments: &[DeploymentInfo]) -> Result<Vec<MetricFamily>, Error>;
}

/// `last_<phase>_scrape_timestamp` and `last_<phase>_scrape_duration_seconds`.
pub(crate) struct ScrapeTiming {
    timestamp: Gauge,
    duration: Gauge,
}

impl ScrapeTiming {
    pub(crate) fn new(ctx: &MetricsContext, phase: &str, title: &str) -> prometheus::Result<Self> {
        Ok(Self {
            timestamp: Gauge::with_opts(ctx.opts(
                &format!("last_{}_scrape_timestamp", phase),
                &format!("Number of seconds since 1970 since last scrape of {} metrics from BOSH.", title),
            ))?,
            duration: Gauge::with_opts(ctx.opts(
                &format!("last_{}_scrape_duration_seconds", phase),
                &format!("Duration of the last scrape of {} metrics from BOSH.", title),
            ))?,
        })
    }

    pub(crate) fn finish(&self, started: Instant) {
        self.timestamp.set(chrono::Utc::now().timestamp() as f64);
        self.duration.set(started.elapsed().as_secs_f64());
    }

    pub(crate) fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.timestamp.desc();
        descs.extend(self.duration.desc());
        descs
    }

    pub(crate) fn collect(&self) -> Vec<MetricFamily> {
        let mut families = self.timestamp.collect();
        families.extend(self.duration.collect());
        families
    }
}

/// Parses a vitals value reported as a string. Empty or malformed values yield `None`.
pub(crate) fn parse_vital(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub(crate) fn collect_error(collector: CollectorName, e: prometheus::Error) -> Error {
    Error::Collect {
        collector: collector.to_string(),
        message: e.to_string(),
    }
}
