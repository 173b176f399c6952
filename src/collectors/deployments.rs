//! Release, stemcell and VM type metrics per deployment.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::GaugeVec;
use std::collections::BTreeMap;
use std::time::Instant;

use super::{collect_error, MetricsContext, ScrapeTiming, SubCollector};
use crate::deployments::DeploymentInfo;
use crate::error::Error;
use crate::filters::CollectorName;

struct DeploymentMetrics {
    release_info: GaugeVec,
    stemcell_info: GaugeVec,
    instances: GaugeVec,
    timing: ScrapeTiming,
}

impl DeploymentMetrics {
    fn new(ctx: &MetricsContext) -> prometheus::Result<Self> {
        Ok(Self {
            release_info: GaugeVec::new(
                ctx.opts(
                    "deployment_release_info",
                    "Labeled BOSH Deployment Release Info with a constant '1' value.",
                ),
                &["bosh_deployment", "bosh_release_name", "bosh_release_version"],
            )?,
            stemcell_info: GaugeVec::new(
                ctx.opts(
                    "deployment_stemcell_info",
                    "Labeled BOSH Deployment Stemcell Info with a constant '1' value.",
                ),
                &["bosh_deployment", "bosh_stemcell_name", "bosh_stemcell_version"],
            )?,
            instances: GaugeVec::new(
                ctx.opts(
                    "deployment_instances",
                    "Number of instances in this deployment per VM type.",
                ),
                &["bosh_deployment", "bosh_vm_type"],
            )?,
            timing: ScrapeTiming::new(ctx, "deployments", "deployment")?,
        })
    }

    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.release_info.desc();
        descs.extend(self.stemcell_info.desc());
        descs.extend(self.instances.desc());
        descs.extend(self.timing.desc());
        descs
    }

    fn record(&self, deployment: &DeploymentInfo) {
        let name = deployment.name.as_str();

        for release in &deployment.releases {
            self.release_info
                .with_label_values(&[name, release.name.as_str(), release.version.as_str()])
                .set(1.0);
        }

        for stemcell in &deployment.stemcells {
            self.stemcell_info
                .with_label_values(&[name, stemcell.name.as_str(), stemcell.version.as_str()])
                .set(1.0);
        }

        let mut per_vm_type: BTreeMap<&str, u64> = BTreeMap::new();
        for instance in &deployment.instances {
            *per_vm_type.entry(instance.vm_type.as_str()).or_default() += 1;
        }
        for (vm_type, count) in per_vm_type {
            self.instances
                .with_label_values(&[name, vm_type])
                .set(count as f64);
        }
    }

    fn families(&self) -> Vec<MetricFamily> {
        let mut families = self.release_info.collect();
        families.extend(self.stemcell_info.collect());
        families.extend(self.instances.collect());
        families.extend(self.timing.collect());
        families
    }
}

/// Emits `deployment_release_info`, `deployment_stemcell_info` and `deployment_instances`.
pub struct DeploymentsCollector {
    ctx: MetricsContext,
    template: DeploymentMetrics,
}

impl DeploymentsCollector {
    pub fn new(ctx: MetricsContext) -> Result<Self, Error> {
        let template =
            DeploymentMetrics::new(&ctx).map_err(|e| collect_error(CollectorName::Deployments, e))?;
        Ok(Self { ctx, template })
    }
}

impl SubCollector for DeploymentsCollector {
    fn name(&self) -> CollectorName {
        CollectorName::Deployments
    }

    fn desc(&self) -> Vec<&Desc> {
        self.template.desc()
    }

    fn collect(&self, deployments: &[DeploymentInfo]) -> Result<Vec<MetricFamily>, Error> {
        let started = Instant::now();
        let metrics =
            DeploymentMetrics::new(&self.ctx).map_err(|e| collect_error(self.name(), e))?;

        for deployment in deployments {
            metrics.record(deployment);
        }

        metrics.timing.finish(started);
        Ok(metrics.families())
    }
}
