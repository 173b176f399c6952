//! Keeps the service discovery file in sync with the fetched topology.

use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use std::path::PathBuf;
use std::time::Instant;

use super::{collect_error, MetricsContext, ScrapeTiming, SubCollector};
use crate::deployments::DeploymentInfo;
use crate::error::Error;
use crate::filters::{CollectorName, RegexpFilter};
use crate::service_discovery::{build_target_groups, write_target_groups};

pub struct ServiceDiscoveryCollector {
    ctx: MetricsContext,
    path: PathBuf,
    processes_filter: RegexpFilter,
    template: ScrapeTiming,
}

impl ServiceDiscoveryCollector {
    pub fn new(
        ctx: MetricsContext,
        path: impl Into<PathBuf>,
        processes_filter: RegexpFilter,
    ) -> Result<Self, Error> {
        let template = ScrapeTiming::new(&ctx, "service_discovery", "service discovery")
            .map_err(|e| collect_error(CollectorName::ServiceDiscovery, e))?;
        Ok(Self {
            ctx,
            path: path.into(),
            processes_filter,
            template,
        })
    }
}

impl SubCollector for ServiceDiscoveryCollector {
    fn name(&self) -> CollectorName {
        CollectorName::ServiceDiscovery
    }

    fn desc(&self) -> Vec<&Desc> {
        self.template.desc()
    }

    fn collect(&self, deployments: &[DeploymentInfo]) -> Result<Vec<MetricFamily>, Error> {
        let started = Instant::now();
        let timing = ScrapeTiming::new(&self.ctx, "service_discovery", "service discovery")
            .map_err(|e| collect_error(self.name(), e))?;

        let groups = build_target_groups(deployments, &self.processes_filter);
        write_target_groups(&groups, &self.path)?;

        timing.finish(started);
        Ok(timing.collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::test_support::{context, value};
    use crate::director::{InstanceInfo, ProcessInfo};
    use crate::service_discovery::{TargetGroup, PROCESS_NAME_LABEL};

    fn deployments() -> Vec<DeploymentInfo> {
        vec![DeploymentInfo {
            name: "cf".into(),
            instances: vec![InstanceInfo {
                ips: vec!["10.0.0.1".into()],
                processes: vec![ProcessInfo {
                    name: "node_exporter".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }]
    }

    #[test]
    fn test_writes_file_and_reports_timing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sd.json");
        let collector =
            ServiceDiscoveryCollector::new(context(), &path, RegexpFilter::default()).unwrap();

        let families = collector.collect(&deployments()).unwrap();
        assert!(value(&families, "bosh_last_service_discovery_scrape_timestamp", &[]).unwrap() > 0.0);

        let groups: Vec<TargetGroup> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].labels[PROCESS_NAME_LABEL], "node_exporter");
    }

    #[test]
    fn test_unwritable_destination_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("sd.json");
        let collector =
            ServiceDiscoveryCollector::new(context(), &path, RegexpFilter::default()).unwrap();
        assert!(matches!(collector.collect(&deployments()), Err(Error::Write { .. })));
    }
}
