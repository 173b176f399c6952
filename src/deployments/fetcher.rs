//! Fetches the filtered deployment topology from the director.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, instrument, warn};

use super::{DeploymentInfo, Snapshot};
use crate::director::{DeploymentSummary, Director};
use crate::error::Error;
use crate::filters::{AzsFilter, DeploymentsFilter, Filter};

/// Retrieves deployments and their instances, pruned by the deployment and AZ filters.
pub struct Fetcher {
    director: Arc<dyn Director>,
    deployments_filter: DeploymentsFilter,
    azs_filter: AzsFilter,
}

impl Fetcher {
    pub fn new(
        director: Arc<dyn Director>,
        deployments_filter: DeploymentsFilter,
        azs_filter: AzsFilter,
    ) -> Self {
        Self {
            director,
            deployments_filter,
            azs_filter,
        }
    }

    /// Fetches one snapshot.
    ///
    /// Failing to list deployments fails the whole pass. A deployment whose
    /// instances cannot be fetched is left out and recorded in
    /// `Snapshot::failures`.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<Snapshot, Error> {
        let summaries = self
            .director
            .deployments()
            .await
            .map_err(|e| Error::fetch("deployments", e))?;

        let selected: Vec<DeploymentSummary> = summaries
            .into_iter()
            .filter(|d| self.deployments_filter.matches(&d.name))
            .collect();
        debug!("Fetching instances of {} deployments", selected.len());

        let mut tasks = JoinSet::new();
        for summary in selected {
            let director = Arc::clone(&self.director);
            tasks.spawn(async move {
                let result = director.instance_infos(&summary.name).await;
                (summary, result)
            });
        }

        let mut snapshot = Snapshot::default();
        while let Some(joined) = tasks.join_next().await {
            let (summary, result) = match joined {
                Ok(v) => v,
                Err(e) => {
                    error!("Deployment fetch task failed: {}", e);
                    snapshot.failures.push(Error::Collect {
                        collector: "fetcher".into(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            match result {
                Ok(instances) => {
                    let instances = instances
                        .into_iter()
                        .filter(|i| self.azs_filter.matches(i.az()))
                        .collect();
                    snapshot.deployments.push(DeploymentInfo {
                        name: summary.name,
                        releases: summary.releases,
                        stemcells: summary.stemcells,
                        instances,
                    });
                }
                Err(e) => {
                    warn!("Error fetching instances of deployment `{}`: {}", summary.name, e);
                    snapshot
                        .failures
                        .push(Error::fetch(format!("deployment `{}`", summary.name), e));
                }
            }
        }

        snapshot.deployments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::{ClientError, DirectorInfo, InstanceInfo};
    use async_trait::async_trait;

    struct FakeDirector {
        deployments: Vec<&'static str>,
        failing: Vec<&'static str>,
        list_fails: bool,
    }

    fn instance(job: &str, az: &str) -> InstanceInfo {
        InstanceInfo {
            job_name: job.into(),
            id: format!("{}-id", job),
            az: Some(az.into()),
            ..Default::default()
        }
    }

    fn unavailable() -> ClientError {
        ClientError::Status {
            url: "/deployments".into(),
            status: 500,
            body: "boom".into(),
        }
    }

    #[async_trait]
    impl Director for FakeDirector {
        async fn info(&self) -> Result<DirectorInfo, ClientError> {
            Ok(DirectorInfo::default())
        }

        async fn deployments(&self) -> Result<Vec<DeploymentSummary>, ClientError> {
            if self.list_fails {
                return Err(unavailable());
            }
            Ok(self
                .deployments
                .iter()
                .map(|n| DeploymentSummary {
                    name: n.to_string(),
                    ..Default::default()
                })
                .collect())
        }

        async fn instance_infos(&self, deployment: &str) -> Result<Vec<InstanceInfo>, ClientError> {
            if self.failing.contains(&deployment) {
                return Err(unavailable());
            }
            Ok(vec![instance("web", "z1"), instance("worker", "z2")])
        }
    }

    fn fetcher(director: FakeDirector, deployments: &[&str], azs: &[&str]) -> Fetcher {
        Fetcher::new(
            Arc::new(director),
            DeploymentsFilter::new(deployments),
            AzsFilter::new(azs),
        )
    }

    #[tokio::test]
    async fn test_deployment_filter_prunes_list() {
        let director = FakeDirector {
            deployments: vec!["d2", "d1", "d3"],
            failing: vec![],
            list_fails: false,
        };
        let snapshot = fetcher(director, &["d1", "d3"], &[]).fetch().await.unwrap();
        let names: Vec<_> = snapshot.deployments.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["d1", "d3"]);
        assert!(!snapshot.is_partial());
    }

    #[tokio::test]
    async fn test_az_filter_prunes_instances() {
        let director = FakeDirector {
            deployments: vec!["d1"],
            failing: vec![],
            list_fails: false,
        };
        let snapshot = fetcher(director, &[], &["z2"]).fetch().await.unwrap();
        let instances = &snapshot.deployments[0].instances;
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].job_name, "worker");
    }

    #[tokio::test]
    async fn test_one_failing_deployment_does_not_hide_others() {
        let director = FakeDirector {
            deployments: vec!["d1", "d2", "d3"],
            failing: vec!["d2"],
            list_fails: false,
        };
        let snapshot = fetcher(director, &[], &[]).fetch().await.unwrap();
        let names: Vec<_> = snapshot.deployments.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["d1", "d3"]);
        assert_eq!(snapshot.failures.len(), 1);
        assert!(snapshot.failures[0].to_string().contains("d2"));
    }

    #[tokio::test]
    async fn test_listing_failure_fails_the_pass() {
        let director = FakeDirector {
            deployments: vec![],
            failing: vec![],
            list_fails: true,
        };
        let err = fetcher(director, &[], &[]).fetch().await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }
}
