//! Deployment topology snapshots.
//!
//! A `Snapshot` is produced by the `Fetcher` once per scrape and then only
//! read by the collectors.

pub mod fetcher;

use crate::director::{InstanceInfo, NameVersion};
use crate::error::Error;

pub use fetcher::Fetcher;

/// A deployment with its full instance topology.
#[derive(Debug, Clone, Default)]
pub struct DeploymentInfo {
    pub name: String,
    pub releases: Vec<NameVersion>,
    pub stemcells: Vec<NameVersion>,
    pub instances: Vec<InstanceInfo>,
}

/// Result of one fetch pass.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Deployments fetched successfully, ordered by name.
    pub deployments: Vec<DeploymentInfo>,
    /// Deployments whose instances could not be fetched.
    pub failures: Vec<Error>,
}

impl Snapshot {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}
