//! Prometheus file-based service discovery output.
//!
//! Writes one target group per process name, listing the IPs of every
//! instance running that process. The file is replaced atomically so
//! Prometheus never reads a half-written document.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::deployments::DeploymentInfo;
use crate::error::Error;
use crate::filters::{Filter, RegexpFilter};

/// Label carrying the process name for relabeling in Prometheus.
pub const PROCESS_NAME_LABEL: &str = "__meta_bosh_job_process_name";

/// One entry of the service discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

/// Groups instance IPs by process name, keeping processes matching `processes_filter`.
///
/// Groups are sorted by process name and targets are sorted and unique.
pub fn build_target_groups(
    deployments: &[DeploymentInfo],
    processes_filter: &RegexpFilter,
) -> Vec<TargetGroup> {
    let mut by_process: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for deployment in deployments {
        for instance in &deployment.instances {
            for process in &instance.processes {
                if !processes_filter.matches(&process.name) {
                    continue;
                }
                by_process
                    .entry(process.name.as_str())
                    .or_default()
                    .extend(instance.ips.iter().map(String::as_str));
            }
        }
    }

    by_process
        .into_iter()
        .map(|(name, ips)| TargetGroup {
            targets: ips.into_iter().map(str::to_string).collect(),
            labels: BTreeMap::from([(PROCESS_NAME_LABEL.to_string(), name.to_string())]),
        })
        .collect()
}

/// Serializes `groups` as JSON and atomically replaces `path` with it.
pub fn write_target_groups(groups: &[TargetGroup], path: &Path) -> Result<(), Error> {
    let write_error = |source: std::io::Error| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    serde_json::to_writer(&mut file, groups).map_err(|e| write_error(e.into()))?;
    file.write_all(b"\n").map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    file.persist(path).map_err(|e| write_error(e.error))?;

    debug!("Wrote {} target groups to {}", groups.len(), path.display());
    Ok(())
}
