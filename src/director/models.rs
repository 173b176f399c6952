//! Wire types returned by the director API.
//!
//! Vitals are reported by the agent as strings and are parsed when metrics
//! are derived, so a single malformed value only drops that one sample.

use serde::{Deserialize, Deserializer, Serialize};

/// Reads an explicit `null` as the type's default, like a missing field.
///
/// The director reports `null` for fields of instances without a VM or with
/// an unresponsive agent.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response of `GET /info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub uuid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "user_authentication")]
    pub auth: AuthInfo,
}

/// Authentication mode advertised by the director.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthInfo {
    #[serde(default, deserialize_with = "null_as_default", rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl AuthInfo {
    pub fn is_uaa(&self) -> bool {
        self.kind == "uaa"
    }
}

/// One entry of `GET /deployments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub releases: Vec<NameVersion>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stemcells: Vec<NameVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameVersion {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
}

/// Director task as returned by `GET /tasks/<id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
}

impl Task {
    pub fn is_finished(&self) -> bool {
        matches!(self.state.as_str(), "done" | "error" | "cancelled" | "timeout")
    }

    pub fn is_successful(&self) -> bool {
        self.state == "done"
    }
}

/// One line of the `instances?format=full` task result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub agent_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub job_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub az: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ips: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vm_type: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "job_state")]
    pub process_state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bootstrap: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vitals: Vitals,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processes: Vec<ProcessInfo>,
}

impl InstanceInfo {
    pub fn is_running(&self) -> bool {
        self.process_state == "running"
    }

    pub fn az(&self) -> &str {
        self.az.as_deref().unwrap_or("")
    }

    pub fn index_label(&self) -> String {
        self.index.map(|i| i.to_string()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(default, deserialize_with = "null_as_default")]
    pub cpu: CpuVitals,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mem: MemVitals,
    #[serde(default, deserialize_with = "null_as_default")]
    pub swap: MemVitals,
    #[serde(default, deserialize_with = "null_as_default")]
    pub load: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub disk: DiskVitals,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuVitals {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sys: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wait: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemVitals {
    #[serde(default, deserialize_with = "null_as_default")]
    pub kb: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub percent: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskVitals {
    #[serde(default)]
    pub system: Option<DiskUsage>,
    #[serde(default)]
    pub ephemeral: Option<DiskUsage>,
    #[serde(default)]
    pub persistent: Option<DiskUsage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskUsage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub percent: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inode_percent: String,
}

/// A monit-supervised process on an instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub uptime: Uptime,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cpu: ProcessCpu,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mem: ProcessMem,
}

impl ProcessInfo {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Uptime {
    #[serde(default)]
    pub secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessCpu {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessMem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub kb: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub percent: f64,
}
