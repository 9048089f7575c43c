//! Platform-neutral descriptions of the objects fogmesh creates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullPolicy {
    Always,
    Never,
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullPolicy::Always => f.write_str("Always"),
            PullPolicy::Never => f.write_str("Never"),
        }
    }
}

/// A single-replica workload pinned to one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// Node the workload must run on.
    pub node_name: String,
    pub containers: Vec<ContainerSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub pull_policy: PullPolicy,
    pub privileged: bool,
    /// Sorted by key.
    pub env: Vec<(String, String)>,
    pub ports: Vec<u16>,
}

/// A network endpoint publishing one port of a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureSpec {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// Labels selecting the workload behind the endpoint.
    pub selector: BTreeMap<String, String>,
    pub port: u16,
    pub target_port: u16,
    pub node_port: u16,
}
