//! Platform node model.
//!
//! Mirrors the subset of the Kubernetes `Node` object fogmesh reads. Unknown
//! fields are ignored, and every field defaults so partial objects decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const CONDITION_READY: &str = "Ready";
pub const TAINT_NO_SCHEDULE: &str = "NoSchedule";
pub const ADDRESS_INTERNAL_IP: &str = "InternalIP";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformNode {
    pub metadata: NodeMetadata,
    pub spec: NodeSpec,
    pub status: NodeStatus,
}

impl PlatformNode {
    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Status of condition `kind`, if reported.
    pub fn condition(&self, kind: &str) -> Option<&str> {
        self.status
            .conditions
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.status.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeMetadata {
    pub uid: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub taints: Vec<Taint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Taint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStatus {
    pub addresses: Vec<NodeAddress>,
    pub conditions: Vec<NodeCondition>,
    /// Resource name → quantity string (`"memory": "8Gi"`).
    pub capacity: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAddress {
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeCondition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
}

/// A change to a platform node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    Added(PlatformNode),
    Modified(PlatformNode),
    Deleted(PlatformNode),
}

impl NodeEvent {
    pub fn node(&self) -> &PlatformNode {
        match self {
            NodeEvent::Added(n) | NodeEvent::Modified(n) | NodeEvent::Deleted(n) => n,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NodeEvent::Added(_) => "added",
            NodeEvent::Modified(_) => "modified",
            NodeEvent::Deleted(_) => "deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_kubernetes_node_subset() {
        let json = r#"{
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {
                "uid": "6f1c",
                "name": "edge-1",
                "labels": {"fogmesh.io/iot_caps": "camera,gps"},
                "resourceVersion": "42"
            },
            "spec": {"taints": [{"key": "node.kubernetes.io/unschedulable", "effect": "NoSchedule"}]},
            "status": {
                "addresses": [{"type": "Hostname", "address": "edge-1"}, {"type": "InternalIP", "address": "10.0.0.7"}],
                "conditions": [{"type": "MemoryPressure", "status": "False"}, {"type": "Ready", "status": "True"}],
                "capacity": {"cpu": "4", "memory": "8Gi"}
            }
        }"#;

        let node: PlatformNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.uid(), "6f1c");
        assert_eq!(node.name(), "edge-1");
        assert_eq!(node.spec.taints[0].effect, TAINT_NO_SCHEDULE);
        assert_eq!(node.status.addresses[1].kind, ADDRESS_INTERNAL_IP);
        assert_eq!(node.condition(CONDITION_READY), Some("True"));
        assert_eq!(node.status.capacity.get("memory").map(String::as_str), Some("8Gi"));
    }

    #[test]
    fn missing_sections_default() {
        let node: PlatformNode = serde_json::from_str(r#"{"metadata": {"uid": "u"}}"#).unwrap();
        assert!(node.spec.taints.is_empty());
        assert_eq!(node.condition(CONDITION_READY), None);
    }
}
