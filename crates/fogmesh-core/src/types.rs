//! Application and infrastructure model shared across fogmesh crates.
//!
//! Field names on the wire follow the submission format accepted by the
//! API (`t_proc`, `hw_reqs`, `max_latency`, ...).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Hardware capacity assumed for a node that reports none.
pub const NODE_DEFAULT_HW_CAPS: u64 = 9999;
pub const NODE_DEFAULT_LONGITUDE: f64 = 0.0;
pub const NODE_DEFAULT_LATITUDE: f64 = 0.0;
/// Probability of the single profile synthesized for a platform node.
pub const NODE_DEFAULT_PROFILE_PROBABILITY: f64 = 1.0;

// ── Application ────────────────────────────────────────────────────

/// A set of services plus the traffic and latency constraints between them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub services: Vec<Service>,
    #[serde(default)]
    pub flows: Vec<Flow>,
    #[serde(default, rename = "max_latency")]
    pub max_latencies: Vec<MaxLatencyDescription>,
}

impl Application {
    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }
}

/// The unit of placement: exactly one node hosts a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: String,
    /// Processing time estimate.
    pub t_proc: u32,
    /// Hardware requirement, compared against a node profile's `hw_caps`.
    pub hw_reqs: u64,
    #[serde(default)]
    pub iot_reqs: Vec<String>,
    #[serde(default)]
    pub sec_reqs: Vec<String>,
    pub images: Vec<Image>,
}

/// A container image run as part of a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub name: String,
    /// Local images are never pulled.
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<Port>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Port {
    pub name: String,
    pub host_port: u16,
    pub container_port: u16,
    /// Node port to expose on; `0` keeps the port internal.
    #[serde(default)]
    pub expose: u16,
}

impl Port {
    pub fn is_exposed(&self) -> bool {
        self.expose > 0
    }
}

/// Directed bandwidth requirement between two services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flow {
    pub src: String,
    pub dst: String,
    pub bandwidth: u32,
}

/// Maximum cumulative latency along a chain of services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaxLatencyDescription {
    pub chain: Vec<String>,
    pub value: u32,
}

// ── Infrastructure ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Infrastructure {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl Infrastructure {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// A device able to run services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Stable platform-assigned identity.
    pub id: String,
    pub name: String,
    pub address: String,
    pub location: Location,
    pub profiles: Vec<NodeProfile>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            longitude: NODE_DEFAULT_LONGITUDE,
            latitude: NODE_DEFAULT_LATITUDE,
        }
    }
}

/// One mutually exclusive, probability-weighted configuration of a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeProfile {
    pub probability: f64,
    pub hw_caps: u64,
    #[serde(default)]
    pub iot_caps: Vec<String>,
    #[serde(default)]
    pub sec_caps: Vec<String>,
}

/// Directed link between two nodes, identified by node id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub src: String,
    pub dst: String,
    pub probability: f64,
    pub latency: u32,
    pub bandwidth: u32,
}

// ── Placement ──────────────────────────────────────────────────────

/// A complete service → node assignment with its success probability.
///
/// `Placement::default()` stands for "nothing deployed".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Placement {
    pub probability: f64,
    pub assignments: Vec<Assignment>,
}

impl Placement {
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn node_for(&self, service_id: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.service_id == service_id)
            .map(|a| a.node_id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub service_id: String,
    /// Authoritative node identity.
    pub node_id: String,
    pub node_name: String,
}

/// A registered application and its active placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deploy {
    pub application: Application,
    pub placement: Placement,
}

// ── Mode ───────────────────────────────────────────────────────────

/// Which solver rule set a resolution runs against.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Exact rule set.
    #[default]
    Normal,
    /// Faster, approximate rule set.
    Heuristic,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Normal => f.write_str("normal"),
            Mode::Heuristic => f.write_str("heuristic"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Mode::Normal),
            "heuristic" => Ok(Mode::Heuristic),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_submission_json() {
        let json = r#"{
            "id": "app1",
            "name": "demo",
            "services": [{
                "id": "s1",
                "t_proc": 2,
                "hw_reqs": 1,
                "iot_reqs": ["camera"],
                "images": [{
                    "name": "nginx:latest",
                    "ports": [{"name": "web", "host_port": 80, "container_port": 80, "expose": 30080}]
                }]
            }],
            "flows": [{"src": "s1", "dst": "s1", "bandwidth": 5}],
            "max_latency": [{"chain": ["s1"], "value": 10}]
        }"#;

        let app: Application = serde_json::from_str(json).unwrap();
        assert_eq!(app.services.len(), 1);
        assert_eq!(app.services[0].iot_reqs, vec!["camera".to_string()]);
        assert!(app.services[0].sec_reqs.is_empty());
        assert!(app.services[0].images[0].ports[0].is_exposed());
        assert!(!app.services[0].images[0].local);
        assert_eq!(app.max_latencies[0].value, 10);
    }

    #[test]
    fn mode_round_trips_through_strings() {
        assert_eq!("normal".parse::<Mode>().unwrap(), Mode::Normal);
        assert_eq!("Heuristic".parse::<Mode>().unwrap(), Mode::Heuristic);
        assert!("fast".parse::<Mode>().is_err());
        assert_eq!(Mode::Heuristic.to_string(), "heuristic");
    }

    #[test]
    fn placement_lookup_by_service() {
        let placement = Placement {
            probability: 0.5,
            assignments: vec![Assignment {
                service_id: "s1".to_string(),
                node_id: "uid-1".to_string(),
                node_name: "n1".to_string(),
            }],
        };
        assert_eq!(placement.node_for("s1"), Some("uid-1"));
        assert_eq!(placement.node_for("s2"), None);
        assert!(Placement::default().is_empty());
    }
}
