//! Conversion from platform nodes to infrastructure nodes.

use fogmesh_core::labels;
use fogmesh_core::{
    Location, NODE_DEFAULT_HW_CAPS, NODE_DEFAULT_LATITUDE, NODE_DEFAULT_LONGITUDE,
    NODE_DEFAULT_PROFILE_PROBABILITY, Node, NodeProfile,
};
use fogmesh_platform::PlatformNode;
use fogmesh_platform::node::{ADDRESS_INTERNAL_IP, CONDITION_READY, TAINT_NO_SCHEDULE};

/// A node can host workloads when it reports `Ready=True` and carries no
/// `NoSchedule` taint.
pub fn is_eligible(node: &PlatformNode) -> bool {
    let ready = node.condition(CONDITION_READY) == Some("True");
    let tainted = node.spec.taints.iter().any(|t| t.effect == TAINT_NO_SCHEDULE);
    ready && !tainted
}

pub fn to_node(node: &PlatformNode) -> Node {
    let tags = &node.metadata.labels;

    let address = node
        .status
        .addresses
        .iter()
        .find(|a| a.kind == ADDRESS_INTERNAL_IP)
        .or_else(|| node.status.addresses.first())
        .map(|a| a.address.clone())
        .unwrap_or_default();

    let coordinate = |key: &str, default: f64| {
        tags.get(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(default)
    };

    let hw_caps = tags
        .get(labels::HW_CAPS)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .or_else(|| node.status.capacity.get("memory").and_then(|q| parse_quantity(q)))
        .unwrap_or(NODE_DEFAULT_HW_CAPS);

    Node {
        id: node.metadata.uid.clone(),
        name: node.metadata.name.clone(),
        address,
        location: Location {
            longitude: coordinate(labels::LONGITUDE, NODE_DEFAULT_LONGITUDE),
            latitude: coordinate(labels::LATITUDE, NODE_DEFAULT_LATITUDE),
        },
        profiles: vec![NodeProfile {
            probability: NODE_DEFAULT_PROFILE_PROBABILITY,
            hw_caps,
            iot_caps: split_tags(tags.get(labels::IOT_CAPS)),
            sec_caps: split_tags(tags.get(labels::SEC_CAPS)),
        }],
    }
}

fn split_tags(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a platform resource quantity (`"8Gi"`, `"512M"`, `"1024"`) into bytes.
pub fn parse_quantity(quantity: &str) -> Option<u64> {
    const SUFFIXES: &[(&str, u64)] = &[
        ("Ki", 1 << 10),
        ("Mi", 1 << 20),
        ("Gi", 1 << 30),
        ("Ti", 1 << 40),
        ("K", 1_000),
        ("k", 1_000),
        ("M", 1_000_000),
        ("G", 1_000_000_000),
        ("T", 1_000_000_000_000),
    ];

    let quantity = quantity.trim();
    for (suffix, factor) in SUFFIXES {
        if let Some(number) = quantity.strip_suffix(suffix) {
            return number.parse::<u64>().ok()?.checked_mul(*factor);
        }
    }
    quantity.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogmesh_platform::node::{NodeAddress, NodeCondition, Taint};
    use std::collections::BTreeMap;

    fn platform_node(ready: &str) -> PlatformNode {
        let mut node = PlatformNode::default();
        node.metadata.uid = "uid-1".to_string();
        node.metadata.name = "edge-1".to_string();
        node.status.conditions.push(NodeCondition {
            kind: "Ready".to_string(),
            status: ready.to_string(),
        });
        node
    }

    #[test]
    fn ready_untainted_node_is_eligible() {
        assert!(is_eligible(&platform_node("True")));
    }

    #[test]
    fn not_ready_node_is_ineligible() {
        assert!(!is_eligible(&platform_node("False")));
        assert!(!is_eligible(&platform_node("Unknown")));
        assert!(!is_eligible(&PlatformNode::default()));
    }

    #[test]
    fn no_schedule_taint_makes_node_ineligible() {
        let mut node = platform_node("True");
        node.spec.taints.push(Taint {
            key: "node-role.kubernetes.io/control-plane".to_string(),
            value: String::new(),
            effect: "NoSchedule".to_string(),
        });
        assert!(!is_eligible(&node));
    }

    #[test]
    fn prefer_no_schedule_taint_is_tolerated() {
        let mut node = platform_node("True");
        node.spec.taints.push(Taint {
            key: "k".to_string(),
            value: String::new(),
            effect: "PreferNoSchedule".to_string(),
        });
        assert!(is_eligible(&node));
    }

    #[test]
    fn unlabelled_node_gets_defaults() {
        let node = to_node(&platform_node("True"));
        assert_eq!(node.id, "uid-1");
        assert_eq!(node.name, "edge-1");
        assert_eq!(node.address, "");
        assert_eq!(node.location, Location::default());
        assert_eq!(node.profiles.len(), 1);
        assert_eq!(node.profiles[0].probability, 1.0);
        assert_eq!(node.profiles[0].hw_caps, NODE_DEFAULT_HW_CAPS);
        assert!(node.profiles[0].iot_caps.is_empty());
        assert!(node.profiles[0].sec_caps.is_empty());
    }

    #[test]
    fn labels_drive_location_and_capabilities() {
        let mut pn = platform_node("True");
        pn.metadata.labels = BTreeMap::from([
            (labels::LONGITUDE.to_string(), "11.25".to_string()),
            (labels::LATITUDE.to_string(), "43.77".to_string()),
            (labels::IOT_CAPS.to_string(), "camera, gps,,".to_string()),
            (labels::SEC_CAPS.to_string(), "tls".to_string()),
            (labels::HW_CAPS.to_string(), "16".to_string()),
        ]);
        pn.status.capacity.insert("memory".to_string(), "8Gi".to_string());

        let node = to_node(&pn);
        assert_eq!(node.location.longitude, 11.25);
        assert_eq!(node.location.latitude, 43.77);
        assert_eq!(node.profiles[0].iot_caps, vec!["camera", "gps"]);
        assert_eq!(node.profiles[0].sec_caps, vec!["tls"]);
        assert_eq!(node.profiles[0].hw_caps, 16);
    }

    #[test]
    fn memory_capacity_is_used_without_hw_label() {
        let mut pn = platform_node("True");
        pn.status.capacity.insert("memory".to_string(), "2Mi".to_string());
        assert_eq!(to_node(&pn).profiles[0].hw_caps, 2 * 1024 * 1024);
    }

    #[test]
    fn internal_ip_is_preferred() {
        let mut pn = platform_node("True");
        pn.status.addresses = vec![
            NodeAddress {
                kind: "Hostname".to_string(),
                address: "edge-1".to_string(),
            },
            NodeAddress {
                kind: "InternalIP".to_string(),
                address: "10.0.0.7".to_string(),
            },
        ];
        assert_eq!(to_node(&pn).address, "10.0.0.7");

        pn.status.addresses.remove(1);
        assert_eq!(to_node(&pn).address, "edge-1");
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("1024"), Some(1024));
        assert_eq!(parse_quantity("4Ki"), Some(4096));
        assert_eq!(parse_quantity("1Gi"), Some(1 << 30));
        assert_eq!(parse_quantity("3M"), Some(3_000_000));
        assert_eq!(parse_quantity("2T"), Some(2_000_000_000_000));
        assert_eq!(parse_quantity("lots"), None);
        assert_eq!(parse_quantity("1.5Gi"), None);
    }
}
