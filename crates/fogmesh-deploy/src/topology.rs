//! Infrastructure synthesis from the watcher's node snapshot.
//!
//! The platform reports nodes but no network topology, so links are
//! generated from configuration.

use fogmesh_core::config::{LinkMode, TopologyConfig};
use fogmesh_core::{Infrastructure, Link, Node};

pub fn build_infrastructure(nodes: Vec<Node>, config: &TopologyConfig) -> Infrastructure {
    let links = match config.links {
        LinkMode::None => Vec::new(),
        LinkMode::Complete => nodes
            .iter()
            .flat_map(|src| {
                nodes.iter().filter(move |dst| dst.id != src.id).map(move |dst| Link {
                    src: src.id.clone(),
                    dst: dst.id.clone(),
                    probability: config.probability,
                    latency: config.latency,
                    bandwidth: config.bandwidth,
                })
            })
            .collect(),
    };

    Infrastructure { nodes, links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogmesh_core::Location;

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            name: format!("node-{id}"),
            address: String::new(),
            location: Location::default(),
            profiles: vec![],
        }
    }

    #[test]
    fn complete_graph_links_every_ordered_pair() {
        let infra = build_infrastructure(vec![node("a"), node("b"), node("c")], &TopologyConfig::default());

        assert_eq!(infra.nodes.len(), 3);
        assert_eq!(infra.links.len(), 6);
        assert!(infra.links.iter().all(|l| l.src != l.dst));
        assert!(infra.links.iter().any(|l| l.src == "a" && l.dst == "b"));
        assert!(infra.links.iter().any(|l| l.src == "b" && l.dst == "a"));

        let l = &infra.links[0];
        assert_eq!((l.latency, l.bandwidth, l.probability), (1, 99999, 1.0));
    }

    #[test]
    fn single_node_has_no_links() {
        let infra = build_infrastructure(vec![node("a")], &TopologyConfig::default());
        assert!(infra.links.is_empty());
    }

    #[test]
    fn link_mode_none() {
        let config = TopologyConfig {
            links: LinkMode::None,
            ..TopologyConfig::default()
        };
        let infra = build_infrastructure(vec![node("a"), node("b")], &config);
        assert!(infra.links.is_empty());
        assert_eq!(infra.nodes.len(), 2);
    }
}
