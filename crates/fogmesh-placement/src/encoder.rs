//! Model encoder: renders models as solver facts.
//!
//! Inputs must already be tokenized; nothing here escapes identifiers.
//! Probabilities are fixed at two decimals so identical inputs produce
//! identical programs.

use fogmesh_core::{Application, Infrastructure};

/// Whether link facts carry their availability probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEncoding {
    /// `0.95::link(a, b, latency, bandwidth).`
    Probabilistic,
    /// `link(a, b, latency, bandwidth).`
    Deterministic,
}

impl LinkEncoding {
    pub fn from_flag(link_probability: bool) -> Self {
        if link_probability {
            LinkEncoding::Probabilistic
        } else {
            LinkEncoding::Deterministic
        }
    }
}

/// Render the facts describing an application.
pub fn encode_application(app: &Application) -> String {
    let mut out = format!("%% application {}\n", app.name);

    let ids: Vec<&str> = app.services.iter().map(|s| s.id.as_str()).collect();
    out.push_str(&format!("chain({}, [{}]).\n", app.name, ids.join(", ")));

    for s in &app.services {
        out.push_str(&format!(
            "service({}, {}, {}, [{}], [{}]).\n",
            s.id,
            s.t_proc,
            s.hw_reqs,
            s.iot_reqs.join(","),
            s.sec_reqs.join(","),
        ));
    }

    for f in &app.flows {
        out.push_str(&format!("flow({}, {}, {}).\n", f.src, f.dst, f.bandwidth));
    }

    for l in &app.max_latencies {
        out.push_str(&format!("maxLatency([{}], {}).\n", l.chain.join(", "), l.value));
    }

    out
}

/// Render the facts describing an infrastructure.
///
/// Every node profile becomes its own probability-weighted `node` fact.
pub fn encode_infrastructure(infra: &Infrastructure, links: LinkEncoding) -> String {
    let mut out = String::from("%% infrastructure\n");

    for n in &infra.nodes {
        for p in &n.profiles {
            out.push_str(&format!(
                "{:.2}::node({}, {}, [{}], [{}]).\n",
                p.probability,
                n.id,
                p.hw_caps,
                p.iot_caps.join(","),
                p.sec_caps.join(","),
            ));
        }
    }

    for l in &infra.links {
        let fact = format!("link({}, {}, {}, {}).", l.src, l.dst, l.latency, l.bandwidth);
        match links {
            LinkEncoding::Probabilistic => {
                out.push_str(&format!("{:.2}::{fact}\n", l.probability));
            }
            LinkEncoding::Deterministic => {
                out.push_str(&fact);
                out.push('\n');
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogmesh_core::*;

    fn app() -> Application {
        Application {
            id: "appid".to_string(),
            name: "appname".to_string(),
            services: vec![
                Service {
                    id: "sa".to_string(),
                    t_proc: 2,
                    hw_reqs: 1,
                    iot_reqs: vec!["cam".to_string(), "gps".to_string()],
                    sec_reqs: vec![],
                    images: vec![],
                },
                Service {
                    id: "sb".to_string(),
                    t_proc: 3,
                    hw_reqs: 4,
                    iot_reqs: vec![],
                    sec_reqs: vec!["tls".to_string()],
                    images: vec![],
                },
            ],
            flows: vec![Flow {
                src: "sa".to_string(),
                dst: "sb".to_string(),
                bandwidth: 10,
            }],
            max_latencies: vec![MaxLatencyDescription {
                chain: vec!["sa".to_string(), "sb".to_string()],
                value: 50,
            }],
        }
    }

    fn infra() -> Infrastructure {
        Infrastructure {
            nodes: vec![Node {
                id: "na".to_string(),
                name: "nname".to_string(),
                address: "naddr".to_string(),
                location: Location::default(),
                profiles: vec![
                    NodeProfile {
                        probability: 0.9,
                        hw_caps: 8,
                        iot_caps: vec!["cam".to_string()],
                        sec_caps: vec![],
                    },
                    NodeProfile {
                        probability: 0.1,
                        hw_caps: 2,
                        iot_caps: vec![],
                        sec_caps: vec!["tls".to_string()],
                    },
                ],
            }],
            links: vec![Link {
                src: "na".to_string(),
                dst: "nb".to_string(),
                probability: 0.75,
                latency: 5,
                bandwidth: 100,
            }],
        }
    }

    #[test]
    fn application_facts() {
        let code = encode_application(&app());
        assert!(code.contains("chain(appname, [sa, sb])."));
        assert!(code.contains("service(sa, 2, 1, [cam,gps], [])."));
        assert!(code.contains("service(sb, 3, 4, [], [tls])."));
        assert!(code.contains("flow(sa, sb, 10)."));
        assert!(code.contains("maxLatency([sa, sb], 50)."));
    }

    #[test]
    fn one_node_fact_per_profile() {
        let code = encode_infrastructure(&infra(), LinkEncoding::Probabilistic);
        assert!(code.contains("0.90::node(na, 8, [cam], [])."));
        assert!(code.contains("0.10::node(na, 2, [], [tls])."));
    }

    #[test]
    fn link_encodings() {
        let weighted = encode_infrastructure(&infra(), LinkEncoding::Probabilistic);
        assert!(weighted.contains("0.75::link(na, nb, 5, 100)."));

        let plain = encode_infrastructure(&infra(), LinkEncoding::Deterministic);
        assert!(plain.contains("\nlink(na, nb, 5, 100).\n"));
        assert!(!plain.contains("::link"));
    }

    #[test]
    fn encoding_is_stable() {
        assert_eq!(encode_application(&app()), encode_application(&app()));
        assert_eq!(
            encode_infrastructure(&infra(), LinkEncoding::Probabilistic),
            encode_infrastructure(&infra(), LinkEncoding::Probabilistic)
        );
    }
}
