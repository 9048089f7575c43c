//! Provisioner: turns a placement into platform objects.
//!
//! Each assigned service becomes one single-replica workload pinned to its
//! node, plus one exposure per exposed port. Object names are derived from
//! the application, so teardown needs only the application definition.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use fogmesh_core::{Application, Placement, Service, labels};
use fogmesh_platform::{ContainerSpec, ExposureSpec, PlatformClient, PullPolicy, WorkloadSpec};

use crate::error::ProvisionError;

/// Realizes and removes placements. Failures are collected per object.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn apply(&self, app: &Application, placement: &Placement) -> Vec<ProvisionError>;
    async fn teardown(&self, app: &Application) -> Vec<ProvisionError>;
}

pub struct PlatformProvisioner {
    client: Arc<dyn PlatformClient>,
}

impl PlatformProvisioner {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Provisioner for PlatformProvisioner {
    async fn apply(&self, app: &Application, placement: &Placement) -> Vec<ProvisionError> {
        let mut errors = Vec::new();

        for assignment in &placement.assignments {
            let Some(service) = app.service(&assignment.service_id) else {
                errors.push(ProvisionError::UnknownService {
                    application: app.id.clone(),
                    service: assignment.service_id.clone(),
                });
                continue;
            };

            let workload = build_workload(app, service, &assignment.node_name);
            debug!(workload = %workload.name, node = %workload.node_name, "applying workload");
            if let Err(source) = self.client.apply_workload(&workload).await {
                warn!(workload = %workload.name, error = %source, "workload apply failed");
                errors.push(ProvisionError::Platform {
                    object: format!("workload {}", workload.name),
                    source,
                });
            }

            for exposure in build_exposures(app, service) {
                if let Err(source) = self.client.apply_exposure(&exposure).await {
                    warn!(exposure = %exposure.name, error = %source, "exposure apply failed");
                    errors.push(ProvisionError::Platform {
                        object: format!("exposure {}", exposure.name),
                        source,
                    });
                }
            }
        }

        errors
    }

    /// Objects that are already gone count as removed.
    async fn teardown(&self, app: &Application) -> Vec<ProvisionError> {
        let mut errors = Vec::new();

        for service in &app.services {
            let name = workload_name(&app.id, &service.id);
            match self.client.delete_workload(&name).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => debug!(workload = %name, "workload already absent"),
                Err(source) => {
                    warn!(workload = %name, error = %source, "workload delete failed");
                    errors.push(ProvisionError::Platform {
                        object: format!("workload {name}"),
                        source,
                    });
                }
            }

            for port in exposed_ports(service) {
                match self.client.delete_exposure(&port.name).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => debug!(exposure = %port.name, "exposure already absent"),
                    Err(source) => {
                        warn!(exposure = %port.name, error = %source, "exposure delete failed");
                        errors.push(ProvisionError::Platform {
                            object: format!("exposure {}", port.name),
                            source,
                        });
                    }
                }
            }
        }

        errors
    }
}

// ── Object construction ────────────────────────────────────────────

pub fn workload_name(app_id: &str, service_id: &str) -> String {
    format!("{app_id}-{service_id}")
}

pub fn container_name(service_id: &str, image: &str) -> String {
    format!("{service_id}-{}", image.replace(':', ""))
}

pub fn object_labels(app_id: &str, service_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::APP.to_string(), app_id.to_string()),
        (labels::SERVICE.to_string(), service_id.to_string()),
    ])
}

pub fn build_workload(app: &Application, service: &Service, node_name: &str) -> WorkloadSpec {
    let containers = service
        .images
        .iter()
        .map(|image| ContainerSpec {
            name: container_name(&service.id, &image.name),
            image: image.name.clone(),
            pull_policy: if image.local { PullPolicy::Never } else { PullPolicy::Always },
            privileged: image.privileged,
            // BTreeMap iteration is already key-ordered.
            env: image.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ports: image.ports.iter().map(|p| p.container_port).collect(),
        })
        .collect();

    WorkloadSpec {
        name: workload_name(&app.id, &service.id),
        labels: object_labels(&app.id, &service.id),
        node_name: node_name.to_string(),
        containers,
    }
}

pub fn build_exposures(app: &Application, service: &Service) -> Vec<ExposureSpec> {
    let tags = object_labels(&app.id, &service.id);
    exposed_ports(service)
        .map(|port| ExposureSpec {
            name: port.name.clone(),
            labels: tags.clone(),
            selector: tags.clone(),
            port: port.host_port,
            target_port: port.container_port,
            node_port: port.expose,
        })
        .collect()
}

fn exposed_ports(service: &Service) -> impl Iterator<Item = &fogmesh_core::Port> {
    service
        .images
        .iter()
        .flat_map(|image| image.ports.iter())
        .filter(|port| port.is_exposed())
}
