//! Deployment manager: the registry of deployed applications.
//!
//! The `Manager` drives every application through
//! Absent → Deployed → (Redeploying → Deployed)* → Absent:
//! - `add_application` places and provisions a new application, or
//!   redeploys one that is already registered;
//! - `delete_application` tears an application down and forgets it;
//! - `redeploy_all` re-places every registered application concurrently,
//!   typically after a topology change.
//!
//! The registry lock is never held across a resolver or provisioner call.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{RwLock, broadcast, watch};
use tracing::{debug, error, info, warn};

use fogmesh_core::config::{PartialApplyPolicy, TopologyConfig};
use fogmesh_core::{Application, Deploy, FogConfig, Infrastructure, Mode, Node, Placement};
use fogmesh_placement::PlacementEngine;
use fogmesh_watcher::{InfrastructureWatcher, TopologyChange};

use crate::error::{DeployError, DeployErrors, DeployResult};
use crate::provisioner::Provisioner;
use crate::topology::build_infrastructure;

/// Source of the nodes a placement may use.
#[async_trait]
pub trait NodeInventory: Send + Sync {
    async fn nodes(&self) -> Vec<Node>;
}

#[async_trait]
impl NodeInventory for InfrastructureWatcher {
    async fn nodes(&self) -> Vec<Node> {
        InfrastructureWatcher::nodes(self).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    pub mode: Mode,
    pub partial_apply: PartialApplyPolicy,
    pub topology: TopologyConfig,
}

impl ManagerConfig {
    pub fn from_config(config: &FogConfig) -> Self {
        Self {
            mode: config.deploy.mode,
            partial_apply: config.deploy.partial_apply,
            topology: config.topology.clone(),
        }
    }
}

pub struct Manager {
    engine: Arc<dyn PlacementEngine>,
    provisioner: Arc<dyn Provisioner>,
    inventory: Arc<dyn NodeInventory>,
    config: ManagerConfig,
    /// Registered deploys: application id → deploy.
    registry: RwLock<BTreeMap<String, Deploy>>,
}

impl Manager {
    pub fn new(
        engine: Arc<dyn PlacementEngine>,
        provisioner: Arc<dyn Provisioner>,
        inventory: Arc<dyn NodeInventory>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            engine,
            provisioner,
            inventory,
            config,
            registry: RwLock::new(BTreeMap::new()),
        }
    }

    // ── Queries ────────────────────────────────────────────────────

    pub async fn get_deploy_by_application_id(&self, id: &str) -> Option<Deploy> {
        self.registry.read().await.get(id).cloned()
    }

    pub async fn deployments(&self) -> Vec<Deploy> {
        self.registry.read().await.values().cloned().collect()
    }

    // ── Operations ─────────────────────────────────────────────────

    /// Deploy `app`, or redeploy it if an application with the same id is
    /// already registered.
    pub async fn add_application(&self, app: Application) -> DeployResult {
        let previous = self.get_deploy_by_application_id(&app.id).await;
        match previous {
            None => self.deploy_new(app).await,
            Some(previous) => {
                info!(app = %app.id, "application already registered; redeploying");
                self.redeploy(previous, app).await
            }
        }
    }

    /// Tear down every object of a registered application and forget it.
    ///
    /// The record is removed even when some teardowns fail; those failures
    /// are returned.
    pub async fn delete_application(&self, app_id: &str) -> DeployResult {
        let deploy = self
            .get_deploy_by_application_id(app_id)
            .await
            .ok_or_else(|| DeployError::NotFound(app_id.to_string()))?;

        let errors = if deploy.placement.is_empty() {
            Vec::new()
        } else {
            self.provisioner.teardown(&deploy.application).await
        };

        self.registry.write().await.remove(app_id);

        if errors.is_empty() {
            info!(app = %app_id, "application deleted");
        } else {
            warn!(app = %app_id, failures = errors.len(), "application deleted with teardown failures");
        }
        DeployErrors::from_provision(app_id, errors).into_result()
    }

    /// Re-place every registered application, one task per application.
    ///
    /// Failures of one application never affect another; every failure is
    /// reported in the aggregate.
    pub async fn redeploy_all(self: &Arc<Self>) -> DeployResult {
        let ids: Vec<String> = self.registry.read().await.keys().cloned().collect();
        if ids.is_empty() {
            debug!("no applications to redeploy");
            return Ok(());
        }

        info!(count = ids.len(), "redeploying all applications");

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let manager = Arc::clone(self);
                let task_id = id.clone();
                let handle = tokio::spawn(async move { manager.redeploy_registered(&task_id).await });
                (id, handle)
            })
            .collect();

        let mut errors = DeployErrors::default();
        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.extend(e.0),
                Err(join) => {
                    error!(app = %id, error = %join, "redeploy task failed");
                    errors.push(DeployError::TaskFailed {
                        application: id,
                        reason: join.to_string(),
                    });
                }
            }
        }

        errors.into_result()
    }

    /// Redeploy every registered application whenever the topology changes,
    /// until `shutdown` fires. Bursts of changes collapse into one pass.
    pub async fn watch_infrastructure(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<TopologyChange>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("watching infrastructure changes");

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(change) => debug!(?change, "topology changed"),
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "topology changes coalesced"),
                    Err(RecvError::Closed) => {
                        debug!("topology change channel closed");
                        break;
                    }
                },
                _ = shutdown.changed() => break,
            }

            loop {
                match changes.try_recv() {
                    Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }

            match self.redeploy_all().await {
                Ok(()) => info!("redeploy after topology change complete"),
                Err(e) => warn!(failures = e.len(), error = %e, "redeploy after topology change had failures"),
            }
        }

        info!("infrastructure change loop stopped");
    }

    // ── Internals ──────────────────────────────────────────────────

    async fn infrastructure(&self) -> Infrastructure {
        build_infrastructure(self.inventory.nodes().await, &self.config.topology)
    }

    async fn resolve(&self, app: &Application) -> Result<Placement, DeployError> {
        let infra = self.infrastructure().await;
        debug!(app = %app.id, nodes = infra.nodes.len(), links = infra.links.len(), "resolving placement");
        self.engine
            .resolve(self.config.mode, app, &infra)
            .await
            .map_err(|source| DeployError::Placement {
                application: app.id.clone(),
                source,
            })
    }

    async fn deploy_new(&self, app: Application) -> DeployResult {
        let placement = self.resolve(&app).await?;

        let failures = self.provisioner.apply(&app, &placement).await;
        if failures.is_empty() {
            info!(app = %app.id, probability = placement.probability, "application deployed");
            self.insert(Deploy { application: app, placement }).await;
            return Ok(());
        }

        let mut errors = DeployErrors::from_provision(&app.id, failures);
        match self.config.partial_apply {
            PartialApplyPolicy::Report => {
                warn!(app = %app.id, failures = errors.len(), "application partially deployed");
                self.insert(Deploy { application: app, placement }).await;
            }
            PartialApplyPolicy::Rollback => {
                warn!(app = %app.id, failures = errors.len(), "partial deploy; rolling back");
                let teardown = self.provisioner.teardown(&app).await;
                if !teardown.is_empty() {
                    warn!(app = %app.id, failures = teardown.len(), "rollback incomplete; application stays registered");
                    errors.extend(DeployErrors::from_provision(&app.id, teardown).0);
                    self.insert(Deploy { application: app, placement }).await;
                }
            }
        }
        Err(errors)
    }

    async fn redeploy_registered(&self, app_id: &str) -> DeployResult {
        let Some(current) = self.get_deploy_by_application_id(app_id).await else {
            debug!(app = %app_id, "application removed before redeploy");
            return Ok(());
        };
        let app = current.application.clone();
        self.redeploy(current, app).await
    }

    /// Tear down `previous` and deploy `app` in its place.
    async fn redeploy(&self, previous: Deploy, app: Application) -> DeployResult {
        if !previous.placement.is_empty() {
            let failures = self.provisioner.teardown(&previous.application).await;
            if !failures.is_empty() {
                warn!(app = %app.id, failures = failures.len(), "teardown failed; keeping previous deploy");
                return Err(DeployErrors::from_provision(&previous.application.id, failures));
            }
        }

        let placement = match self.resolve(&app).await {
            Ok(placement) => placement,
            Err(e) => {
                warn!(app = %app.id, error = %e, "re-placement failed; application left undeployed");
                self.write_back(Deploy { application: app, placement: Placement::default() })
                    .await;
                return Err(e.into());
            }
        };

        let failures = self.provisioner.apply(&app, &placement).await;
        if failures.is_empty() {
            info!(app = %app.id, probability = placement.probability, "application redeployed");
            return self.write_back_or_discard(app, placement).await;
        }

        let mut errors = DeployErrors::from_provision(&app.id, failures);
        match self.config.partial_apply {
            PartialApplyPolicy::Report => {
                warn!(app = %app.id, failures = errors.len(), "application partially redeployed");
                if let Err(discard) = self.write_back_or_discard(app, placement).await {
                    errors.extend(discard.0);
                }
            }
            PartialApplyPolicy::Rollback => {
                warn!(app = %app.id, failures = errors.len(), "partial redeploy; rolling back");
                let teardown = self.provisioner.teardown(&app).await;
                let placement = if teardown.is_empty() {
                    Placement::default()
                } else {
                    warn!(app = %app.id, failures = teardown.len(), "rollback incomplete; keeping placement");
                    errors.extend(DeployErrors::from_provision(&app.id, teardown).0);
                    placement
                };
                if let Err(discard) = self.write_back_or_discard(app, placement).await {
                    errors.extend(discard.0);
                }
            }
        }
        Err(errors)
    }

    /// Record a redeploy result. If the application was deleted while it
    /// was being provisioned, tear down what was just created instead.
    async fn write_back_or_discard(&self, app: Application, placement: Placement) -> DeployResult {
        if placement.is_empty() {
            self.write_back(Deploy { application: app, placement }).await;
            return Ok(());
        }

        let app_id = app.id.clone();
        match self.write_back(Deploy { application: app, placement }).await {
            None => Ok(()),
            Some(orphan) => {
                info!(app = %app_id, "application deleted during redeploy; removing its objects");
                let failures = self.provisioner.teardown(&orphan.application).await;
                DeployErrors::from_provision(&app_id, failures).into_result()
            }
        }
    }

    async fn insert(&self, deploy: Deploy) {
        self.registry
            .write()
            .await
            .insert(deploy.application.id.clone(), deploy);
    }

    /// Replace an existing record. A record deleted meanwhile stays deleted
    /// and the rejected deploy is handed back.
    async fn write_back(&self, deploy: Deploy) -> Option<Deploy> {
        let mut registry = self.registry.write().await;
        match registry.get_mut(&deploy.application.id) {
            Some(entry) => {
                *entry = deploy;
                None
            }
            None => {
                debug!(app = %deploy.application.id, "application deleted during redeploy; dropping result");
                Some(deploy)
            }
        }
    }
}
