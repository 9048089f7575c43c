//! Traits at the container-platform boundary.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::PlatformResult;
use crate::node::{NodeEvent, PlatformNode};
use crate::workload::{ExposureSpec, WorkloadSpec};

/// Read access to the platform's node inventory.
#[async_trait]
pub trait NodeSource: Send + Sync {
    async fn list_nodes(&self) -> PlatformResult<Vec<PlatformNode>>;

    /// Open a change stream. The stream ends when the receiver yields `None`.
    async fn watch(&self) -> PlatformResult<mpsc::Receiver<PlatformResult<NodeEvent>>>;
}

/// Creates and removes workload and exposure objects.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn apply_workload(&self, spec: &WorkloadSpec) -> PlatformResult<()>;
    async fn delete_workload(&self, name: &str) -> PlatformResult<()>;
    async fn apply_exposure(&self, spec: &ExposureSpec) -> PlatformResult<()>;
    async fn delete_exposure(&self, name: &str) -> PlatformResult<()>;
}
