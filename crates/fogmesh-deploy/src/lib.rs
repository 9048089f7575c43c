//! fogmesh deployment manager.
//!
//! Owns the registry of deployed applications and realizes placements on
//! the container platform. The manager:
//!
//! - Resolves a placement for each submitted application
//! - Creates one pinned workload per service, plus exposures for its ports
//! - Redeploys in place when an application is resubmitted
//! - Re-places every application when the infrastructure changes
//!
//! # Architecture
//!
//! ```text
//! Manager
//!   ├── NodeInventory (eligible nodes) ──▶ topology::build_infrastructure
//!   ├── PlacementEngine (resolve best placement)
//!   ├── Provisioner (apply / teardown platform objects)
//!   └── Registry (RwLock<BTreeMap<app id, Deploy>>)
//! ```

pub mod error;
pub mod manager;
pub mod provisioner;
pub mod topology;

pub use error::{DeployError, DeployErrors, DeployResult, ProvisionError};
pub use manager::{Manager, ManagerConfig, NodeInventory};
pub use provisioner::{PlatformProvisioner, Provisioner};
pub use topology::build_infrastructure;
