//! fogmesh container platform boundary.
//!
//! Everything fogmesh knows about the underlying container platform lives
//! behind two traits: [`NodeSource`] feeds the infrastructure watcher and
//! [`PlatformClient`] realizes placements. [`Kubectl`] implements both by
//! running `kubectl` with JSON manifests.

pub mod client;
pub mod error;
pub mod kubectl;
pub mod node;
pub mod workload;

pub use client::{NodeSource, PlatformClient};
pub use error::{PlatformError, PlatformResult};
pub use kubectl::Kubectl;
pub use node::{NodeEvent, PlatformNode};
pub use workload::{ContainerSpec, ExposureSpec, PullPolicy, WorkloadSpec};
