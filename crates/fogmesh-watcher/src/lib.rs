//! fogmesh infrastructure watcher.
//!
//! Maintains the set of platform nodes usable for placement and tells the
//! deployment manager when that set changes.
//!
//! # Architecture
//!
//! ```text
//! NodeSource ──watch()──▶ event pump ───┐
//!            ──list()───▶ reconciler ───┼─▶ snapshot (RwLock<Vec<Node>>)
//!                                       └─▶ broadcast<TopologyChange>
//! ```

pub mod convert;
pub mod watcher;

pub use convert::{is_eligible, to_node};
pub use watcher::{InfrastructureWatcher, TopologyChange};
