pub mod config;
pub mod labels;
pub mod types;

pub use config::FogConfig;
pub use types::*;
