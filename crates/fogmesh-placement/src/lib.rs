//! fogmesh placement resolution.
//!
//! Turns an application and an infrastructure snapshot into a single
//! service → node placement by delegating the search to an external
//! probabilistic-logic solver.
//!
//! # Components
//!
//! - **`symbols`**: name ↔ token table keeping solver input well-formed
//! - **`encoder`**: application / infrastructure fact rendering
//! - **`solver`**: solver process adapter and output parsing
//! - **`select`**: best-of-N selection with random tie-breaking
//! - **`resolver`**: the end-to-end engine used by the deployment manager

pub mod encoder;
pub mod error;
pub mod resolver;
pub mod select;
pub mod solver;
pub mod symbols;

pub use encoder::{LinkEncoding, encode_application, encode_infrastructure};
pub use error::{PlacementError, PlacementResult};
pub use resolver::{PlacementEngine, Resolver, RuleSet};
pub use select::select_best;
pub use solver::{ProcessSolver, Solver, build_program, parse_placements};
pub use symbols::SymbolTable;
