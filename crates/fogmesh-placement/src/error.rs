//! Placement resolution error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while resolving a placement.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("solver configuration: {0}")]
    Configuration(String),

    #[error("failed to launch solver {executable}: {source}")]
    SolverLaunch {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("solver i/o error: {0}")]
    SolverIo(#[source] std::io::Error),

    #[error("solver exited with {status}: {output}")]
    SolverFailed { status: String, output: String },

    #[error("solver did not finish within {0:?}")]
    SolverTimeout(Duration),

    #[error("invalid placement probability: {0}")]
    InvalidProbability(String),

    #[error("no feasible placement for application {application}")]
    NoFeasiblePlacement { application: String },

    #[error("cannot select a placement from an empty candidate list")]
    NoCandidates,

    #[error("solver returned unknown token: {0}")]
    UnknownToken(String),
}

pub type PlacementResult<T> = Result<T, PlacementError>;
