//! Platform client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform configuration: {0}")]
    Configuration(String),

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("watch stream closed")]
    StreamClosed,
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;
