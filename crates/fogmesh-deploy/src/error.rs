//! Deployment manager error types.

use std::fmt;

use thiserror::Error;

use fogmesh_placement::PlacementError;
use fogmesh_platform::PlatformError;

/// Failure creating or removing one platform object.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("placement names unknown service {service} of application {application}")]
    UnknownService { application: String, service: String },

    #[error("{object}: {source}")]
    Platform {
        object: String,
        #[source]
        source: PlatformError,
    },
}

/// Errors that can occur during deployment operations.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("application not found: {0}")]
    NotFound(String),

    #[error("placement of {application} failed: {source}")]
    Placement {
        application: String,
        #[source]
        source: PlacementError,
    },

    #[error("provisioning {application} failed: {source}")]
    Provision {
        application: String,
        #[source]
        source: ProvisionError,
    },

    #[error("redeploy task for {application} failed: {reason}")]
    TaskFailed { application: String, reason: String },
}

/// Every failure of one manager operation.
#[derive(Debug, Default)]
pub struct DeployErrors(pub Vec<DeployError>);

impl DeployErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeployError> {
        self.0.iter()
    }

    pub fn push(&mut self, error: DeployError) {
        self.0.push(error);
    }

    pub fn into_result(self) -> DeployResult {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }

    pub(crate) fn from_provision(application: &str, errors: Vec<ProvisionError>) -> Self {
        Self(
            errors
                .into_iter()
                .map(|source| DeployError::Provision {
                    application: application.to_string(),
                    source,
                })
                .collect(),
        )
    }
}

impl fmt::Display for DeployErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DeployErrors {}

impl From<DeployError> for DeployErrors {
    fn from(error: DeployError) -> Self {
        Self(vec![error])
    }
}

impl Extend<DeployError> for DeployErrors {
    fn extend<I: IntoIterator<Item = DeployError>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

pub type DeployResult = Result<(), DeployErrors>;
