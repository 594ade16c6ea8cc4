//! Error types for the deployer

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Kind of platform resource a deployment run depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Function,
    Bucket,
    LogGroup,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Function => write!(f, "Lambda function"),
            ResourceKind::Bucket => write!(f, "S3 bucket"),
            ResourceKind::LogGroup => write!(f, "Log group"),
        }
    }
}

/// Main error type for a deployment run
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("{kind} '{name}' does not exist. Available: {}", .available.join(", "))]
    ResolutionError {
        kind: ResourceKind,
        name: String,
        available: Vec<String>,
    },

    #[error("No log groups found for the given prefix {0}")]
    LogGroupNotFound(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Package error: {0}")]
    PackageError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Function update did not finish within {0:?}")]
    ConvergenceTimeout(Duration),

    #[error("Function update failed: {0}")]
    ConvergenceFailed(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DeployError {
    /// Build a resolution error listing every name that does exist
    pub fn not_found(kind: ResourceKind, name: &str, available: &[String]) -> Self {
        DeployError::ResolutionError {
            kind,
            name: name.to_string(),
            available: available.to_vec(),
        }
    }
}
