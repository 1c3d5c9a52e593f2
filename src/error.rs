//! Error types for the storage e2e harness
//!
//! Distinguishes the failure modes a test case asserts on (duplicate
//! resources, unsupported platforms, resources that never became ready)
//! from transport and API plumbing errors.

use crate::domain::platform::PlatformType;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Platform Errors
    // =========================================================================
    #[error("Unsupported platform type: {0}")]
    UnsupportedPlatform(String),

    #[error("NOT YET IMPLEMENTED: {operation} on platform {platform}")]
    NotYetImplemented {
        platform: PlatformType,
        operation: String,
    },

    // =========================================================================
    // Cluster State Errors
    // =========================================================================
    #[error("{kind}/{name} did not reach state {expected} within {waited:?}")]
    ResourceNotReady {
        kind: String,
        name: String,
        expected: String,
        waited: Duration,
    },

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Resource already exists: {kind}/{name} in {scope}")]
    DuplicateResource {
        kind: String,
        name: String,
        scope: String,
    },

    // =========================================================================
    // Command Execution Errors
    // =========================================================================
    #[error("Command `{command}` failed with exit code {exit_code}: {stderr}")]
    RemoteCommandFailure {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    // =========================================================================
    // Management API Errors
    // =========================================================================
    #[error("Management API returned {status}: {message}")]
    ApiStatus { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Invalid manifest {path}: {reason}")]
    Manifest { path: String, reason: String },

    // =========================================================================
    // Test Errors
    // =========================================================================
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // =========================================================================
    // Parse / IO Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for the StandAlone placeholder error
    pub fn not_yet_implemented(platform: PlatformType, operation: impl Into<String>) -> Self {
        Error::NotYetImplemented {
            platform,
            operation: operation.into(),
        }
    }

    /// Check if this error is transient
    ///
    /// Transient errors are the ones worth retrying while the system under
    /// test is still starting up.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(resp)) => resp.code >= 500 || resp.code == 429,
            Error::Http(_) | Error::Kube(_) => true,
            Error::ApiStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if this error reports an identity collision
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::DuplicateResource { .. })
    }
}

/// Result type alias for the harness
pub type Result<T> = std::result::Result<T, Error>;
