//! Harness configuration
//!
//! Loaded from an optional YAML file, then overridden from CLI flags and
//! environment variables by the binary.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Poll Policy
// =============================================================================

/// Bounds for a synchronous wait on observable cluster state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between checks
    pub interval: Duration,
    /// Give up once this much time has elapsed
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(100),
        }
    }
}

// =============================================================================
// Harness Configuration
// =============================================================================

/// Configuration shared by the test client, operators, installer and suites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Namespace the system under test runs in
    pub namespace: String,
    /// Namespace of the pods the tests create
    pub test_namespace: String,
    /// Management API base URL; discovered from `api_service` when unset
    pub api_endpoint: Option<String>,
    /// Service exposing the management API
    pub api_service: String,
    /// Pod running the storage CLI tools
    pub tools_pod: String,
    /// Operator pod name prefix, waited on after install
    pub operator_pod: String,
    pub operator_namespace: String,
    /// Directory holding manifests and test data
    pub data_dir: PathBuf,
    /// Kubernetes server version, selects version specific manifests
    pub k8s_version: String,
    /// Substring identifying test-created resources
    pub cleanup_marker: String,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
    /// Upper bound for the management API to answer after install
    pub install_timeout_secs: u64,
    /// Delay between creating a pool and claiming storage from it
    pub pool_settle_secs: u64,
    /// Object gateway service
    pub rgw_service: String,
    /// Externally exposed object gateway service
    pub rgw_external_service: String,
    pub rgw_node_port: u16,
    /// Request timeout for the management API
    pub http_timeout_secs: u64,
    /// kubectl binary used by the transport client
    pub kubectl: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            namespace: "rook".to_string(),
            test_namespace: "default".to_string(),
            api_endpoint: None,
            api_service: "rook-api".to_string(),
            tools_pod: "rook-tools".to_string(),
            operator_pod: "rook-operator".to_string(),
            operator_namespace: "default".to_string(),
            data_dir: PathBuf::from("data"),
            k8s_version: "v1.6".to_string(),
            cleanup_marker: "test".to_string(),
            poll_interval_secs: 5,
            poll_timeout_secs: 100,
            install_timeout_secs: 300,
            pool_settle_secs: 10,
            rgw_service: "rook-ceph-rgw".to_string(),
            rgw_external_service: "rgw-external".to_string(),
            rgw_node_port: 30001,
            http_timeout_secs: 30,
            kubectl: "kubectl".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a YAML file; missing keys keep their defaults
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: HarnessConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no suite could run with
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::Configuration("namespace must not be empty".into()));
        }
        if self.cleanup_marker.is_empty() {
            // an empty marker would match every resource in the cluster
            return Err(Error::Configuration(
                "cleanup_marker must not be empty".into(),
            ));
        }
        if self.poll_interval_secs == 0 || self.poll_timeout_secs < self.poll_interval_secs {
            return Err(Error::Configuration(format!(
                "invalid poll policy: interval {}s, timeout {}s",
                self.poll_interval_secs, self.poll_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.poll_timeout_secs),
        )
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn pool_settle(&self) -> Duration {
        Duration::from_secs(self.pool_settle_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Path of a file under the data directory
    pub fn data_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    /// True when the cluster runs Kubernetes 1.5, which needs the legacy
    /// storage class manifests
    pub fn is_legacy_k8s(&self) -> bool {
        self.k8s_version.eq_ignore_ascii_case("v1.5")
    }
}
