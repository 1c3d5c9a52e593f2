//! Value objects exchanged between suites, operators and collaborators
//!
//! Everything here is a snapshot: the harness re-queries the system under
//! test instead of caching these values.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// =============================================================================
// Command Invocation
// =============================================================================

/// A single external command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    /// Executable to run
    pub command: String,
    /// Optional sub-command placed before the arguments
    pub sub_command: Option<String>,
    /// Positional arguments
    pub args: Vec<String>,
    /// Optional arguments appended after the positional ones
    pub optional_args: Vec<String>,
    /// Payload piped to stdin
    pub stdin: Option<String>,
    /// Extra environment variables as `KEY=VALUE`
    pub environment: Vec<String>,
}

impl CommandArgs {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn sub_command(mut self, sub_command: impl Into<String>) -> Self {
        self.sub_command = Some(sub_command.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn optional_arg(mut self, arg: impl Into<String>) -> Self {
        self.optional_args.push(arg.into());
        self
    }

    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.environment.push(format!("{}={}", key, value));
        self
    }

    /// Arguments passed to the executable, in order
    pub fn argv(&self) -> Vec<String> {
        self.sub_command
            .iter()
            .chain(self.args.iter())
            .chain(self.optional_args.iter())
            .cloned()
            .collect()
    }

    /// Environment entries split into key/value pairs
    ///
    /// Entries without `=` are skipped.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        self.environment
            .iter()
            .filter_map(|e| e.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Human readable command line, used in logs and errors
    pub fn display(&self) -> String {
        std::iter::once(self.command.clone())
            .chain(self.argv())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of a command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Command line that produced this result
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// Process exit code, `-1` when the process never ran or was killed
    pub exit_code: i32,
    /// Transport-level error (spawn failure, broken pipe)
    pub error: Option<String>,
}

impl CommandResult {
    /// Result for a process that could not be run at all
    pub fn transport_error(command: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            exit_code: -1,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.exit_code == 0
    }

    /// Stdout of a successful command, or a `RemoteCommandFailure`
    pub fn into_stdout(self) -> Result<String> {
        if self.succeeded() {
            return Ok(self.stdout);
        }
        let stderr = match self.error {
            Some(err) if self.stderr.is_empty() => err,
            Some(err) => format!("{} ({})", self.stderr.trim_end(), err),
            None => self.stderr,
        };
        Err(Error::RemoteCommandFailure {
            command: self.command,
            exit_code: self.exit_code,
            stdout: self.stdout,
            stderr,
        })
    }
}

// =============================================================================
// Block Storage
// =============================================================================

/// A block image provisioned inside a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockImage {
    #[serde(rename = "imageName")]
    pub name: String,
    #[serde(rename = "imageSize", default)]
    pub size: u64,
    #[serde(rename = "poolName")]
    pub pool_name: String,
}

impl BlockImage {
    pub fn new(name: impl Into<String>, size: u64, pool_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            pool_name: pool_name.into(),
        }
    }

    /// Identity of the image; the size does not participate
    pub fn key(&self) -> (&str, &str) {
        (self.name.as_str(), self.pool_name.as_str())
    }

    pub fn same_identity(&self, other: &BlockImage) -> bool {
        self.key() == other.key()
    }
}

/// A storage pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pool {
    #[serde(rename = "poolName")]
    pub name: String,
}

impl Pool {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// =============================================================================
// File Storage
// =============================================================================

/// Request to create a shared filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemRequest {
    pub name: String,
    pub pool_name: String,
}

/// Filesystem as reported by the management API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filesystem {
    pub name: String,
    #[serde(default)]
    pub metadata_pool: String,
    #[serde(default)]
    pub data_pools: Vec<String>,
}

// =============================================================================
// Object Storage
// =============================================================================

/// Object store (RGW) user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectUser {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

/// Object store bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectBucket {
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub number_of_objects: u64,
}

/// How clients reach the object store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStoreConnectInfo {
    pub host: String,
    #[serde(default)]
    pub ip_endpoint: String,
}

// =============================================================================
// Cluster Status
// =============================================================================

/// Health summary entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Overall status of the storage cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default)]
    pub overall: String,
    #[serde(default)]
    pub summary: Vec<StatusSummary>,
    /// Fields the harness does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Storage node known to the cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub node_id: String,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub public_ip: String,
    #[serde(default)]
    pub private_ip: String,
    #[serde(default)]
    pub storage: u64,
    #[serde(default)]
    pub location: String,
}

// =============================================================================
// Cluster Resources
// =============================================================================

/// Observed state of the pods matching a name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodState {
    /// No pod exists
    Absent,
    /// Scheduled or starting
    Pending,
    Running,
    /// Succeeded, failed or being deleted
    Terminated,
}

impl std::fmt::Display for PodState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodState::Absent => write!(f, "absent"),
            PodState::Pending => write!(f, "pending"),
            PodState::Running => write!(f, "running"),
            PodState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Whether a manifest is created or deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    Create,
    Delete,
}

impl std::fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceAction::Create => write!(f, "create"),
            ResourceAction::Delete => write!(f, "delete"),
        }
    }
}

/// Address of a cluster service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAddress {
    pub cluster_ip: String,
    pub port: u16,
    pub node_port: Option<u16>,
}

/// Pod that mounts provisioned storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Manifest creating the pod
    pub manifest: PathBuf,
    pub pod_name: String,
    pub namespace: String,
    /// Where the storage is mounted inside the pod
    pub mount_path: String,
    /// Template values substituted into the manifest
    pub vars: BTreeMap<String, String>,
}

impl MountSpec {
    pub fn new(
        manifest: impl Into<PathBuf>,
        pod_name: impl Into<String>,
        namespace: impl Into<String>,
        mount_path: impl Into<String>,
    ) -> Self {
        Self {
            manifest: manifest.into(),
            pod_name: pod_name.into(),
            namespace: namespace.into(),
            mount_path: mount_path.into(),
            vars: BTreeMap::new(),
        }
    }

    pub fn with_vars(mut self, vars: BTreeMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    /// Absolute path of a file under the mount point
    pub fn file_path(&self, filename: &str) -> String {
        format!("{}/{}", self.mount_path.trim_end_matches('/'), filename)
    }
}

/// Mount lifecycle of a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MountState {
    #[default]
    Unmounted,
    /// Manifest applied, target state not yet observed
    Pending,
    Mounted,
}
