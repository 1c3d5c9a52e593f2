//! Domain Ports - trait boundaries between suites and the system under test
//!
//! Suites only talk to these traits. Concrete adapters (kubectl transport,
//! reqwest management client, kube-backed cluster helper) implement them,
//! and in-memory fakes implement them in unit tests.

use crate::domain::model::{
    BlockImage, CommandArgs, CommandResult, Filesystem, FilesystemRequest, MountSpec, Node,
    ObjectBucket, ObjectStoreConnectInfo, ObjectUser, PodState, Pool, ResourceAction,
    ServiceAddress, StatusDetails,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// Transport Client Port
// =============================================================================

/// Executes commands against the target platform
///
/// Execution never returns `Err`: spawn failures and non-zero exits are
/// reported inside the [`CommandResult`] so callers see captured output.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Run a command and wait for it to finish
    async fn execute(&self, args: CommandArgs) -> CommandResult;

    /// Run a command inside a pod
    async fn exec_in_pod(
        &self,
        pod: &str,
        namespace: &str,
        command: Vec<String>,
        stdin: Option<String>,
    ) -> CommandResult;
}

// =============================================================================
// Management API Port
// =============================================================================

/// Typed client over the storage platform's HTTP management API
#[async_trait]
pub trait RestApiOperator: Send + Sync {
    async fn get_nodes(&self) -> Result<Vec<Node>>;

    async fn get_status_details(&self) -> Result<StatusDetails>;

    async fn get_block_images(&self) -> Result<Vec<BlockImage>>;

    /// Create a block image; fails with `DuplicateResource` when the
    /// (name, pool) identity is taken
    async fn create_block_image(&self, image: &BlockImage) -> Result<String>;

    async fn delete_block_image(&self, image: &BlockImage) -> Result<()>;

    async fn get_pools(&self) -> Result<Vec<Pool>>;

    async fn create_pool(&self, pool: &Pool) -> Result<String>;

    async fn get_filesystems(&self) -> Result<Vec<Filesystem>>;

    async fn create_filesystem(&self, request: &FilesystemRequest) -> Result<String>;

    async fn delete_filesystem(&self, name: &str) -> Result<String>;

    async fn create_object_store(&self) -> Result<String>;

    async fn get_object_users(&self) -> Result<Vec<ObjectUser>>;

    async fn get_object_user(&self, user_id: &str) -> Result<ObjectUser>;

    async fn create_object_user(&self, user: &ObjectUser) -> Result<ObjectUser>;

    async fn delete_object_user(&self, user_id: &str) -> Result<()>;

    async fn get_object_store_connection_info(&self) -> Result<ObjectStoreConnectInfo>;

    async fn get_buckets(&self) -> Result<Vec<ObjectBucket>>;
}

// =============================================================================
// Cluster Operator Port
// =============================================================================

/// Resource operations and read-only queries against the orchestrated cluster
#[async_trait]
pub trait ClusterOperator: Send + Sync {
    /// Create or delete every resource in a manifest file
    ///
    /// `vars` are substituted into `{{ key }}` placeholders first.
    async fn resource_operation(
        &self,
        action: ResourceAction,
        manifest: &Path,
        vars: &BTreeMap<String, String>,
    ) -> Result<String>;

    /// State of the pods whose name starts with `name_prefix`
    async fn pod_state(&self, name_prefix: &str, namespace: &str) -> Result<PodState>;

    /// Phase of a persistent volume claim, `None` if it does not exist
    async fn pvc_phase(&self, name: &str, namespace: &str) -> Result<Option<String>>;

    async fn service_exists(&self, name: &str, namespace: &str) -> Result<bool>;

    /// True once the service has at least one ready endpoint
    async fn service_ready(&self, name: &str, namespace: &str) -> Result<bool>;

    async fn service_address(&self, name: &str, namespace: &str)
        -> Result<Option<ServiceAddress>>;

    /// IPs of the pods matching a label selector, ordered by pod name
    async fn pod_ips(&self, label_selector: &str, namespace: &str) -> Result<Vec<String>>;

    /// Host IP of the first pod whose name starts with `name_prefix`
    async fn pod_host_ip(&self, name_prefix: &str, namespace: &str) -> Result<Option<String>>;
}

// =============================================================================
// Resource Operator Ports
// =============================================================================

/// Block storage operations
#[async_trait]
pub trait BlockOperator: Send + Sync {
    async fn block_create(&self, image: &BlockImage) -> Result<String>;

    async fn block_delete(&self, image: &BlockImage) -> Result<()>;

    async fn block_list(&self) -> Result<Vec<BlockImage>>;

    /// Create the mounting pod and wait for it to run
    async fn block_map(&self, spec: &MountSpec) -> Result<String>;

    /// Delete the mounting pod and wait for it to go away
    async fn block_unmap(&self, spec: &MountSpec) -> Result<String>;

    async fn block_write(&self, spec: &MountSpec, data: &str, filename: &str) -> Result<String>;

    async fn block_read(&self, spec: &MountSpec, filename: &str) -> Result<String>;
}

/// Shared filesystem operations
#[async_trait]
pub trait FileSystemOperator: Send + Sync {
    async fn fs_create(&self, name: &str) -> Result<String>;

    async fn fs_delete(&self, name: &str) -> Result<String>;

    async fn fs_list(&self) -> Result<Vec<Filesystem>>;

    async fn fs_mount(&self, spec: &MountSpec) -> Result<String>;

    async fn fs_unmount(&self, spec: &MountSpec) -> Result<String>;

    async fn fs_write(&self, spec: &MountSpec, data: &str, filename: &str) -> Result<String>;

    async fn fs_read(&self, spec: &MountSpec, filename: &str) -> Result<String>;
}

/// Object store operations
#[async_trait]
pub trait ObjectOperator: Send + Sync {
    /// Create the object store and wait until its gateway is reachable
    async fn object_create(&self) -> Result<String>;

    async fn object_create_user(&self, user_id: &str, display_name: &str) -> Result<ObjectUser>;

    async fn object_list_users(&self) -> Result<Vec<ObjectUser>>;

    async fn object_get_user(&self, user_id: &str) -> Result<ObjectUser>;

    async fn object_delete_user(&self, user_id: &str) -> Result<()>;

    async fn object_connection(&self) -> Result<ObjectStoreConnectInfo>;

    async fn object_bucket_list(&self) -> Result<Vec<ObjectBucket>>;
}

/// Pool operations
#[async_trait]
pub trait PoolOperator: Send + Sync {
    async fn pool_create(&self, pool: &Pool) -> Result<String>;

    async fn pool_list(&self) -> Result<Vec<Pool>>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type TransportClientRef = Arc<dyn TransportClient>;
pub type RestApiOperatorRef = Arc<dyn RestApiOperator>;
pub type ClusterOperatorRef = Arc<dyn ClusterOperator>;
pub type BlockOperatorRef = Arc<dyn BlockOperator>;
pub type FileSystemOperatorRef = Arc<dyn FileSystemOperator>;
pub type ObjectOperatorRef = Arc<dyn ObjectOperator>;
pub type PoolOperatorRef = Arc<dyn PoolOperator>;
