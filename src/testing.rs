//! In-memory fakes of the ports, for unit tests only

use crate::domain::model::{
    BlockImage, CommandArgs, CommandResult, Filesystem, FilesystemRequest, Node, ObjectBucket,
    ObjectStoreConnectInfo, ObjectUser, PodState, Pool, ResourceAction, ServiceAddress,
    StatusDetails,
};
use crate::domain::ports::{ClusterOperator, RestApiOperator, TransportClient};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Pops scripted values; the last one sticks
fn next_scripted<T: Clone>(queue: Option<&mut VecDeque<T>>) -> Option<T> {
    let queue = queue?;
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

// =============================================================================
// Management API
// =============================================================================

#[derive(Default)]
struct RestState {
    images: Vec<BlockImage>,
    pools: BTreeSet<String>,
    filesystems: Vec<Filesystem>,
    object_store: bool,
    users: Vec<ObjectUser>,
    buckets: Vec<ObjectBucket>,
    failing_deletes: HashSet<String>,
    /// Success body for image creation, `{}` replaced by the image name
    create_reply: Option<String>,
}

/// Management API that enforces the (name, pool) identity rule
pub struct InMemoryRestApi {
    state: Mutex<RestState>,
}

impl InMemoryRestApi {
    /// Starts with the default `rbd` pool
    pub fn new() -> Self {
        let mut state = RestState::default();
        state.pools.insert("rbd".to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_images(self, images: &[BlockImage]) -> Self {
        self.state.lock().images.extend_from_slice(images);
        self
    }

    pub fn with_buckets(self, buckets: Vec<ObjectBucket>) -> Self {
        self.state.lock().buckets = buckets;
        self
    }

    pub fn with_create_reply(self, template: &str) -> Self {
        self.state.lock().create_reply = Some(template.to_string());
        self
    }

    /// Make deletion of the named image fail
    pub fn fail_delete_of(&self, name: &str) {
        self.state.lock().failing_deletes.insert(name.to_string());
    }

    pub fn image_names(&self) -> Vec<String> {
        self.state.lock().images.iter().map(|i| i.name.clone()).collect()
    }

    pub fn has_pool(&self, name: &str) -> bool {
        self.state.lock().pools.contains(name)
    }

    pub fn object_store_created(&self) -> bool {
        self.state.lock().object_store
    }
}

#[async_trait]
impl RestApiOperator for InMemoryRestApi {
    async fn get_nodes(&self) -> Result<Vec<Node>> {
        Ok(vec![Node {
            node_id: "node-1".into(),
            cluster_name: "rookcluster".into(),
            ..Default::default()
        }])
    }

    async fn get_status_details(&self) -> Result<StatusDetails> {
        Ok(StatusDetails {
            overall: "OK".into(),
            ..Default::default()
        })
    }

    async fn get_block_images(&self) -> Result<Vec<BlockImage>> {
        Ok(self.state.lock().images.clone())
    }

    async fn create_block_image(&self, image: &BlockImage) -> Result<String> {
        let mut state = self.state.lock();
        if !state.pools.contains(&image.pool_name) {
            return Err(Error::ResourceNotFound {
                kind: "Pool".into(),
                name: image.pool_name.clone(),
            });
        }
        if state.images.iter().any(|i| i.same_identity(image)) {
            return Err(Error::DuplicateResource {
                kind: "BlockImage".into(),
                name: image.name.clone(),
                scope: image.pool_name.clone(),
            });
        }
        state.images.push(image.clone());
        Ok(match &state.create_reply {
            Some(template) => template.replace("{}", &image.name),
            None => format!("succeeded created image {}", image.name),
        })
    }

    async fn delete_block_image(&self, image: &BlockImage) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing_deletes.contains(&image.name) {
            return Err(Error::ApiStatus {
                status: 500,
                message: format!("failed to delete image {}", image.name),
            });
        }
        let before = state.images.len();
        state.images.retain(|i| !i.same_identity(image));
        if state.images.len() == before {
            return Err(Error::ResourceNotFound {
                kind: "BlockImage".into(),
                name: image.name.clone(),
            });
        }
        Ok(())
    }

    async fn get_pools(&self) -> Result<Vec<Pool>> {
        Ok(self.state.lock().pools.iter().map(Pool::new).collect())
    }

    async fn create_pool(&self, pool: &Pool) -> Result<String> {
        if !self.state.lock().pools.insert(pool.name.clone()) {
            return Err(Error::DuplicateResource {
                kind: "Pool".into(),
                name: pool.name.clone(),
                scope: "cluster".into(),
            });
        }
        Ok(format!("pool '{}' created", pool.name))
    }

    async fn get_filesystems(&self) -> Result<Vec<Filesystem>> {
        Ok(self.state.lock().filesystems.clone())
    }

    async fn create_filesystem(&self, request: &FilesystemRequest) -> Result<String> {
        let mut state = self.state.lock();
        if state.filesystems.iter().any(|f| f.name == request.name) {
            return Err(Error::DuplicateResource {
                kind: "Filesystem".into(),
                name: request.name.clone(),
                scope: "cluster".into(),
            });
        }
        state.filesystems.push(Filesystem {
            name: request.name.clone(),
            metadata_pool: format!("{}-metadata", request.name),
            data_pools: vec![request.pool_name.clone()],
        });
        Ok(format!("filesystem {} created", request.name))
    }

    async fn delete_filesystem(&self, name: &str) -> Result<String> {
        let mut state = self.state.lock();
        let before = state.filesystems.len();
        state.filesystems.retain(|f| f.name != name);
        if state.filesystems.len() == before {
            return Err(Error::ResourceNotFound {
                kind: "Filesystem".into(),
                name: name.into(),
            });
        }
        Ok(format!("filesystem {} deleted", name))
    }

    async fn create_object_store(&self) -> Result<String> {
        self.state.lock().object_store = true;
        Ok("object store started".into())
    }

    async fn get_object_users(&self) -> Result<Vec<ObjectUser>> {
        Ok(self.state.lock().users.clone())
    }

    async fn get_object_user(&self, user_id: &str) -> Result<ObjectUser> {
        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .cloned()
            .ok_or_else(|| Error::ResourceNotFound {
                kind: "ObjectUser".into(),
                name: user_id.into(),
            })
    }

    async fn create_object_user(&self, user: &ObjectUser) -> Result<ObjectUser> {
        let mut state = self.state.lock();
        if state.users.iter().any(|u| u.user_id == user.user_id) {
            return Err(Error::DuplicateResource {
                kind: "ObjectUser".into(),
                name: user.user_id.clone(),
                scope: "object store".into(),
            });
        }
        let created = ObjectUser {
            access_key: Some(format!("AK-{}", user.user_id)),
            secret_key: Some("secret".into()),
            ..user.clone()
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn delete_object_user(&self, user_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.users.len();
        state.users.retain(|u| u.user_id != user_id);
        if state.users.len() == before {
            return Err(Error::ResourceNotFound {
                kind: "ObjectUser".into(),
                name: user_id.into(),
            });
        }
        Ok(())
    }

    async fn get_object_store_connection_info(&self) -> Result<ObjectStoreConnectInfo> {
        if !self.state.lock().object_store {
            return Err(Error::ResourceNotFound {
                kind: "ObjectStore".into(),
                name: "default".into(),
            });
        }
        Ok(ObjectStoreConnectInfo {
            host: "rook-ceph-rgw:53390".into(),
            ip_endpoint: "10.0.0.20:53390".into(),
        })
    }

    async fn get_buckets(&self) -> Result<Vec<ObjectBucket>> {
        Ok(self.state.lock().buckets.clone())
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Records invocations and replays scripted results
#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<CommandArgs>>,
    responses: Mutex<VecDeque<CommandResult>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next invocation
    pub fn respond(&self, stdout: &str, exit_code: i32) {
        self.responses.lock().push_back(CommandResult {
            stdout: stdout.to_string(),
            exit_code,
            ..Default::default()
        });
    }

    pub fn calls(&self) -> Vec<CommandArgs> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TransportClient for FakeTransport {
    async fn execute(&self, args: CommandArgs) -> CommandResult {
        let display = args.display();
        self.calls.lock().push(args);
        let mut result = self.responses.lock().pop_front().unwrap_or_default();
        result.command = display;
        result
    }

    async fn exec_in_pod(
        &self,
        pod: &str,
        namespace: &str,
        command: Vec<String>,
        stdin: Option<String>,
    ) -> CommandResult {
        let mut args = CommandArgs::new("kubectl")
            .sub_command("exec")
            .args([pod, "-n", namespace, "--"])
            .args(command);
        args.stdin = stdin;
        self.execute(args).await
    }
}

// =============================================================================
// Cluster
// =============================================================================

/// Scripted cluster state plus a log of manifest operations
#[derive(Default)]
pub struct FakeCluster {
    pod_states: Mutex<HashMap<String, VecDeque<PodState>>>,
    pvc_phases: Mutex<HashMap<String, VecDeque<String>>>,
    service_ready: Mutex<HashMap<String, VecDeque<bool>>>,
    services: Mutex<HashMap<String, ServiceAddress>>,
    pod_ips: Mutex<Vec<String>>,
    host_ip: Mutex<Option<String>>,
    operations: Mutex<Vec<(ResourceAction, PathBuf, BTreeMap<String, String>)>>,
    failing_manifests: Mutex<HashSet<PathBuf>>,
    /// Remaining transient failures per manifest
    unavailable_manifests: Mutex<HashMap<PathBuf, u32>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pod_states(&self, prefix: &str, states: &[PodState]) {
        self.pod_states
            .lock()
            .insert(prefix.to_string(), states.iter().copied().collect());
    }

    pub fn set_pvc_phases(&self, name: &str, phases: &[&str]) {
        self.pvc_phases
            .lock()
            .insert(name.to_string(), phases.iter().map(|p| p.to_string()).collect());
    }

    pub fn set_service_ready(&self, name: &str, ready: &[bool]) {
        self.service_ready
            .lock()
            .insert(name.to_string(), ready.iter().copied().collect());
    }

    pub fn add_service(&self, name: &str, address: ServiceAddress) {
        self.services.lock().insert(name.to_string(), address);
    }

    pub fn set_pod_ips(&self, ips: &[&str]) {
        *self.pod_ips.lock() = ips.iter().map(|ip| ip.to_string()).collect();
    }

    pub fn set_host_ip(&self, ip: &str) {
        *self.host_ip.lock() = Some(ip.to_string());
    }

    pub fn fail_manifest(&self, path: &Path) {
        self.failing_manifests.lock().insert(path.to_path_buf());
    }

    /// Fail the next `times` operations on `path` with a 503
    pub fn fail_manifest_times(&self, path: &Path, times: u32) {
        self.unavailable_manifests
            .lock()
            .insert(path.to_path_buf(), times);
    }

    pub fn operations(&self) -> Vec<(ResourceAction, PathBuf, BTreeMap<String, String>)> {
        self.operations.lock().clone()
    }

    /// Manifest paths touched by `action`, in order
    pub fn manifests(&self, action: ResourceAction) -> Vec<PathBuf> {
        self.operations
            .lock()
            .iter()
            .filter(|(a, _, _)| *a == action)
            .map(|(_, p, _)| p.clone())
            .collect()
    }
}

#[async_trait]
impl ClusterOperator for FakeCluster {
    async fn resource_operation(
        &self,
        action: ResourceAction,
        manifest: &Path,
        vars: &BTreeMap<String, String>,
    ) -> Result<String> {
        self.operations
            .lock()
            .push((action, manifest.to_path_buf(), vars.clone()));
        if let Some(left) = self.unavailable_manifests.lock().get_mut(manifest) {
            if *left > 0 {
                *left -= 1;
                return Err(Error::ApiStatus {
                    status: 503,
                    message: "no matches for kind".into(),
                });
            }
        }
        if self.failing_manifests.lock().contains(manifest) {
            return Err(Error::Manifest {
                path: manifest.display().to_string(),
                reason: "rejected by fake cluster".into(),
            });
        }
        Ok(format!("{} {}", action, manifest.display()))
    }

    async fn pod_state(&self, name_prefix: &str, _namespace: &str) -> Result<PodState> {
        Ok(next_scripted(self.pod_states.lock().get_mut(name_prefix)).unwrap_or(PodState::Absent))
    }

    async fn pvc_phase(&self, name: &str, _namespace: &str) -> Result<Option<String>> {
        Ok(next_scripted(self.pvc_phases.lock().get_mut(name)))
    }

    async fn service_exists(&self, name: &str, _namespace: &str) -> Result<bool> {
        Ok(self.services.lock().contains_key(name))
    }

    async fn service_ready(&self, name: &str, _namespace: &str) -> Result<bool> {
        Ok(next_scripted(self.service_ready.lock().get_mut(name)).unwrap_or(false))
    }

    async fn service_address(
        &self,
        name: &str,
        _namespace: &str,
    ) -> Result<Option<ServiceAddress>> {
        Ok(self.services.lock().get(name).cloned())
    }

    async fn pod_ips(&self, _label_selector: &str, _namespace: &str) -> Result<Vec<String>> {
        Ok(self.pod_ips.lock().clone())
    }

    async fn pod_host_ip(&self, _name_prefix: &str, _namespace: &str) -> Result<Option<String>> {
        Ok(self.host_ip.lock().clone())
    }
}
