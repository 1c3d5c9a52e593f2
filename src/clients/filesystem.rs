//! Shared filesystem operator for Kubernetes

use crate::clients::mount::PodMounter;
use crate::domain::model::{Filesystem, FilesystemRequest, MountSpec};
use crate::domain::ports::{FileSystemOperator, RestApiOperatorRef};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Filesystems through the management API, mounts through a pod
pub struct K8sFileSystemOperator {
    rest: RestApiOperatorRef,
    mounter: Arc<PodMounter>,
    /// Pool backing the data of newly created filesystems
    data_pool: String,
}

impl K8sFileSystemOperator {
    pub fn new(rest: RestApiOperatorRef, mounter: Arc<PodMounter>, data_pool: impl Into<String>) -> Self {
        Self {
            rest,
            mounter,
            data_pool: data_pool.into(),
        }
    }
}

#[async_trait]
impl FileSystemOperator for K8sFileSystemOperator {
    async fn fs_create(&self, name: &str) -> Result<String> {
        info!("Creating filesystem {} on pool {}", name, self.data_pool);
        let request = FilesystemRequest {
            name: name.to_string(),
            pool_name: self.data_pool.clone(),
        };
        self.rest.create_filesystem(&request).await
    }

    async fn fs_delete(&self, name: &str) -> Result<String> {
        info!("Deleting filesystem {}", name);
        self.rest.delete_filesystem(name).await
    }

    async fn fs_list(&self) -> Result<Vec<Filesystem>> {
        self.rest.get_filesystems().await
    }

    async fn fs_mount(&self, spec: &MountSpec) -> Result<String> {
        self.mounter.mount(spec).await
    }

    async fn fs_unmount(&self, spec: &MountSpec) -> Result<String> {
        self.mounter.unmount(spec).await
    }

    async fn fs_write(&self, spec: &MountSpec, data: &str, filename: &str) -> Result<String> {
        self.mounter.write(spec, data, filename).await
    }

    async fn fs_read(&self, spec: &MountSpec, filename: &str) -> Result<String> {
        self.mounter.read(spec, filename).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollPolicy;
    use crate::domain::model::{PodState, ResourceAction};
    use crate::testing::{FakeCluster, FakeTransport, InMemoryRestApi};
    use std::collections::BTreeMap;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fs_lifecycle() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.set_pod_states("file-test", &[PodState::Running]);
        let mounter = PodMounter::new(
            cluster.clone(),
            Arc::new(FakeTransport::new()),
            PollPolicy::new(Duration::from_millis(5), Duration::from_millis(40)),
        );
        let fs = K8sFileSystemOperator::new(Arc::new(InMemoryRestApi::new()), Arc::new(mounter), "rbd");

        fs.fs_create("testfs").await.unwrap();
        let listed = fs.fs_list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].data_pools, vec!["rbd".to_string()]);

        let vars: BTreeMap<String, String> = [("mon0".to_string(), "10.0.0.1".to_string())].into();
        let spec = MountSpec::new("data/smoke/file_mount.tmpl", "file-test", "rook", "/tmp/rookfs")
            .with_vars(vars.clone());
        fs.fs_mount(&spec).await.unwrap();

        let (action, _, applied_vars) = cluster.operations().remove(0);
        assert_eq!(action, ResourceAction::Create);
        assert_eq!(applied_vars, vars);

        fs.fs_delete("testfs").await.unwrap();
        assert!(fs.fs_list().await.unwrap().is_empty());
    }
}
