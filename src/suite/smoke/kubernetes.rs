//! Smoke flows on Kubernetes

use super::harness::{
    StorageHarness, BLOCK_TEST_DATA, FILE_TEST_DATA, OBJECT_USER_DISPLAY_NAME, OBJECT_USER_ID,
};
use crate::clients::TestClient;
use crate::cluster::wait::wait_for_pvc_bound;
use crate::config::HarnessConfig;
use crate::domain::model::{
    MountSpec, ObjectBucket, ObjectStoreConnectInfo, ObjectUser, ResourceAction,
};
use crate::domain::platform::PlatformType;
use crate::domain::ports::ClusterOperatorRef;
use crate::error::{Error, Result};
use crate::suite::cleanup::{sweep_block_images, sweep_tracked_resources, CleanupReport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Label selecting the monitor pods
const MON_SELECTOR: &str = "app=rook-ceph-mon";
const MON_PORT: u16 = 6790;

type Vars = BTreeMap<String, String>;

pub struct KubernetesHarness {
    client: TestClient,
    cluster: ClusterOperatorRef,
    config: HarnessConfig,
    /// Manifests created by the flows and not yet deleted
    applied: Mutex<Vec<(PathBuf, Vars)>>,
}

impl KubernetesHarness {
    pub fn new(client: TestClient, cluster: ClusterOperatorRef) -> Self {
        let config = client.config().clone();
        Self {
            client,
            cluster,
            config,
            applied: Mutex::new(Vec::new()),
        }
    }

    fn track(&self, manifest: PathBuf, vars: Vars) {
        let mut applied = self.applied.lock();
        if !applied.iter().any(|(p, _)| *p == manifest) {
            applied.push((manifest, vars));
        }
    }

    fn untrack(&self, manifest: &Path) {
        self.applied.lock().retain(|(p, _)| p.as_path() != manifest);
    }

    async fn create(&self, manifest: PathBuf, vars: Vars) -> Result<String> {
        self.track(manifest.clone(), vars.clone());
        self.cluster
            .resource_operation(ResourceAction::Create, &manifest, &vars)
            .await
    }

    async fn delete(&self, manifest: PathBuf, vars: Vars) -> Result<String> {
        let output = self
            .cluster
            .resource_operation(ResourceAction::Delete, &manifest, &vars)
            .await?;
        self.untrack(&manifest);
        Ok(output)
    }

    /// Pool plus storage class; Kubernetes 1.5 needs the legacy variant
    fn pool_manifest(&self) -> PathBuf {
        if self.config.is_legacy_k8s() {
            self.config.data_path("smoke/pool_sc_1_5.yaml")
        } else {
            self.config.data_path("smoke/pool_sc.yaml")
        }
    }

    fn claim_manifest(&self) -> PathBuf {
        self.config.data_path("smoke/pool_pvc.yaml")
    }

    fn claim_vars(&self) -> Vars {
        Vars::from([
            ("claim".to_string(), BLOCK_TEST_DATA.claim.to_string()),
            ("size".to_string(), BLOCK_TEST_DATA.size.to_string()),
        ])
    }

    fn block_mount(&self) -> MountSpec {
        MountSpec::new(
            self.config.data_path("smoke/block_mount.yaml"),
            BLOCK_TEST_DATA.name,
            self.config.test_namespace.clone(),
            BLOCK_TEST_DATA.mount_path,
        )
    }

    /// Template values for the filesystem mount: `mon<N>` per monitor and
    /// `monitors` as a comma separated `ip:port` list
    async fn monitor_vars(&self) -> Result<Vars> {
        let ips = self.cluster.pod_ips(MON_SELECTOR, &self.config.namespace).await?;
        if ips.is_empty() {
            return Err(Error::ResourceNotFound {
                kind: "Pod".into(),
                name: MON_SELECTOR.into(),
            });
        }
        info!("Monitors: {:?}", ips);

        let mut vars: Vars = ips
            .iter()
            .enumerate()
            .map(|(i, ip)| (format!("mon{}", i), ip.clone()))
            .collect();
        let monitors = ips
            .iter()
            .map(|ip| format!("{}:{}", ip, MON_PORT))
            .collect::<Vec<_>>()
            .join(", ");
        vars.insert("monitors".into(), monitors);
        Ok(vars)
    }

    async fn file_mount(&self) -> Result<MountSpec> {
        let vars = self.monitor_vars().await?;
        Ok(MountSpec::new(
            self.config.data_path("smoke/file_mount.tmpl"),
            FILE_TEST_DATA.pod_name,
            self.config.namespace.clone(),
            FILE_TEST_DATA.mount_path,
        )
        .with_vars(vars))
    }
}

#[async_trait]
impl StorageHarness for KubernetesHarness {
    fn platform(&self) -> PlatformType {
        PlatformType::Kubernetes
    }

    async fn create_block_storage(&self) -> Result<()> {
        self.create(self.pool_manifest(), Vars::new()).await?;
        // the pool must settle before a claim can be provisioned from it
        tokio::time::sleep(self.config.pool_settle()).await;
        self.create(self.claim_manifest(), self.claim_vars()).await?;
        wait_for_pvc_bound(
            self.cluster.as_ref(),
            &self.config.poll_policy(),
            BLOCK_TEST_DATA.claim,
            &self.config.test_namespace,
        )
        .await
    }

    async fn mount_block_storage(&self) -> Result<()> {
        let spec = self.block_mount();
        self.track(spec.manifest.clone(), spec.vars.clone());
        self.client.block()?.block_map(&spec).await?;
        Ok(())
    }

    async fn write_to_block_storage(&self, data: &str, filename: &str) -> Result<String> {
        self.client
            .block()?
            .block_write(&self.block_mount(), data, filename)
            .await
    }

    async fn read_from_block_storage(&self, filename: &str) -> Result<String> {
        self.client
            .block()?
            .block_read(&self.block_mount(), filename)
            .await
    }

    async fn unmount_block_storage(&self) -> Result<()> {
        let spec = self.block_mount();
        self.client.block()?.block_unmap(&spec).await?;
        self.untrack(&spec.manifest);
        Ok(())
    }

    async fn delete_block_storage(&self) -> Result<()> {
        self.delete(self.claim_manifest(), self.claim_vars()).await?;
        self.delete(self.pool_manifest(), Vars::new()).await?;
        Ok(())
    }

    async fn create_file_storage(&self) -> Result<()> {
        self.client.filesystem()?.fs_create(FILE_TEST_DATA.name).await?;
        Ok(())
    }

    async fn mount_file_storage(&self) -> Result<()> {
        let spec = self.file_mount().await?;
        self.track(spec.manifest.clone(), spec.vars.clone());
        self.client.filesystem()?.fs_mount(&spec).await?;
        Ok(())
    }

    async fn write_to_file_storage(&self, data: &str, filename: &str) -> Result<String> {
        let spec = self.file_mount().await?;
        self.client.filesystem()?.fs_write(&spec, data, filename).await
    }

    async fn read_from_file_storage(&self, filename: &str) -> Result<String> {
        let spec = self.file_mount().await?;
        self.client.filesystem()?.fs_read(&spec, filename).await
    }

    async fn unmount_file_storage(&self) -> Result<()> {
        let spec = self.file_mount().await?;
        self.client.filesystem()?.fs_unmount(&spec).await?;
        self.untrack(&spec.manifest);
        Ok(())
    }

    async fn delete_file_storage(&self) -> Result<String> {
        self.client.filesystem()?.fs_delete(FILE_TEST_DATA.name).await
    }

    async fn create_object_store(&self) -> Result<String> {
        self.client.object()?.object_create().await
    }

    async fn create_object_store_user(&self) -> Result<ObjectUser> {
        self.client
            .object()?
            .object_create_user(OBJECT_USER_ID, OBJECT_USER_DISPLAY_NAME)
            .await
    }

    async fn object_store_users(&self) -> Result<Vec<ObjectUser>> {
        self.client.object()?.object_list_users().await
    }

    async fn object_store_user(&self, user_id: &str) -> Result<ObjectUser> {
        self.client.object()?.object_get_user(user_id).await
    }

    async fn object_store_connection(&self) -> Result<ObjectStoreConnectInfo> {
        self.client.object()?.object_connection().await
    }

    async fn object_store_buckets(&self) -> Result<Vec<ObjectBucket>> {
        self.client.object()?.object_bucket_list().await
    }

    async fn delete_object_store_user(&self) -> Result<()> {
        self.client.object()?.object_delete_user(OBJECT_USER_ID).await
    }

    async fn rgw_service_url(&self) -> Result<String> {
        let host = self
            .cluster
            .pod_host_ip(&self.config.rgw_service, &self.config.namespace)
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: "Pod".into(),
                name: self.config.rgw_service.clone(),
            })?;
        Ok(format!("{}:{}", host, self.config.rgw_node_port))
    }

    async fn cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        let leftovers: Vec<(PathBuf, Vars)> = self.applied.lock().drain(..).rev().collect();
        for (manifest, vars) in leftovers {
            let resource = manifest.display().to_string();
            match self
                .cluster
                .resource_operation(ResourceAction::Delete, &manifest, &vars)
                .await
            {
                Ok(_) => report.record_deleted(resource),
                Err(e) => report.record_failure(resource, e),
            }
        }

        if let Ok(rest) = self.client.rest() {
            let tracker = self.client.tracker();
            let marker = &self.config.cleanup_marker;
            report.merge(sweep_block_images(rest.as_ref(), tracker, marker).await);
            report.merge(sweep_tracked_resources(rest.as_ref(), tracker).await);
        }
        report
    }
}
