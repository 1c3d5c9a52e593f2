//! Block storage operator for Kubernetes

use crate::clients::mount::PodMounter;
use crate::domain::model::{BlockImage, MountSpec};
use crate::domain::ports::{BlockOperator, RestApiOperatorRef};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Block images through the management API, mounts through a pod
pub struct K8sBlockOperator {
    rest: RestApiOperatorRef,
    mounter: Arc<PodMounter>,
}

impl K8sBlockOperator {
    pub fn new(rest: RestApiOperatorRef, mounter: Arc<PodMounter>) -> Self {
        Self { rest, mounter }
    }
}

#[async_trait]
impl BlockOperator for K8sBlockOperator {
    async fn block_create(&self, image: &BlockImage) -> Result<String> {
        self.rest.create_block_image(image).await
    }

    async fn block_delete(&self, image: &BlockImage) -> Result<()> {
        self.rest.delete_block_image(image).await
    }

    async fn block_list(&self) -> Result<Vec<BlockImage>> {
        self.rest.get_block_images().await
    }

    async fn block_map(&self, spec: &MountSpec) -> Result<String> {
        self.mounter.mount(spec).await
    }

    async fn block_unmap(&self, spec: &MountSpec) -> Result<String> {
        self.mounter.unmount(spec).await
    }

    async fn block_write(&self, spec: &MountSpec, data: &str, filename: &str) -> Result<String> {
        self.mounter.write(spec, data, filename).await
    }

    async fn block_read(&self, spec: &MountSpec, filename: &str) -> Result<String> {
        self.mounter.read(spec, filename).await
    }
}
