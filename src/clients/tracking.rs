//! Created-resource tracking
//!
//! [`TrackingRestApi`] decorates a management API client and records every
//! resource a test successfully created, so teardown can clean up by
//! identity instead of guessing from names alone.

use crate::domain::model::{
    BlockImage, Filesystem, FilesystemRequest, Node, ObjectBucket, ObjectStoreConnectInfo,
    ObjectUser, Pool, StatusDetails,
};
use crate::domain::ports::{RestApiOperator, RestApiOperatorRef};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

// =============================================================================
// Resource Tracker
// =============================================================================

#[derive(Debug, Default)]
struct Tracked {
    images: Vec<BlockImage>,
    pools: Vec<Pool>,
    filesystems: Vec<String>,
    object_users: Vec<String>,
}

/// Resources created during a test run, in creation order
#[derive(Debug, Default)]
pub struct ResourceTracker {
    inner: Mutex<Tracked>,
}

pub type ResourceTrackerRef = Arc<ResourceTracker>;

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_image(&self, image: &BlockImage) {
        let mut inner = self.inner.lock();
        if !inner.images.iter().any(|i| i.same_identity(image)) {
            inner.images.push(image.clone());
        }
    }

    pub fn forget_image(&self, image: &BlockImage) {
        self.inner.lock().images.retain(|i| !i.same_identity(image));
    }

    pub fn images(&self) -> Vec<BlockImage> {
        self.inner.lock().images.clone()
    }

    /// True when an image with the same identity was created by the run
    pub fn is_tracked_image(&self, image: &BlockImage) -> bool {
        self.inner.lock().images.iter().any(|i| i.same_identity(image))
    }

    pub fn record_pool(&self, pool: &Pool) {
        let mut inner = self.inner.lock();
        if !inner.pools.contains(pool) {
            inner.pools.push(pool.clone());
        }
    }

    /// Pools have no delete endpoint; they are only reported
    pub fn pools(&self) -> Vec<Pool> {
        self.inner.lock().pools.clone()
    }

    pub fn record_filesystem(&self, name: &str) {
        let mut inner = self.inner.lock();
        if !inner.filesystems.iter().any(|f| f == name) {
            inner.filesystems.push(name.to_string());
        }
    }

    pub fn forget_filesystem(&self, name: &str) {
        self.inner.lock().filesystems.retain(|f| f != name);
    }

    pub fn filesystems(&self) -> Vec<String> {
        self.inner.lock().filesystems.clone()
    }

    pub fn record_object_user(&self, user_id: &str) {
        let mut inner = self.inner.lock();
        if !inner.object_users.iter().any(|u| u == user_id) {
            inner.object_users.push(user_id.to_string());
        }
    }

    pub fn forget_object_user(&self, user_id: &str) {
        self.inner.lock().object_users.retain(|u| u != user_id);
    }

    pub fn object_users(&self) -> Vec<String> {
        self.inner.lock().object_users.clone()
    }
}

// =============================================================================
// Tracking Decorator
// =============================================================================

/// [`RestApiOperator`] that records successful creates in a tracker
pub struct TrackingRestApi {
    inner: RestApiOperatorRef,
    tracker: ResourceTrackerRef,
}

impl TrackingRestApi {
    pub fn new(inner: RestApiOperatorRef, tracker: ResourceTrackerRef) -> Self {
        Self { inner, tracker }
    }

    pub fn tracker(&self) -> &ResourceTrackerRef {
        &self.tracker
    }
}

#[async_trait]
impl RestApiOperator for TrackingRestApi {
    async fn get_nodes(&self) -> Result<Vec<Node>> {
        self.inner.get_nodes().await
    }

    async fn get_status_details(&self) -> Result<StatusDetails> {
        self.inner.get_status_details().await
    }

    async fn get_block_images(&self) -> Result<Vec<BlockImage>> {
        self.inner.get_block_images().await
    }

    async fn create_block_image(&self, image: &BlockImage) -> Result<String> {
        let message = self.inner.create_block_image(image).await?;
        self.tracker.record_image(image);
        Ok(message)
    }

    async fn delete_block_image(&self, image: &BlockImage) -> Result<()> {
        self.inner.delete_block_image(image).await?;
        self.tracker.forget_image(image);
        Ok(())
    }

    async fn get_pools(&self) -> Result<Vec<Pool>> {
        self.inner.get_pools().await
    }

    async fn create_pool(&self, pool: &Pool) -> Result<String> {
        let message = self.inner.create_pool(pool).await?;
        self.tracker.record_pool(pool);
        Ok(message)
    }

    async fn get_filesystems(&self) -> Result<Vec<Filesystem>> {
        self.inner.get_filesystems().await
    }

    async fn create_filesystem(&self, request: &FilesystemRequest) -> Result<String> {
        let message = self.inner.create_filesystem(request).await?;
        self.tracker.record_filesystem(&request.name);
        Ok(message)
    }

    async fn delete_filesystem(&self, name: &str) -> Result<String> {
        let message = self.inner.delete_filesystem(name).await?;
        self.tracker.forget_filesystem(name);
        Ok(message)
    }

    async fn create_object_store(&self) -> Result<String> {
        self.inner.create_object_store().await
    }

    async fn get_object_users(&self) -> Result<Vec<ObjectUser>> {
        self.inner.get_object_users().await
    }

    async fn get_object_user(&self, user_id: &str) -> Result<ObjectUser> {
        self.inner.get_object_user(user_id).await
    }

    async fn create_object_user(&self, user: &ObjectUser) -> Result<ObjectUser> {
        let created = self.inner.create_object_user(user).await?;
        self.tracker.record_object_user(&created.user_id);
        Ok(created)
    }

    async fn delete_object_user(&self, user_id: &str) -> Result<()> {
        self.inner.delete_object_user(user_id).await?;
        self.tracker.forget_object_user(user_id);
        Ok(())
    }

    async fn get_object_store_connection_info(&self) -> Result<ObjectStoreConnectInfo> {
        self.inner.get_object_store_connection_info().await
    }

    async fn get_buckets(&self) -> Result<Vec<ObjectBucket>> {
        self.inner.get_buckets().await
    }
}
