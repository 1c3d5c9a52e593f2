//! Best-effort cleanup of test-created resources
//!
//! Nothing here returns an error: failures are logged and collected in a
//! [`CleanupReport`] so teardown never masks the outcome of the test itself.

use crate::clients::ResourceTracker;
use crate::domain::model::BlockImage;
use crate::domain::ports::RestApiOperator;
use crate::installer::UninstallReport;
use serde::Serialize;
use tracing::{info, warn};

/// What a teardown removed and what it could not
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    /// (resource, reason)
    pub failed: Vec<(String, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn record_deleted(&mut self, resource: impl Into<String>) {
        self.deleted.push(resource.into());
    }

    pub fn record_failure(&mut self, resource: impl Into<String>, reason: impl ToString) {
        let resource = resource.into();
        let reason = reason.to_string();
        warn!("Cleanup of {} failed: {}", resource, reason);
        self.failed.push((resource, reason));
    }

    pub fn merge(&mut self, other: CleanupReport) {
        self.deleted.extend(other.deleted);
        self.failed.extend(other.failed);
    }
}

impl From<UninstallReport> for CleanupReport {
    fn from(report: UninstallReport) -> Self {
        Self {
            deleted: report
                .removed
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            failed: report
                .failed
                .into_iter()
                .map(|(p, reason)| (p.display().to_string(), reason))
                .collect(),
        }
    }
}

fn describe(image: &BlockImage) -> String {
    format!("image {}/{}", image.pool_name, image.name)
}

/// Delete block images created by the run
///
/// Images are re-listed and selected when they were tracked as created or
/// their name contains `marker` (case-sensitive). If listing fails, the
/// tracked images are still attempted.
pub async fn sweep_block_images(
    rest: &dyn RestApiOperator,
    tracker: &ResourceTracker,
    marker: &str,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    let candidates: Vec<BlockImage> = match rest.get_block_images().await {
        Ok(images) => images
            .into_iter()
            .filter(|image| tracker.is_tracked_image(image) || image.name.contains(marker))
            .collect(),
        Err(e) => {
            report.record_failure("image listing", &e);
            tracker.images()
        }
    };

    for image in candidates {
        match rest.delete_block_image(&image).await {
            Ok(()) => {
                info!("Deleted {}", describe(&image));
                report.record_deleted(describe(&image));
            }
            Err(e) => report.record_failure(describe(&image), e),
        }
    }
    report
}

/// Delete tracked filesystems and object store users
pub async fn sweep_tracked_resources(
    rest: &dyn RestApiOperator,
    tracker: &ResourceTracker,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    for user_id in tracker.object_users() {
        let resource = format!("object user {}", user_id);
        match rest.delete_object_user(&user_id).await {
            Ok(()) => report.record_deleted(resource),
            Err(e) => report.record_failure(resource, e),
        }
    }
    for name in tracker.filesystems() {
        let resource = format!("filesystem {}", name);
        match rest.delete_filesystem(&name).await {
            Ok(_) => report.record_deleted(resource),
            Err(e) => report.record_failure(resource, e),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::TrackingRestApi;
    use crate::domain::model::{ObjectUser, Pool};
    use crate::testing::InMemoryRestApi;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sweep_selects_marker_and_tracked_images() {
        let backend = Arc::new(InMemoryRestApi::new().with_images(&[
            BlockImage::new("testImage", 123, "rbd"),
            BlockImage::new("TestUpper", 1, "rbd"),
            BlockImage::new("keep-me", 1, "rbd"),
        ]));
        let tracker = Arc::new(ResourceTracker::new());
        let rest = TrackingRestApi::new(backend.clone(), tracker.clone());
        rest.create_pool(&Pool::new("images")).await.unwrap();
        rest.create_block_image(&BlockImage::new("scratch", 1, "images"))
            .await
            .unwrap();

        let report = sweep_block_images(&rest, &tracker, "test").await;
        assert!(report.is_clean());
        assert_eq!(report.deleted.len(), 2);
        // marker match is case-sensitive
        assert_eq!(backend.image_names(), vec!["TestUpper", "keep-me"]);
        assert!(tracker.images().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_continues_past_failed_delete() {
        let backend = InMemoryRestApi::new().with_images(&[
            BlockImage::new("test-a", 1, "rbd"),
            BlockImage::new("test-b", 1, "rbd"),
        ]);
        backend.fail_delete_of("test-a");
        let tracker = ResourceTracker::new();

        let report = sweep_block_images(&backend, &tracker, "test").await;
        assert_eq!(report.deleted, vec!["image rbd/test-b"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "image rbd/test-a");
        assert_eq!(backend.image_names(), vec!["test-a"]);
    }

    #[tokio::test]
    async fn test_sweep_tracked_resources() {
        let backend = Arc::new(InMemoryRestApi::new());
        let tracker = Arc::new(ResourceTracker::new());
        let rest = TrackingRestApi::new(backend, tracker.clone());
        rest.create_object_user(&ObjectUser {
            user_id: "rook-user".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        // tracked but unknown to the backend: reported, not fatal
        tracker.record_filesystem("testfs");

        let report = sweep_tracked_resources(&rest, &tracker).await;
        assert_eq!(report.deleted, vec!["object user rook-user"]);
        assert_eq!(report.failed.len(), 1);
        assert!(tracker.object_users().is_empty());
    }
}
