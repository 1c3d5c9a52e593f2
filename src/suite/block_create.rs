//! Block image creation suite
//!
//! Exercises image identity: an image is identified by (name, pool), so the
//! same name may exist once per pool but never twice in one pool.

use super::cleanup::{sweep_block_images, CleanupReport};
use super::{ensure, ensure_eq, unknown_case, Suite};
use crate::clients::{ConnectionContext, ResourceTrackerRef, TestClient, DEFAULT_POOL};
use crate::domain::model::{BlockImage, Pool};
use crate::domain::platform::PlatformType;
use crate::domain::ports::RestApiOperatorRef;
use crate::error::{Error, Result};
use crate::installer::InstallHelper;
use async_trait::async_trait;
use tracing::{info, Instrument, Span};

pub const CUSTOM_POOL: &str = "rook_test_pool";
pub const IMAGE_NAME: &str = "testImage";
const IMAGE_SIZE: u64 = 123;
const RECREATE_SIZE: u64 = 2897;

const CASES: [&str; 4] = [
    "create_new_block_image_on_default_pool",
    "create_new_block_image_on_custom_pool",
    "recreate_block_image_in_same_pool",
    "recreate_block_image_in_different_pool",
];

pub struct BlockImageCreateSuite {
    rest: RestApiOperatorRef,
    tracker: ResourceTrackerRef,
    marker: String,
    installer: Option<InstallHelper>,
    initial_count: usize,
    span: Span,
}

impl BlockImageCreateSuite {
    /// Install the platform unless skipped, then build a Kubernetes client
    pub async fn setup(ctx: &ConnectionContext, skip_install: bool, span: Span) -> Result<Self> {
        let installer = if skip_install {
            None
        } else {
            let helper = InstallHelper::new(ctx.require_cluster("install")?, ctx.config.clone());
            helper.install().instrument(span.clone()).await?;
            Some(helper)
        };

        let client = TestClient::create(PlatformType::Kubernetes, ctx, span.clone()).await?;
        let suite = Self::with_rest(
            client.rest()?,
            client.tracker().clone(),
            ctx.config.cleanup_marker.clone(),
            span,
        )
        .await?;
        Ok(suite.with_installer(installer))
    }

    /// Build over an existing management API client, snapshotting the
    /// current image count
    pub async fn with_rest(
        rest: RestApiOperatorRef,
        tracker: ResourceTrackerRef,
        marker: impl Into<String>,
        span: Span,
    ) -> Result<Self> {
        let initial_count = rest.get_block_images().instrument(span.clone()).await?.len();
        info!(parent: &span, "Starting with {} block image(s)", initial_count);
        Ok(Self {
            rest,
            tracker,
            marker: marker.into(),
            installer: None,
            initial_count,
            span,
        })
    }

    pub fn with_installer(mut self, installer: Option<InstallHelper>) -> Self {
        self.installer = installer;
        self
    }

    pub fn initial_count(&self) -> usize {
        self.initial_count
    }

    async fn image_count(&self) -> Result<usize> {
        Ok(self.rest.get_block_images().await?.len())
    }

    /// Create a pool, accepting one that already exists
    async fn ensure_pool(&self, name: &str) -> Result<()> {
        match self.rest.create_pool(&Pool::new(name)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_duplicate() => {
                info!("Pool {} already exists", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Create an image and check the count grew by one
    async fn create_and_count(&self, image: &BlockImage, expected: usize) -> Result<usize> {
        let message = self.rest.create_block_image(image).await?;
        info!("Created image {}/{}: {}", image.pool_name, image.name, message.trim());
        let count = self.image_count().await?;
        ensure_eq(count, expected, "block image count")?;
        Ok(count)
    }

    async fn new_image_on_default_pool(&self) -> Result<()> {
        let image = BlockImage::new(IMAGE_NAME, IMAGE_SIZE, DEFAULT_POOL);
        self.create_and_count(&image, self.initial_count + 1).await?;
        Ok(())
    }

    async fn new_image_on_custom_pool(&self) -> Result<()> {
        self.ensure_pool(CUSTOM_POOL).await?;
        let image = BlockImage::new(IMAGE_NAME, IMAGE_SIZE, CUSTOM_POOL);
        self.create_and_count(&image, self.initial_count + 1).await?;
        Ok(())
    }

    async fn recreate_in_same_pool(&self) -> Result<()> {
        let image = BlockImage::new(IMAGE_NAME, IMAGE_SIZE, DEFAULT_POOL);
        let count = self.create_and_count(&image, self.initial_count + 1).await?;

        let again = BlockImage::new(IMAGE_NAME, RECREATE_SIZE, DEFAULT_POOL);
        match self.rest.create_block_image(&again).await {
            Err(Error::DuplicateResource { .. }) => {}
            Err(e) => return Err(e),
            Ok(message) => {
                return Err(Error::AssertionFailed(format!(
                    "duplicate image was accepted: {}",
                    message
                )))
            }
        }
        ensure_eq(self.image_count().await?, count, "block image count after duplicate")
    }

    async fn recreate_in_different_pool(&self) -> Result<()> {
        let image = BlockImage::new(IMAGE_NAME, IMAGE_SIZE, DEFAULT_POOL);
        let count = self.create_and_count(&image, self.initial_count + 1).await?;

        self.ensure_pool(CUSTOM_POOL).await?;
        let other = BlockImage::new(IMAGE_NAME, RECREATE_SIZE, CUSTOM_POOL);
        ensure(!other.same_identity(&image), "images must differ by pool")?;
        self.create_and_count(&other, count + 1).await?;
        Ok(())
    }
}

#[async_trait]
impl Suite for BlockImageCreateSuite {
    fn name(&self) -> &str {
        "block-create"
    }

    fn cases(&self) -> Vec<&'static str> {
        CASES.to_vec()
    }

    fn span(&self) -> &Span {
        &self.span
    }

    async fn run_case(&self, case: &str) -> Result<()> {
        match case {
            "create_new_block_image_on_default_pool" => self.new_image_on_default_pool().await,
            "create_new_block_image_on_custom_pool" => self.new_image_on_custom_pool().await,
            "recreate_block_image_in_same_pool" => self.recreate_in_same_pool().await,
            "recreate_block_image_in_different_pool" => self.recreate_in_different_pool().await,
            other => Err(unknown_case(self.name(), other)),
        }
    }

    async fn teardown_test(&self, _case: &str) -> CleanupReport {
        sweep_block_images(self.rest.as_ref(), &self.tracker, &self.marker).await
    }

    async fn teardown_suite(&self) -> CleanupReport {
        match &self.installer {
            Some(installer) => installer.uninstall().await.into(),
            None => CleanupReport::default(),
        }
    }
}
