//! Smoke suite
//!
//! One lifecycle per storage kind, run through whichever [`StorageHarness`]
//! matches the platform: create, mount, write, read back, unmount, delete
//! for block and file storage; store, user and gateway for object storage.

mod harness;
mod kubernetes;

pub use harness::{
    BlockTestData, FileTestData, StandAloneHarness, StorageHarness, BLOCK_TEST_DATA,
    FILE_TEST_DATA, OBJECT_USER_DISPLAY_NAME, OBJECT_USER_ID,
};
pub use kubernetes::KubernetesHarness;

use super::cleanup::CleanupReport;
use super::{ensure, ensure_contains, ensure_eq, unknown_case, Suite};
use crate::clients::{ConnectionContext, TestClient};
use crate::domain::platform::PlatformType;
use crate::error::{Error, Result};
use crate::installer::InstallHelper;
use async_trait::async_trait;
use tracing::{info, Instrument, Span};

const BLOCK_DATA: &str = "Smoke Test Data for Block storage";
const BLOCK_FILE: &str = "bsFile1";
const FILE_DATA: &str = "Smoke Test Data for File storage";
const FILE_FILE: &str = "fsFile1";

const CASES: [&str; 3] = [
    "block_storage_lifecycle",
    "file_storage_lifecycle",
    "object_storage_lifecycle",
];

/// Pick the harness for `platform`
pub async fn harness_for(
    platform: PlatformType,
    ctx: &ConnectionContext,
    span: Span,
) -> Result<Box<dyn StorageHarness>> {
    match platform {
        PlatformType::Kubernetes => {
            let cluster = ctx.require_cluster("Kubernetes smoke harness")?;
            let client = TestClient::create(platform, ctx, span).await?;
            Ok(Box::new(KubernetesHarness::new(client, cluster)))
        }
        PlatformType::StandAlone => Ok(Box::new(StandAloneHarness)),
        PlatformType::BareMetal | PlatformType::None => {
            Err(Error::UnsupportedPlatform(platform.to_string()))
        }
    }
}

pub struct SmokeSuite {
    harness: Box<dyn StorageHarness>,
    installer: Option<InstallHelper>,
    span: Span,
}

impl SmokeSuite {
    /// Install the platform when on Kubernetes and not skipped, then pick
    /// the harness
    pub async fn setup(
        platform: PlatformType,
        ctx: &ConnectionContext,
        skip_install: bool,
        span: Span,
    ) -> Result<Self> {
        let installer = if platform == PlatformType::Kubernetes && !skip_install {
            let helper = InstallHelper::new(ctx.require_cluster("install")?, ctx.config.clone());
            helper.install().instrument(span.clone()).await?;
            Some(helper)
        } else {
            None
        };

        let harness = harness_for(platform, ctx, span.clone()).await?;
        info!(parent: &span, "Smoke harness for {}", harness.platform());
        Ok(Self {
            harness,
            installer,
            span,
        })
    }

    pub fn with_harness(harness: Box<dyn StorageHarness>, span: Span) -> Self {
        Self {
            harness,
            installer: None,
            span,
        }
    }

    async fn block_lifecycle(&self) -> Result<()> {
        let h = &self.harness;
        h.create_block_storage().await?;
        h.mount_block_storage().await?;
        h.write_to_block_storage(BLOCK_DATA, BLOCK_FILE).await?;
        let read = h.read_from_block_storage(BLOCK_FILE).await?;
        ensure_contains(&read, BLOCK_DATA, "block storage read back")?;
        h.unmount_block_storage().await?;
        h.delete_block_storage().await
    }

    async fn file_lifecycle(&self) -> Result<()> {
        let h = &self.harness;
        h.create_file_storage().await?;
        h.mount_file_storage().await?;
        h.write_to_file_storage(FILE_DATA, FILE_FILE).await?;
        let read = h.read_from_file_storage(FILE_FILE).await?;
        ensure_contains(&read, FILE_DATA, "file storage read back")?;
        h.unmount_file_storage().await?;
        h.delete_file_storage().await?;
        Ok(())
    }

    async fn object_lifecycle(&self) -> Result<()> {
        let h = &self.harness;
        h.create_object_store().await?;

        let created = h.create_object_store_user().await?;
        ensure_eq(created.user_id.as_str(), OBJECT_USER_ID, "created user id")?;

        let users = h.object_store_users().await?;
        ensure(
            users.iter().any(|u| u.user_id == OBJECT_USER_ID),
            format!("user {} missing from user list", OBJECT_USER_ID),
        )?;

        let user = h.object_store_user(OBJECT_USER_ID).await?;
        ensure_eq(
            user.display_name.as_deref(),
            Some(OBJECT_USER_DISPLAY_NAME),
            "user display name",
        )?;

        let connection = h.object_store_connection().await?;
        ensure(!connection.host.is_empty(), "connection info has no host")?;

        let buckets = h.object_store_buckets().await?;
        info!("Object store has {} bucket(s)", buckets.len());
        // the user was just created
        ensure(
            !buckets.iter().any(|b| b.owner == OBJECT_USER_ID),
            format!("new user {} already owns buckets", OBJECT_USER_ID),
        )?;
        let url = h.rgw_service_url().await?;
        info!("Gateway reachable at {}", url);

        h.delete_object_store_user().await?;
        let users = h.object_store_users().await?;
        ensure(
            !users.iter().any(|u| u.user_id == OBJECT_USER_ID),
            format!("user {} still listed after delete", OBJECT_USER_ID),
        )
    }
}

#[async_trait]
impl Suite for SmokeSuite {
    fn name(&self) -> &str {
        "smoke"
    }

    fn cases(&self) -> Vec<&'static str> {
        CASES.to_vec()
    }

    fn span(&self) -> &Span {
        &self.span
    }

    async fn run_case(&self, case: &str) -> Result<()> {
        match case {
            "block_storage_lifecycle" => self.block_lifecycle().await,
            "file_storage_lifecycle" => self.file_lifecycle().await,
            "object_storage_lifecycle" => self.object_lifecycle().await,
            other => Err(unknown_case(self.name(), other)),
        }
    }

    async fn teardown_test(&self, _case: &str) -> CleanupReport {
        self.harness.cleanup().await
    }

    async fn teardown_suite(&self) -> CleanupReport {
        match &self.installer {
            Some(installer) => installer.uninstall().await.into(),
            None => CleanupReport::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::domain::model::{ObjectBucket, PodState, ResourceAction};
    use crate::suite::{CaseOutcome, SuiteRunner};
    use crate::testing::{FakeCluster, FakeTransport, InMemoryRestApi};
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    fn fast_config() -> HarnessConfig {
        HarnessConfig {
            poll_interval_secs: 1,
            poll_timeout_secs: 1,
            pool_settle_secs: 0,
            ..Default::default()
        }
    }

    struct Fixture {
        cluster: Arc<FakeCluster>,
        transport: Arc<FakeTransport>,
        rest: Arc<InMemoryRestApi>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                cluster: Arc::new(FakeCluster::new()),
                transport: Arc::new(FakeTransport::new()),
                rest: Arc::new(InMemoryRestApi::new()),
            }
        }

        fn harness(&self, config: HarnessConfig) -> KubernetesHarness {
            let client = TestClient::kubernetes(
                self.transport.clone(),
                self.cluster.clone(),
                self.rest.clone(),
                config,
                Span::none(),
            );
            KubernetesHarness::new(client, self.cluster.clone())
        }
    }

    #[tokio::test]
    async fn test_kubernetes_smoke_run_passes() {
        let fx = Fixture::new();
        fx.cluster.set_pvc_phases("block-pv-claim", &["Bound"]);
        fx.cluster
            .set_pod_states("block-test", &[PodState::Running, PodState::Absent]);
        fx.cluster
            .set_pod_states("file-test", &[PodState::Running, PodState::Absent]);
        fx.cluster.set_pod_ips(&["10.2.0.5", "10.2.0.6", "10.2.0.7"]);
        fx.cluster.set_service_ready("rook-ceph-rgw", &[true]);
        fx.cluster.set_service_ready("rgw-external", &[true]);
        fx.cluster.set_host_ip("172.17.4.201");
        fx.transport.respond("", 0);
        fx.transport.respond(&format!("{}\n", BLOCK_DATA), 0);
        fx.transport.respond("", 0);
        fx.transport.respond(&format!("{}\n", FILE_DATA), 0);

        let suite = SmokeSuite::with_harness(Box::new(fx.harness(fast_config())), Span::none());
        let report = SuiteRunner::new().run(&suite).await;

        for case in &report.cases {
            assert_eq!(case.outcome, CaseOutcome::Passed, "case {}", case.name);
            assert!(case.cleanup.is_clean(), "cleanup of {}", case.name);
        }
        assert!(report.all_passed());
        assert!(fx.rest.object_store_created());

        let created = fx.cluster.manifests(ResourceAction::Create);
        assert!(created.iter().any(|p| p.ends_with("smoke/rgw_external.yaml")));
        assert!(created.iter().any(|p| p.ends_with("smoke/pool_sc.yaml")));

        // the filesystem mount is rendered with the monitor addresses
        let (_, _, vars) = fx
            .cluster
            .operations()
            .into_iter()
            .find(|(_, p, _)| p.ends_with("smoke/file_mount.tmpl"))
            .unwrap();
        assert_eq!(
            vars["monitors"],
            "10.2.0.5:6790, 10.2.0.6:6790, 10.2.0.7:6790"
        );
        assert_eq!(vars["mon2"], "10.2.0.7");

        let calls = fx.transport.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(
            calls[1].display(),
            "kubectl exec block-test -n default -- cat /tmp/rook1/bsFile1"
        );
    }

    fn bucket(name: &str, owner: &str) -> ObjectBucket {
        ObjectBucket {
            name: name.into(),
            owner: owner.into(),
            created_at: None,
            size: 0,
            number_of_objects: 0,
        }
    }

    fn object_fixture(buckets: Vec<ObjectBucket>) -> Fixture {
        let fx = Fixture {
            rest: Arc::new(InMemoryRestApi::new().with_buckets(buckets)),
            ..Fixture::new()
        };
        fx.cluster.set_service_ready("rook-ceph-rgw", &[true]);
        fx.cluster.set_service_ready("rgw-external", &[true]);
        fx.cluster.set_host_ip("172.17.4.201");
        fx
    }

    #[tokio::test]
    async fn test_object_lifecycle_checks_bucket_owners() {
        let fx = object_fixture(vec![bucket("logs", "admin")]);
        let suite = SmokeSuite::with_harness(Box::new(fx.harness(fast_config())), Span::none());
        assert_ok!(suite.run_case("object_storage_lifecycle").await);

        let fx = object_fixture(vec![bucket("logs", "admin"), bucket("stale", OBJECT_USER_ID)]);
        let suite = SmokeSuite::with_harness(Box::new(fx.harness(fast_config())), Span::none());
        assert_matches!(
            suite.run_case("object_storage_lifecycle").await,
            Err(Error::AssertionFailed(message)) if message.contains("already owns buckets")
        );
    }

    #[tokio::test]
    async fn test_stand_alone_cases_fail_not_yet_implemented() {
        let suite = SmokeSuite::with_harness(Box::new(StandAloneHarness), Span::none());
        let report = SuiteRunner::new().run(&suite).await;

        assert_eq!(report.failed(), 3);
        for case in &report.cases {
            assert_matches!(
                &case.outcome,
                CaseOutcome::Failed(reason) if reason.starts_with("NOT YET IMPLEMENTED")
            );
        }
        assert!(report.teardown.is_clean());
    }

    #[tokio::test]
    async fn test_harness_for_platforms() {
        let ctx = ConnectionContext::offline(HarnessConfig::default());
        assert!(matches!(
            harness_for(PlatformType::BareMetal, &ctx, Span::none()).await,
            Err(Error::UnsupportedPlatform(_))
        ));
        assert!(matches!(
            harness_for(PlatformType::Kubernetes, &ctx, Span::none()).await,
            Err(Error::Configuration(_))
        ));
        let harness = assert_ok!(harness_for(PlatformType::StandAlone, &ctx, Span::none()).await);
        assert_eq!(harness.platform(), PlatformType::StandAlone);
    }

    #[tokio::test]
    async fn test_legacy_kubernetes_uses_legacy_pool_manifest() {
        let fx = Fixture::new();
        fx.cluster.set_pvc_phases("block-pv-claim", &["Bound"]);
        let config = HarnessConfig {
            k8s_version: "v1.5".into(),
            ..fast_config()
        };
        let harness = fx.harness(config);

        assert_ok!(harness.create_block_storage().await);
        let created = fx.cluster.manifests(ResourceAction::Create);
        assert!(created[0].ends_with("smoke/pool_sc_1_5.yaml"));
        assert!(created[1].ends_with("smoke/pool_pvc.yaml"));
    }

    #[tokio::test]
    async fn test_mount_timeout_is_cleaned_up_by_teardown() {
        let fx = Fixture::new();
        fx.cluster.set_pvc_phases("block-pv-claim", &["Bound"]);
        // block-test never runs
        let suite = SmokeSuite::with_harness(Box::new(fx.harness(fast_config())), Span::none());

        assert_matches!(
            suite.run_case("block_storage_lifecycle").await,
            Err(Error::ResourceNotReady { .. })
        );
        let cleanup = suite.teardown_test("block_storage_lifecycle").await;
        assert!(cleanup.is_clean());

        let deleted = fx.cluster.manifests(ResourceAction::Delete);
        assert_eq!(deleted.len(), 3);
        assert!(deleted[0].ends_with("smoke/block_mount.yaml"));
        assert!(deleted[1].ends_with("smoke/pool_pvc.yaml"));
        assert!(deleted[2].ends_with("smoke/pool_sc.yaml"));

        // nothing left to remove the second time
        let again = suite.teardown_test("block_storage_lifecycle").await;
        assert!(again.deleted.is_empty());
    }
}
