//! Test clients
//!
//! [`TestClient`] is the per-suite facade: built once for a platform, it
//! owns the transport, the management API client and the resource specific
//! operators wired on top of them.
//!
//! ```text
//! TestClient ──► BlockOperator ─────┐
//!            ├─► FileSystemOperator ┼─► PodMounter ─► ClusterOperator + TransportClient
//!            ├─► ObjectOperator ────┤
//!            ├─► PoolOperator ──────┴─► TrackingRestApi ─► RestApiClient
//!            └─► TransportClient
//! ```

pub mod block;
pub mod filesystem;
pub mod mount;
pub mod object;
pub mod pool;
pub mod rest;
pub mod tracking;

pub use block::K8sBlockOperator;
pub use filesystem::K8sFileSystemOperator;
pub use mount::PodMounter;
pub use object::{GatewaySettings, K8sObjectOperator};
pub use pool::RestPoolOperator;
pub use rest::RestApiClient;
pub use tracking::{ResourceTracker, ResourceTrackerRef, TrackingRestApi};

use crate::cluster::K8sHelper;
use crate::config::HarnessConfig;
use crate::domain::model::{Node, StatusDetails};
use crate::domain::platform::PlatformType;
use crate::domain::ports::{
    BlockOperatorRef, ClusterOperator, ClusterOperatorRef, FileSystemOperatorRef,
    ObjectOperatorRef, PoolOperatorRef, RestApiOperatorRef, TransportClientRef,
};
use crate::error::{Error, Result};
use crate::transport::K8sTransportClient;
use std::sync::Arc;
use tracing::{info, Instrument, Span};

/// Pool every deployment starts with
pub const DEFAULT_POOL: &str = "rbd";

// =============================================================================
// Connection Context
// =============================================================================

/// What a test client needs to reach the system under test
#[derive(Clone)]
pub struct ConnectionContext {
    /// Cluster access, absent when running without Kubernetes
    pub cluster: Option<ClusterOperatorRef>,
    pub config: HarnessConfig,
}

impl ConnectionContext {
    /// Connect to the cluster from the ambient kubeconfig
    pub async fn kubernetes(config: HarnessConfig) -> Result<Self> {
        let helper = K8sHelper::connect(config.namespace.clone()).await?;
        Ok(Self::with_cluster(Arc::new(helper), config))
    }

    pub fn with_cluster(cluster: ClusterOperatorRef, config: HarnessConfig) -> Self {
        Self {
            cluster: Some(cluster),
            config,
        }
    }

    pub fn offline(config: HarnessConfig) -> Self {
        Self {
            cluster: None,
            config,
        }
    }

    /// Cluster access or a configuration error naming what needed it
    pub fn require_cluster(&self, purpose: &str) -> Result<ClusterOperatorRef> {
        self.cluster.clone().ok_or_else(|| {
            Error::Configuration(format!("{} requires a Kubernetes connection", purpose))
        })
    }
}

/// Base URL of the management API
///
/// The configured endpoint wins; otherwise the API service is looked up.
pub async fn resolve_api_endpoint(
    cluster: &dyn ClusterOperator,
    config: &HarnessConfig,
) -> Result<String> {
    if let Some(endpoint) = &config.api_endpoint {
        return Ok(endpoint.clone());
    }
    let address = cluster
        .service_address(&config.api_service, &config.namespace)
        .await?
        .ok_or_else(|| Error::ResourceNotFound {
            kind: "Service".into(),
            name: config.api_service.clone(),
        })?;
    Ok(format!("http://{}:{}", address.cluster_ip, address.port))
}

// =============================================================================
// Test Client
// =============================================================================

/// Operators for one platform, scoped to one suite
pub struct TestClient {
    platform: PlatformType,
    transport: Option<TransportClientRef>,
    block: Option<BlockOperatorRef>,
    filesystem: Option<FileSystemOperatorRef>,
    object: Option<ObjectOperatorRef>,
    pool: Option<PoolOperatorRef>,
    rest: Option<RestApiOperatorRef>,
    tracker: ResourceTrackerRef,
    config: HarnessConfig,
    span: Span,
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("platform", &self.platform)
            .field("namespace", &self.config.namespace)
            .field("transport", &self.transport.is_some())
            .field("rest", &self.rest.is_some())
            .field("operators", &self.block.is_some())
            .finish()
    }
}

impl TestClient {
    /// Build the client for `platform`
    pub async fn create(platform: PlatformType, ctx: &ConnectionContext, span: Span) -> Result<Self> {
        match platform {
            PlatformType::Kubernetes => {
                let cluster = ctx.require_cluster("Kubernetes test client")?;
                let endpoint = resolve_api_endpoint(cluster.as_ref(), &ctx.config)
                    .instrument(span.clone())
                    .await?;
                info!(parent: &span, "Management API at {}", endpoint);

                let rest = RestApiClient::new(endpoint, ctx.config.http_timeout())?;
                let transport = K8sTransportClient::new(ctx.config.kubectl.clone());
                Ok(Self::kubernetes(
                    Arc::new(transport),
                    cluster,
                    Arc::new(rest),
                    ctx.config.clone(),
                    span,
                ))
            }
            PlatformType::StandAlone => {
                let rest = match &ctx.config.api_endpoint {
                    Some(endpoint) => Some(Arc::new(RestApiClient::new(
                        endpoint.clone(),
                        ctx.config.http_timeout(),
                    )?) as RestApiOperatorRef),
                    None => None,
                };
                Ok(Self::stand_alone(rest, ctx.config.clone(), span))
            }
            PlatformType::BareMetal | PlatformType::None => {
                Err(Error::UnsupportedPlatform(platform.to_string()))
            }
        }
    }

    /// Wire the Kubernetes operators over the given collaborators
    pub fn kubernetes(
        transport: TransportClientRef,
        cluster: ClusterOperatorRef,
        rest: RestApiOperatorRef,
        config: HarnessConfig,
        span: Span,
    ) -> Self {
        let tracker = Arc::new(ResourceTracker::new());
        let rest: RestApiOperatorRef = Arc::new(TrackingRestApi::new(rest, tracker.clone()));
        let policy = config.poll_policy();
        let mounter = Arc::new(PodMounter::new(cluster.clone(), transport.clone(), policy));

        Self {
            platform: PlatformType::Kubernetes,
            block: Some(Arc::new(K8sBlockOperator::new(rest.clone(), mounter.clone()))),
            filesystem: Some(Arc::new(K8sFileSystemOperator::new(
                rest.clone(),
                mounter,
                DEFAULT_POOL,
            ))),
            object: Some(Arc::new(K8sObjectOperator::new(
                rest.clone(),
                cluster,
                GatewaySettings::from_config(&config),
                policy,
            ))),
            pool: Some(Arc::new(RestPoolOperator::new(rest.clone()))),
            transport: Some(transport),
            rest: Some(rest),
            tracker,
            config,
            span,
        }
    }

    /// Client whose operators are not available yet
    pub fn stand_alone(rest: Option<RestApiOperatorRef>, config: HarnessConfig, span: Span) -> Self {
        let tracker = Arc::new(ResourceTracker::new());
        let rest = rest.map(|inner| {
            Arc::new(TrackingRestApi::new(inner, tracker.clone())) as RestApiOperatorRef
        });
        Self {
            platform: PlatformType::StandAlone,
            transport: None,
            block: None,
            filesystem: None,
            object: None,
            pool: None,
            rest,
            tracker,
            config,
            span,
        }
    }

    fn require<T: Clone>(&self, operator: &Option<T>, operation: &str) -> Result<T> {
        operator
            .clone()
            .ok_or_else(|| Error::not_yet_implemented(self.platform, operation))
    }

    pub fn platform(&self) -> PlatformType {
        self.platform
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Resources created through this client's management API
    pub fn tracker(&self) -> &ResourceTrackerRef {
        &self.tracker
    }

    pub fn transport(&self) -> Result<TransportClientRef> {
        self.require(&self.transport, "transport client")
    }

    pub fn block(&self) -> Result<BlockOperatorRef> {
        self.require(&self.block, "block operations")
    }

    pub fn filesystem(&self) -> Result<FileSystemOperatorRef> {
        self.require(&self.filesystem, "filesystem operations")
    }

    pub fn object(&self) -> Result<ObjectOperatorRef> {
        self.require(&self.object, "object store operations")
    }

    pub fn pool(&self) -> Result<PoolOperatorRef> {
        self.require(&self.pool, "pool operations")
    }

    pub fn rest(&self) -> Result<RestApiOperatorRef> {
        self.require(&self.rest, "management API client")
    }

    /// Cluster status from the management API
    pub async fn status(&self) -> Result<StatusDetails> {
        let rest = self.rest()?;
        rest.get_status_details().instrument(self.span.clone()).await
    }

    /// Version reported by the storage CLI in the tools pod
    pub async fn version(&self) -> Result<String> {
        let transport = self.transport()?;
        let result = transport
            .exec_in_pod(
                &self.config.tools_pod,
                &self.config.namespace,
                vec!["rook".to_string(), "version".to_string()],
                None,
            )
            .instrument(self.span.clone())
            .await;
        Ok(result.into_stdout()?.trim().to_string())
    }

    pub async fn nodes(&self) -> Result<Vec<Node>> {
        let rest = self.rest()?;
        rest.get_nodes().instrument(self.span.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{BlockImage, ServiceAddress};
    use crate::testing::{FakeCluster, FakeTransport, InMemoryRestApi};
    use assert_matches::assert_matches;

    fn k8s_client(transport: Arc<FakeTransport>) -> TestClient {
        TestClient::kubernetes(
            transport,
            Arc::new(FakeCluster::new()),
            Arc::new(InMemoryRestApi::new()),
            HarnessConfig::default(),
            Span::none(),
        )
    }

    #[tokio::test]
    async fn test_kubernetes_client_has_all_operators() {
        let client = k8s_client(Arc::new(FakeTransport::new()));
        assert_eq!(client.platform(), PlatformType::Kubernetes);
        assert!(client.transport().is_ok());
        assert!(client.filesystem().is_ok());
        assert!(client.object().is_ok());
        assert!(client.pool().is_ok());

        // creates through any operator land in the shared tracker
        client
            .block()
            .unwrap()
            .block_create(&BlockImage::new("testImage", 123, "rbd"))
            .await
            .unwrap();
        assert_eq!(client.tracker().images().len(), 1);
        assert_eq!(client.status().await.unwrap().overall, "OK");
        assert_eq!(client.nodes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_version_runs_in_tools_pod() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond("rook: v0.5.0\n", 0);
        let client = k8s_client(transport.clone());

        assert_eq!(client.version().await.unwrap(), "rook: v0.5.0");
        assert_eq!(
            transport.calls()[0].display(),
            "kubectl exec rook-tools -n rook -- rook version"
        );
    }

    #[tokio::test]
    async fn test_version_failure_is_remote_command_failure() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond("", 126);
        let client = k8s_client(transport);
        assert_matches!(
            client.version().await,
            Err(Error::RemoteCommandFailure { exit_code: 126, .. })
        );
    }

    #[tokio::test]
    async fn test_stand_alone_operators_not_yet_implemented() {
        let ctx = ConnectionContext::offline(HarnessConfig::default());
        let client = TestClient::create(PlatformType::StandAlone, &ctx, Span::none())
            .await
            .unwrap();

        assert!(matches!(
            client.block(),
            Err(Error::NotYetImplemented { platform: PlatformType::StandAlone, .. })
        ));
        assert!(matches!(client.filesystem(), Err(Error::NotYetImplemented { .. })));
        assert!(matches!(client.object(), Err(Error::NotYetImplemented { .. })));
        assert!(matches!(client.pool(), Err(Error::NotYetImplemented { .. })));
        assert!(matches!(client.transport(), Err(Error::NotYetImplemented { .. })));
        assert!(matches!(client.rest(), Err(Error::NotYetImplemented { .. })));
        assert_matches!(client.version().await, Err(Error::NotYetImplemented { .. }));
    }

    #[tokio::test]
    async fn test_debug_shows_platform_and_wiring() {
        let ctx = ConnectionContext::offline(HarnessConfig::default());
        let client = TestClient::create(PlatformType::StandAlone, &ctx, Span::none())
            .await
            .unwrap();
        let shown = format!("{:?}", client);
        assert!(shown.starts_with("TestClient"));
        assert!(shown.contains("platform: StandAlone"));
        assert!(shown.contains("operators: false"));
    }

    #[tokio::test]
    async fn test_stand_alone_keeps_configured_api() {
        let config = HarnessConfig {
            api_endpoint: Some("http://127.0.0.1:8124".into()),
            ..Default::default()
        };
        let client = TestClient::create(
            PlatformType::StandAlone,
            &ConnectionContext::offline(config),
            Span::none(),
        )
        .await
        .unwrap();
        assert!(client.rest().is_ok());
        assert!(client.block().is_err());
    }

    #[tokio::test]
    async fn test_unsupported_platforms() {
        let ctx = ConnectionContext::offline(HarnessConfig::default());
        for platform in [PlatformType::BareMetal, PlatformType::None] {
            assert_matches!(
                TestClient::create(platform, &ctx, Span::none()).await,
                Err(Error::UnsupportedPlatform(_))
            );
        }
    }

    #[tokio::test]
    async fn test_kubernetes_requires_cluster() {
        let ctx = ConnectionContext::offline(HarnessConfig::default());
        assert_matches!(
            TestClient::create(PlatformType::Kubernetes, &ctx, Span::none()).await,
            Err(Error::Configuration(_))
        );
    }

    #[tokio::test]
    async fn test_resolve_api_endpoint_from_service() {
        let cluster = FakeCluster::new();
        cluster.add_service(
            "rook-api",
            ServiceAddress {
                cluster_ip: "10.3.0.12".into(),
                port: 8124,
                node_port: None,
            },
        );
        let config = HarnessConfig::default();
        assert_eq!(
            resolve_api_endpoint(&cluster, &config).await.unwrap(),
            "http://10.3.0.12:8124"
        );

        assert_matches!(
            resolve_api_endpoint(&FakeCluster::new(), &config).await,
            Err(Error::ResourceNotFound { name, .. }) if name == "rook-api"
        );
    }

    #[tokio::test]
    async fn test_kubernetes_create_with_discovered_api() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.add_service(
            "rook-api",
            ServiceAddress {
                cluster_ip: "10.3.0.12".into(),
                port: 8124,
                node_port: None,
            },
        );
        let ctx = ConnectionContext::with_cluster(cluster, HarnessConfig::default());
        let client = TestClient::create(PlatformType::Kubernetes, &ctx, Span::none())
            .await
            .unwrap();
        assert!(client.block().is_ok());
        assert!(client.rest().is_ok());
    }
}
