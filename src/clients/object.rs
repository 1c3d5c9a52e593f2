//! Object store operator for Kubernetes
//!
//! Creating the store is only half the job: the gateway service has to come
//! up, and an external NodePort service is added once so clients outside
//! the cluster can reach it.

use crate::cluster::wait::wait_for_service_up;
use crate::config::{HarnessConfig, PollPolicy};
use crate::domain::model::{ObjectBucket, ObjectStoreConnectInfo, ObjectUser, ResourceAction};
use crate::domain::ports::{ClusterOperatorRef, ObjectOperator, RestApiOperatorRef};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Where the object gateway lives and how to expose it
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub namespace: String,
    pub service: String,
    pub external_service: String,
    /// Manifest of the external service
    pub external_manifest: PathBuf,
}

impl GatewaySettings {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            service: config.rgw_service.clone(),
            external_service: config.rgw_external_service.clone(),
            external_manifest: config.data_path("smoke/rgw_external.yaml"),
        }
    }
}

pub struct K8sObjectOperator {
    rest: RestApiOperatorRef,
    cluster: ClusterOperatorRef,
    gateway: GatewaySettings,
    policy: PollPolicy,
}

impl K8sObjectOperator {
    pub fn new(
        rest: RestApiOperatorRef,
        cluster: ClusterOperatorRef,
        gateway: GatewaySettings,
        policy: PollPolicy,
    ) -> Self {
        Self {
            rest,
            cluster,
            gateway,
            policy,
        }
    }

    /// Create the external service unless it already exists
    async fn expose_gateway(&self) -> Result<()> {
        let gw = &self.gateway;
        if self
            .cluster
            .service_exists(&gw.external_service, &gw.namespace)
            .await?
        {
            info!("Service {} already exposes the gateway", gw.external_service);
            return Ok(());
        }

        info!("Exposing object gateway through {}", gw.external_service);
        self.cluster
            .resource_operation(ResourceAction::Create, &gw.external_manifest, &BTreeMap::new())
            .await?;
        wait_for_service_up(
            self.cluster.as_ref(),
            &self.policy,
            &gw.external_service,
            &gw.namespace,
        )
        .await
    }
}

#[async_trait]
impl ObjectOperator for K8sObjectOperator {
    async fn object_create(&self) -> Result<String> {
        let message = self.rest.create_object_store().await?;
        info!("Object store requested: {}", message.trim());

        wait_for_service_up(
            self.cluster.as_ref(),
            &self.policy,
            &self.gateway.service,
            &self.gateway.namespace,
        )
        .await?;
        self.expose_gateway().await?;
        Ok("object store created".to_string())
    }

    async fn object_create_user(&self, user_id: &str, display_name: &str) -> Result<ObjectUser> {
        let user = ObjectUser {
            user_id: user_id.to_string(),
            display_name: Some(display_name.to_string()),
            ..Default::default()
        };
        self.rest.create_object_user(&user).await
    }

    async fn object_list_users(&self) -> Result<Vec<ObjectUser>> {
        self.rest.get_object_users().await
    }

    async fn object_get_user(&self, user_id: &str) -> Result<ObjectUser> {
        self.rest.get_object_user(user_id).await
    }

    async fn object_delete_user(&self, user_id: &str) -> Result<()> {
        self.rest.delete_object_user(user_id).await
    }

    async fn object_connection(&self) -> Result<ObjectStoreConnectInfo> {
        self.rest.get_object_store_connection_info().await
    }

    async fn object_bucket_list(&self) -> Result<Vec<ObjectBucket>> {
        self.rest.get_buckets().await
    }
}
