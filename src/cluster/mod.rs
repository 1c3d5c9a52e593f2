//! Kubernetes cluster helper
//!
//! Implements [`ClusterOperator`] on top of kube-rs: manifest create/delete
//! through API discovery plus the pod, PVC and service queries the waits use.

pub mod manifest;
pub mod wait;

use crate::domain::model::{PodState, ResourceAction, ServiceAddress};
use crate::domain::ports::ClusterOperator;
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Endpoints, PersistentVolumeClaim, Pod, Service};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::core::DynamicObject;
use kube::discovery::{self, Scope};
use kube::Client;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use tracing::{debug, info};

/// Cluster helper bound to one kube client
#[derive(Clone)]
pub struct K8sHelper {
    client: Client,
    /// Namespace for namespaced resources that do not name one
    default_namespace: String,
}

impl K8sHelper {
    /// Connect using the ambient kubeconfig or in-cluster configuration
    pub async fn connect(default_namespace: impl Into<String>) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::new(client, default_namespace))
    }

    pub fn new(client: Client, default_namespace: impl Into<String>) -> Self {
        Self {
            client,
            default_namespace: default_namespace.into(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Dynamic API handle for an object, honouring its scope
    async fn api_for(&self, obj: &DynamicObject) -> Result<(Api<DynamicObject>, String)> {
        let gvk = manifest::gvk_of(obj)?;
        let (resource, caps) = discovery::pinned_kind(&self.client, &gvk).await?;
        let name = obj.metadata.name.clone().ok_or_else(|| Error::Manifest {
            path: gvk.kind.clone(),
            reason: "missing metadata.name".into(),
        })?;

        let api = if matches!(caps.scope, Scope::Namespaced) {
            let ns = obj
                .metadata
                .namespace
                .as_deref()
                .unwrap_or(&self.default_namespace);
            Api::namespaced_with(self.client.clone(), ns, &resource)
        } else {
            Api::all_with(self.client.clone(), &resource)
        };
        Ok((api, format!("{}/{}", gvk.kind, name)))
    }

    async fn pods_with_prefix(&self, name_prefix: &str, namespace: &str) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .filter(|p| {
                p.metadata
                    .name
                    .as_deref()
                    .map(|n| n.starts_with(name_prefix))
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Create or delete one object, reporting conflicts and absences as
    /// outcomes rather than errors
    async fn apply_one(&self, action: ResourceAction, obj: DynamicObject) -> Result<Applied> {
        let (api, label) = self.api_for(&obj).await?;
        let name = obj.metadata.name.clone().unwrap_or_default();
        match action {
            ResourceAction::Create => match api.create(&PostParams::default(), &obj).await {
                Ok(_) => Ok(Applied::Done(format!("{} created", label))),
                Err(e) if is_conflict(&e) => Ok(Applied::Exists { label, name }),
                Err(e) => Err(e.into()),
            },
            ResourceAction::Delete => match api.delete(&name, &DeleteParams::default()).await {
                Ok(_) => Ok(Applied::Done(format!("{} deleted", label))),
                Err(e) if is_not_found(&e) => {
                    debug!("{} already gone", label);
                    Ok(Applied::Done(format!("{} not found", label)))
                }
                Err(e) => Err(e.into()),
            },
        }
    }
}

/// Result of applying one manifest document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Done(String),
    /// Create hit an existing object
    Exists { label: String, name: String },
}

/// Apply every document of a manifest in order
///
/// A conflicting create does not stop the remaining documents; once all
/// were tried the first conflict is returned as `DuplicateResource`.
pub async fn apply_documents<F, Fut>(
    objects: Vec<DynamicObject>,
    action: ResourceAction,
    manifest_path: &Path,
    mut apply: F,
) -> Result<String>
where
    F: FnMut(DynamicObject) -> Fut,
    Fut: Future<Output = Result<Applied>>,
{
    info!(
        "Running {} for {} resource(s) from {}",
        action,
        objects.len(),
        manifest_path.display()
    );

    let mut lines = Vec::with_capacity(objects.len());
    let mut conflict = None;
    for obj in objects {
        match apply(obj).await? {
            Applied::Done(line) => lines.push(line),
            Applied::Exists { label, name } => {
                lines.push(format!("{} already exists", label));
                conflict.get_or_insert((label, name));
            }
        }
    }

    match conflict {
        Some((kind, name)) => {
            info!("{}", lines.join("; "));
            Err(Error::DuplicateResource {
                kind,
                name,
                scope: manifest_path.display().to_string(),
            })
        }
        None => Ok(lines.join("\n")),
    }
}

/// Collapse the phases of matching pods into one state
///
/// Any running pod wins; a pod being deleted counts as terminated.
pub fn aggregate_pod_state(pods: &[Pod]) -> PodState {
    if pods.is_empty() {
        return PodState::Absent;
    }
    let states: Vec<PodState> = pods
        .iter()
        .map(|pod| {
            if pod.metadata.deletion_timestamp.is_some() {
                return PodState::Terminated;
            }
            match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
                Some("Running") => PodState::Running,
                Some("Succeeded") | Some("Failed") => PodState::Terminated,
                _ => PodState::Pending,
            }
        })
        .collect();

    if states.contains(&PodState::Running) {
        PodState::Running
    } else if states.contains(&PodState::Pending) {
        PodState::Pending
    } else {
        PodState::Terminated
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409)
}

#[async_trait]
impl ClusterOperator for K8sHelper {
    async fn resource_operation(
        &self,
        action: ResourceAction,
        manifest_path: &Path,
        vars: &BTreeMap<String, String>,
    ) -> Result<String> {
        let mut objects = manifest::load(manifest_path, vars)?;
        if action == ResourceAction::Delete {
            // dependents first
            objects.reverse();
        }

        apply_documents(objects, action, manifest_path, |obj| self.apply_one(action, obj)).await
    }

    async fn pod_state(&self, name_prefix: &str, namespace: &str) -> Result<PodState> {
        let pods = self.pods_with_prefix(name_prefix, namespace).await?;
        Ok(aggregate_pod_state(&pods))
    }

    async fn pvc_phase(&self, name: &str, namespace: &str) -> Result<Option<String>> {
        let pvcs: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        Ok(pvcs
            .get_opt(name)
            .await?
            .and_then(|pvc| pvc.status)
            .and_then(|status| status.phase))
    }

    async fn service_exists(&self, name: &str, namespace: &str) -> Result<bool> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(services.get_opt(name).await?.is_some())
    }

    async fn service_ready(&self, name: &str, namespace: &str) -> Result<bool> {
        let endpoints: Api<Endpoints> = Api::namespaced(self.client.clone(), namespace);
        let ready = endpoints
            .get_opt(name)
            .await?
            .and_then(|ep| ep.subsets)
            .map(|subsets| {
                subsets
                    .iter()
                    .any(|s| s.addresses.as_ref().map(|a| !a.is_empty()).unwrap_or(false))
            })
            .unwrap_or(false);
        Ok(ready)
    }

    async fn service_address(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ServiceAddress>> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let Some(spec) = services.get_opt(name).await?.and_then(|svc| svc.spec) else {
            return Ok(None);
        };
        let cluster_ip = spec.cluster_ip.unwrap_or_default();
        let Some(port) = spec.ports.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };
        Ok(Some(ServiceAddress {
            cluster_ip,
            port: u16::try_from(port.port).unwrap_or_default(),
            node_port: port.node_port.and_then(|p| u16::try_from(p).ok()),
        }))
    }

    async fn pod_ips(&self, label_selector: &str, namespace: &str) -> Result<Vec<String>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let mut items = pods
            .list(&ListParams::default().labels(label_selector))
            .await?
            .items;
        items.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(items
            .into_iter()
            .filter_map(|p| p.status.and_then(|s| s.pod_ip))
            .collect())
    }

    async fn pod_host_ip(&self, name_prefix: &str, namespace: &str) -> Result<Option<String>> {
        let pods = self.pods_with_prefix(name_prefix, namespace).await?;
        Ok(pods
            .into_iter()
            .find_map(|p| p.status.and_then(|s| s.host_ip)))
    }
}
