//! Install and uninstall the system under test
//!
//! Installation applies every `*.yaml` file under `<data_dir>/install` in
//! lexical order, retrying a manifest while the cluster cannot serve its
//! kinds yet (custom resources appear only once the operator registered
//! them), waits for the operator and API pods, then retries the
//! management API's `/status` with exponential backoff until it answers or
//! the install timeout runs out.

use crate::clients::{resolve_api_endpoint, RestApiClient};
use crate::cluster::wait::wait_for_pod_state;
use crate::config::HarnessConfig;
use crate::domain::model::{PodState, ResourceAction, StatusDetails};
use crate::domain::ports::{ClusterOperatorRef, RestApiOperator};
use crate::error::{Error, Result};
use backoff::ExponentialBackoffBuilder;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a best-effort uninstall
#[derive(Debug, Default)]
pub struct UninstallReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl UninstallReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Retry `op` while it fails with a transient error
///
/// Permanent errors return immediately; the last transient error is
/// returned once `max_elapsed` has passed.
pub async fn retry_transient<T, F, Fut>(
    initial: Duration,
    max_elapsed: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(initial)
        .with_max_elapsed_time(Some(max_elapsed))
        .build();

    backoff::future::retry_notify(
        policy,
        || {
            let attempt = op();
            async move {
                attempt.await.map_err(|e| {
                    if e.is_transient() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        },
        |e: Error, next: Duration| debug!("Not ready yet ({}), retrying in {:?}", e, next),
    )
    .await
}

/// Installs the storage platform from manifest files
pub struct InstallHelper {
    cluster: ClusterOperatorRef,
    config: HarnessConfig,
    /// First backoff interval for manifest and API retries
    retry_interval: Duration,
}

impl InstallHelper {
    pub fn new(cluster: ClusterOperatorRef, config: HarnessConfig) -> Self {
        Self {
            cluster,
            config,
            retry_interval: Duration::from_secs(1),
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Install manifests in apply order
    pub fn manifests(&self) -> Result<Vec<PathBuf>> {
        let dir = self.config.data_path("install");
        let pattern = dir.join("*.yaml");
        let pattern = pattern.to_str().ok_or_else(|| {
            Error::Configuration(format!("non UTF-8 data dir: {}", dir.display()))
        })?;

        let mut paths = glob::glob(pattern)
            .map_err(|e| Error::Configuration(format!("bad manifest pattern: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Io(e.into_error()))?;
        paths.sort();

        if paths.is_empty() {
            return Err(Error::Configuration(format!(
                "no install manifests under {}",
                dir.display()
            )));
        }
        Ok(paths)
    }

    /// Install and wait until the management API answers
    pub async fn install(&self) -> Result<StatusDetails> {
        self.apply_manifests().await?;
        self.wait_for_pods().await?;

        let endpoint = resolve_api_endpoint(self.cluster.as_ref(), &self.config).await?;
        let rest = RestApiClient::new(endpoint, self.config.http_timeout())?;
        self.wait_for_api(&rest).await
    }

    /// Create every install manifest; already existing resources are kept
    ///
    /// Transient failures (kind discovery, API server hiccups) are retried
    /// with backoff bounded by the install timeout.
    pub async fn apply_manifests(&self) -> Result<()> {
        let vars = BTreeMap::new();
        for manifest in self.manifests()? {
            info!("Installing {}", manifest.display());
            let applied = retry_transient(
                self.retry_interval,
                self.config.install_timeout(),
                || {
                    self.cluster
                        .resource_operation(ResourceAction::Create, &manifest, &vars)
                },
            )
            .await;
            match applied {
                Ok(_) => {}
                Err(e) if e.is_duplicate() => info!("Already installed: {}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Wait for the operator and API pods to run
    pub async fn wait_for_pods(&self) -> Result<()> {
        let policy = self.config.poll_policy();
        let operator = wait_for_pod_state(
            self.cluster.as_ref(),
            &policy,
            &self.config.operator_pod,
            &self.config.operator_namespace,
            &[PodState::Running],
        );
        let api = wait_for_pod_state(
            self.cluster.as_ref(),
            &policy,
            &self.config.api_service,
            &self.config.namespace,
            &[PodState::Running],
        );
        futures::future::try_join(operator, api).await?;
        Ok(())
    }

    /// Poll `/status` until it answers or the install timeout is spent
    pub async fn wait_for_api(&self, rest: &dyn RestApiOperator) -> Result<StatusDetails> {
        let status = retry_transient(self.retry_interval, self.config.install_timeout(), || {
            rest.get_status_details()
        })
        .await?;
        info!("Management API is up, overall status {}", status.overall);
        Ok(status)
    }

    /// Delete install manifests in reverse order, continuing past failures
    pub async fn uninstall(&self) -> UninstallReport {
        let mut report = UninstallReport::default();
        let manifests = match self.manifests() {
            Ok(manifests) => manifests,
            Err(e) => {
                warn!("Nothing to uninstall: {}", e);
                return report;
            }
        };

        for manifest in manifests.into_iter().rev() {
            match self
                .cluster
                .resource_operation(ResourceAction::Delete, &manifest, &BTreeMap::new())
                .await
            {
                Ok(_) => report.removed.push(manifest),
                Err(e) => {
                    warn!("Failed to remove {}: {}", manifest.display(), e);
                    report.failed.push((manifest, e.to_string()));
                }
            }
        }
        report
    }
}
