//! Bounded polling for observable cluster state
//!
//! Every wait is a plain sleep loop: check, sleep for the policy interval,
//! check again, and give up with `ResourceNotReady` once the policy timeout
//! has elapsed. There is no cancellation other than exhaustion.

use crate::config::PollPolicy;
use crate::domain::model::PodState;
use crate::domain::ports::ClusterOperator;
use crate::error::{Error, Result};
use std::future::Future;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// What a wait is waiting for, used in logs and the timeout error
#[derive(Debug, Clone)]
pub struct WaitTarget {
    pub kind: String,
    pub name: String,
    pub expected: String,
}

impl WaitTarget {
    pub fn new(kind: &str, name: &str, expected: impl std::fmt::Display) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Poll `check` until it reports `true` or the policy is exhausted
///
/// Check errors count as "not yet" so an API hiccup mid-wait does not abort
/// the wait; the last error is logged.
pub async fn poll_until<F, Fut>(policy: &PollPolicy, target: WaitTarget, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match check().await {
            Ok(true) => {
                debug!(
                    "{}/{} reached {} after {} attempt(s)",
                    target.kind, target.name, target.expected, attempt
                );
                return Ok(());
            }
            Ok(false) => debug!(
                "Waiting for {}/{} to be {} (attempt {})",
                target.kind, target.name, target.expected, attempt
            ),
            Err(e) => debug!(
                "Check for {}/{} failed (attempt {}): {}",
                target.kind, target.name, attempt, e
            ),
        }

        if start.elapsed() + policy.interval > policy.timeout {
            return Err(Error::ResourceNotReady {
                kind: target.kind,
                name: target.name,
                expected: target.expected,
                waited: start.elapsed(),
            });
        }
        sleep(policy.interval).await;
    }
}

/// Wait until the pods matching `name_prefix` are in one of `accepted`
pub async fn wait_for_pod_state(
    cluster: &dyn ClusterOperator,
    policy: &PollPolicy,
    name_prefix: &str,
    namespace: &str,
    accepted: &[PodState],
) -> Result<()> {
    let expected = accepted
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|");
    poll_until(policy, WaitTarget::new("Pod", name_prefix, expected), move || async move {
        let state = cluster.pod_state(name_prefix, namespace).await?;
        Ok(accepted.contains(&state))
    })
    .await
}

/// Wait until a persistent volume claim is bound
pub async fn wait_for_pvc_bound(
    cluster: &dyn ClusterOperator,
    policy: &PollPolicy,
    name: &str,
    namespace: &str,
) -> Result<()> {
    poll_until(
        policy,
        WaitTarget::new("PersistentVolumeClaim", name, "Bound"),
        move || async move {
            let phase = cluster.pvc_phase(name, namespace).await?;
            Ok(phase.as_deref() == Some("Bound"))
        },
    )
    .await
}

/// Wait until a service has a ready endpoint
pub async fn wait_for_service_up(
    cluster: &dyn ClusterOperator,
    policy: &PollPolicy,
    name: &str,
    namespace: &str,
) -> Result<()> {
    poll_until(policy, WaitTarget::new("Service", name, "up"), move || {
        cluster.service_ready(name, namespace)
    })
    .await
}
