//! Pod mount lifecycle shared by the block and filesystem operators
//!
//! A pod that mounts storage moves Unmounted -> Pending -> Mounted when its
//! manifest is applied and it is observed running, and back through Pending
//! when the manifest is deleted. A wait that runs out leaves the pod Pending
//! and the manifest in place.

use crate::cluster::wait::wait_for_pod_state;
use crate::config::PollPolicy;
use crate::domain::model::{MountSpec, MountState, PodState, ResourceAction};
use crate::domain::ports::{ClusterOperatorRef, TransportClientRef};
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::info;

/// Applies mount manifests and runs commands in the mounting pods
pub struct PodMounter {
    cluster: ClusterOperatorRef,
    transport: TransportClientRef,
    policy: PollPolicy,
    states: Mutex<HashMap<String, MountState>>,
}

fn pod_key(spec: &MountSpec) -> String {
    format!("{}/{}", spec.namespace, spec.pod_name)
}

/// Wrap a value in single quotes for `sh -c`
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

impl PodMounter {
    pub fn new(cluster: ClusterOperatorRef, transport: TransportClientRef, policy: PollPolicy) -> Self {
        Self {
            cluster,
            transport,
            policy,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self, spec: &MountSpec) -> MountState {
        self.states
            .lock()
            .get(&pod_key(spec))
            .copied()
            .unwrap_or_default()
    }

    fn set_state(&self, spec: &MountSpec, state: MountState) {
        self.states.lock().insert(pod_key(spec), state);
    }

    /// Create the pod and wait for it to run
    pub async fn mount(&self, spec: &MountSpec) -> Result<String> {
        info!("Mounting {} in pod {}", spec.mount_path, pod_key(spec));
        let output = self
            .cluster
            .resource_operation(ResourceAction::Create, &spec.manifest, &spec.vars)
            .await?;
        self.set_state(spec, MountState::Pending);

        wait_for_pod_state(
            self.cluster.as_ref(),
            &self.policy,
            &spec.pod_name,
            &spec.namespace,
            &[PodState::Running],
        )
        .await?;
        self.set_state(spec, MountState::Mounted);
        Ok(output)
    }

    /// Delete the pod and wait for it to stop
    pub async fn unmount(&self, spec: &MountSpec) -> Result<String> {
        info!("Unmounting {} from pod {}", spec.mount_path, pod_key(spec));
        let output = self
            .cluster
            .resource_operation(ResourceAction::Delete, &spec.manifest, &spec.vars)
            .await?;
        self.set_state(spec, MountState::Pending);

        wait_for_pod_state(
            self.cluster.as_ref(),
            &self.policy,
            &spec.pod_name,
            &spec.namespace,
            &[PodState::Terminated, PodState::Absent],
        )
        .await?;
        self.set_state(spec, MountState::Unmounted);
        Ok(output)
    }

    /// Write `data` to a file under the mount point, returning raw stdout
    pub async fn write(&self, spec: &MountSpec, data: &str, filename: &str) -> Result<String> {
        let script = format!(
            "echo {} > {}",
            shell_quote(data),
            shell_quote(&spec.file_path(filename))
        );
        self.transport
            .exec_in_pod(
                &spec.pod_name,
                &spec.namespace,
                vec!["sh".to_string(), "-c".to_string(), script],
                None,
            )
            .await
            .into_stdout()
    }

    /// Read a file under the mount point, returning raw stdout
    pub async fn read(&self, spec: &MountSpec, filename: &str) -> Result<String> {
        self.transport
            .exec_in_pod(
                &spec.pod_name,
                &spec.namespace,
                vec!["cat".to_string(), spec.file_path(filename)],
                None,
            )
            .await
            .into_stdout()
    }
}
