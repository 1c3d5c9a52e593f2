//! Kubernetes transport client
//!
//! Runs commands as local processes and reaches into pods through
//! `kubectl exec`.

use crate::domain::model::{CommandArgs, CommandResult};
use crate::domain::ports::TransportClient;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Transport client for Kubernetes-hosted deployments
#[derive(Debug, Clone)]
pub struct K8sTransportClient {
    /// kubectl binary used for pod exec
    kubectl: String,
}

impl Default for K8sTransportClient {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl K8sTransportClient {
    pub fn new(kubectl: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
        }
    }

    /// Build the `kubectl exec` invocation for a pod command
    pub fn pod_exec_args(
        &self,
        pod: &str,
        namespace: &str,
        command: Vec<String>,
        stdin: Option<String>,
    ) -> CommandArgs {
        let mut args = CommandArgs::new(&self.kubectl)
            .sub_command("exec")
            .args([pod, "-n", namespace]);
        if stdin.is_some() {
            args = args.arg("-i");
        }
        args = args.arg("--").args(command);
        if let Some(payload) = stdin {
            args = args.stdin(payload);
        }
        args
    }
}

#[async_trait]
impl TransportClient for K8sTransportClient {
    async fn execute(&self, args: CommandArgs) -> CommandResult {
        let shown = args.display();
        debug!("Executing: {}", shown);

        let mut cmd = Command::new(&args.command);
        cmd.args(args.argv())
            .envs(args.env_pairs())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if args.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn `{}`: {}", shown, e);
                return CommandResult::transport_error(shown, e.to_string());
            }
        };

        if let (Some(payload), Some(mut stdin)) = (args.stdin.as_ref(), child.stdin.take()) {
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                return CommandResult::transport_error(
                    shown,
                    format!("failed to write stdin: {}", e),
                );
            }
            // closing stdin lets the process see EOF
            drop(stdin);
        }

        match child.wait_with_output().await {
            Ok(output) => {
                let result = CommandResult {
                    command: shown,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code().unwrap_or(-1),
                    error: None,
                };
                debug!(
                    "Command `{}` exited with {}",
                    result.command, result.exit_code
                );
                result
            }
            Err(e) => CommandResult::transport_error(shown, e.to_string()),
        }
    }

    async fn exec_in_pod(
        &self,
        pod: &str,
        namespace: &str,
        command: Vec<String>,
        stdin: Option<String>,
    ) -> CommandResult {
        let args = self.pod_exec_args(pod, namespace, command, stdin);
        self.execute(args).await
    }
}
