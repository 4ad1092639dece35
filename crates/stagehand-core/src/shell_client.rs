use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{ActionClient, ActionHandle};
use crate::config::PipelineSettings;
use crate::error::ClientError;
use crate::output::OutputSink;

/// Return the platform-appropriate shell executable and flag for running commands.
///
/// On Windows, returns `("cmd", "/C")` to invoke `cmd.exe /C <command>`.
/// On Unix-like systems, returns `("sh", "-c")` to invoke `sh -c <command>`.
pub fn shell_command() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

/// [`ActionClient`] that delegates each remote call to a configured shell command.
pub struct ShellActionClient {
    settings: PipelineSettings,
    namespace: String,
    sink: Arc<dyn OutputSink>,
}

impl ShellActionClient {
    pub fn new(settings: PipelineSettings, namespace: &str, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            settings,
            namespace: namespace.to_string(),
            sink,
        }
    }

    fn command(
        &self,
        key: &str,
        template: Option<&String>,
        env: &[(&str, &str)],
    ) -> Result<Command, ClientError> {
        let script = template.ok_or_else(|| ClientError::Remote {
            operation: key.to_string(),
            message: format!("no 'pipeline.{}' command configured", key),
        })?;
        let (shell, shell_flag) = shell_command();
        let mut cmd = Command::new(shell);
        cmd.arg(shell_flag)
            .arg(script)
            .env("STAGEHAND_NAMESPACE", &self.namespace)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for &(key, val) in env {
            cmd.env(key, val);
        }
        Ok(cmd)
    }
}

#[async_trait]
impl ActionClient for ShellActionClient {
    async fn destroy(&self, name: &str, destroy_volumes: bool) -> Result<ActionHandle, ClientError> {
        let volumes = if destroy_volumes { "true" } else { "false" };
        let output = self
            .command(
                "destroy",
                self.settings.destroy.as_ref(),
                &[
                    ("STAGEHAND_PIPELINE_NAME", name),
                    ("STAGEHAND_DESTROY_VOLUMES", volumes),
                ],
            )?
            .output()
            .await?;

        if !output.status.success() {
            if output.status.code() == Some(self.settings.not_found_exit_code) {
                return Err(ClientError::NotFound);
            }
            return Err(ClientError::Remote {
                operation: "destroy".to_string(),
                message: failure_message(&output.stderr, output.status.code()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let action = stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .ok_or_else(|| ClientError::Remote {
                operation: "destroy".to_string(),
                message: "command did not print an action name".to_string(),
            })?;
        Ok(ActionHandle::new(action))
    }

    async fn wait_for_action_to_finish(
        &self,
        cancel: &CancellationToken,
        name: &str,
        namespace: &str,
        action: &str,
        timeout: Duration,
    ) -> Result<(), ClientError> {
        let mut cmd = self.command(
            "wait",
            self.settings.wait.as_ref(),
            &[
                ("STAGEHAND_PIPELINE_NAME", name),
                ("STAGEHAND_NAMESPACE", namespace),
                ("STAGEHAND_ACTION_NAME", action),
            ],
        )?;
        let output = cmd.stdout(Stdio::null()).stderr(Stdio::piped()).output();

        let output = if timeout.is_zero() {
            tokio::select! {
                output = output => output?,
                _ = cancel.cancelled() => return Ok(()),
            }
        } else {
            tokio::select! {
                output = tokio::time::timeout(timeout, output) => {
                    output.map_err(|_| ClientError::Timeout(timeout))??
                }
                _ = cancel.cancelled() => return Ok(()),
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(ClientError::Remote {
                operation: "wait".to_string(),
                message: failure_message(&output.stderr, output.status.code()),
            })
        }
    }

    async fn stream_logs(
        &self,
        cancel: &CancellationToken,
        name: &str,
        namespace: &str,
        action: &str,
    ) -> Result<(), ClientError> {
        let mut child = self
            .command(
                "logs",
                self.settings.logs.as_ref(),
                &[
                    ("STAGEHAND_PIPELINE_NAME", name),
                    ("STAGEHAND_NAMESPACE", namespace),
                    ("STAGEHAND_ACTION_NAME", action),
                ],
            )?
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let Some(stdout) = child.stdout.take() else {
            return Ok(());
        };
        let mut lines = BufReader::new(stdout).split(b'\n');

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("log stream for action '{}' cancelled", action);
                    return Ok(());
                }
                line = lines.next_segment() => match line? {
                    Some(raw) => {
                        let line = String::from_utf8_lossy(&raw);
                        self.sink.println(line.trim_end_matches('\r'));
                    }
                    None => break,
                },
            }
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(ClientError::Remote {
                operation: "logs".to_string(),
                message: format!("exited with code {}", status.code().unwrap_or(-1)),
            })
        }
    }
}

fn failure_message(stderr: &[u8], code: Option<i32>) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exited with code {}", code.unwrap_or(-1))
    } else {
        stderr.to_string()
    }
}
