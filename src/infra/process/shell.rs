//! Built-in `shell` process: run one external command per task.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::core::{Process, ProcessRegistry, SchedulerError, TaskError, TaskRecord};

/// Kind name the shell process is registered under.
pub const SHELL_KIND: &str = "shell";

/// Payload of a `shell` task.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellPayload {
    /// Program to execute.
    pub command: String,
    /// Arguments passed verbatim.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Runs `payload.command` and fails the task on a non-zero exit.
#[derive(Debug, Default)]
pub struct ShellProcess {
    payload: Option<ShellPayload>,
}

impl ShellProcess {
    /// Register the `shell` kind.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::DuplicateProcess`] if `shell` is already taken.
    pub fn register(registry: &mut ProcessRegistry) -> Result<(), SchedulerError> {
        registry.register(SHELL_KIND, |_| Box::new(Self::default()))
    }
}

#[async_trait]
impl Process for ShellProcess {
    async fn setup(&mut self, record: &TaskRecord) -> anyhow::Result<()> {
        let payload = ShellPayload::deserialize(&record.payload)
            .map_err(|e| TaskError::new("invalid shell payload").with_debug(e.to_string()))?;
        self.payload = Some(payload);
        Ok(())
    }

    async fn run_process(&mut self, _record: &TaskRecord) -> anyhow::Result<()> {
        let Some(payload) = self.payload.as_ref() else {
            return Err(TaskError::new("shell payload missing").into());
        };
        let output = Command::new(&payload.command)
            .args(&payload.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                TaskError::new(format!("failed to start `{}`", payload.command)).with_debug(e.to_string())
            })?;

        if output.status.success() {
            tracing::debug!(command = %payload.command, "command succeeded");
            return Ok(());
        }
        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        Err(TaskError::new(format!("command exited with status {code}"))
            .with_debug(String::from_utf8_lossy(&output.stderr).into_owned())
            .into())
    }
}
