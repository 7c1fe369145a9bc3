use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use hive_core::api::{HostPlatform, ShellError, ShellExec, ShellOutput};

/// Runs commands through `sh -c` or `powershell -Command`.
#[derive(Debug, Clone)]
pub struct HostShell {
    platform: HostPlatform,
}

impl Default for HostShell {
    fn default() -> Self {
        Self::new(HostPlatform::current())
    }
}

impl HostShell {
    pub fn new(platform: HostPlatform) -> Self {
        Self { platform }
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = match self.platform {
            HostPlatform::Windows => {
                let mut c = Command::new("powershell");
                c.args(["-NoProfile", "-NonInteractive", "-Command", command]);
                c
            }
            HostPlatform::Posix => {
                let mut c = Command::new("sh");
                c.args(["-c", command]);
                c
            }
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ShellExec for HostShell {
    async fn exec(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ShellOutput, ShellError> {
        let mut cmd = self.command(command);
        cmd.current_dir(cwd);

        tracing::debug!(
            target: "hive.shell",
            command = command,
            cwd = %cwd.display(),
            timeout_ms = timeout.as_millis() as u64,
            "spawn"
        );

        let child = cmd.spawn().map_err(|e| ShellError::Spawn(e.to_string()))?;
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ShellError::Io(e.to_string()))?,
            Err(_) => return Err(ShellError::Timeout(timeout.as_millis() as u64)),
        };

        Ok(ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        })
    }
}
