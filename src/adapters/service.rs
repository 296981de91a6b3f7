use crate::domain::ports::ServiceControl;
use crate::utils::error::{Result, WardenError};
use async_trait::async_trait;
use std::path::PathBuf;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::process::Command;

/// Controls the service through shell commands and tracks it by pid file.
#[derive(Debug, Clone)]
pub struct CommandService {
    stop_command: String,
    start_command: String,
    pid_file: PathBuf,
}

impl CommandService {
    pub fn new(
        stop_command: impl Into<String>,
        start_command: impl Into<String>,
        pid_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stop_command: stop_command.into(),
            start_command: start_command.into(),
            pid_file: pid_file.into(),
        }
    }

    async fn run(&self, command: &str) -> Result<()> {
        tracing::debug!("▶️ running '{}'", command);
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| WardenError::ServiceCommandError {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WardenError::ServiceCommandError {
                command: command.to_string(),
                message: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}

/// 對應 `test -f pid_file && kill -0 $(cat pid_file)`
pub fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}

#[async_trait]
impl ServiceControl for CommandService {
    async fn stop(&self) -> Result<()> {
        self.run(&self.stop_command).await
    }

    async fn start(&self) -> Result<()> {
        self.run(&self.start_command).await
    }

    async fn is_running(&self) -> Result<bool> {
        let content = match tokio::fs::read_to_string(&self.pid_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        match content.trim().parse::<u32>() {
            Ok(pid) => Ok(process_alive(pid)),
            Err(_) => {
                tracing::warn!("⚠️ pid file {} does not hold a pid", self.pid_file.display());
                Ok(false)
            }
        }
    }
}
