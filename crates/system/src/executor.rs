//! Running external tools.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use wte_common::{Error, Result};

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// A short human-readable reason for a failed command.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.status {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Trait for invoking host tools (`systemctl`, `ufw`, `iptables`, ...).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program and capture its output. A non-zero exit is not an error.
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Whether `program` resolves on the search path.
    fn command_exists(&self, program: &str) -> bool;

    /// Run a program and fail unless it exits successfully.
    async fn run_checked(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(program, args).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::command(program, args, output.failure_reason()))
        }
    }
}

/// Runs commands on the local host without a shell.
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!("Local exec: {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::command(program, args, e.to_string()))?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn command_exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_runner_captures_output() {
        let runner = LocalRunner::new();
        let output = runner.run("sh", &["-c", "echo out; echo err >&2; exit 3"]).await.unwrap();

        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.failure_reason(), "err");
    }

    #[tokio::test]
    async fn test_run_checked_fails_on_nonzero_exit() {
        let runner = LocalRunner::new();
        let err = runner.run_checked("sh", &["-c", "exit 1"]).await.unwrap_err();
        assert!(err.to_string().contains("sh -c exit 1"));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let runner = LocalRunner::new();
        assert!(!runner.command_exists("wte-definitely-missing-tool"));
        assert!(runner.run("wte-definitely-missing-tool", &[]).await.is_err());
    }

    #[test]
    fn test_failure_reason_without_stderr() {
        let output = CommandOutput {
            status: Some(2),
            ..Default::default()
        };
        assert_eq!(output.failure_reason(), "exit status 2");
    }
}
