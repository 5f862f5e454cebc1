//! Builder for running external tools (git, docker) with consistent logging and errors.
//!
//! Every invocation is logged at debug level under the `process` target, bounded by a
//! timeout, and mapped onto [`JarflowError::ToolNotFound`] or
//! [`JarflowError::ToolCommandFailed`] on failure so callers can tell a missing
//! binary from a failed operation.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::{DOCKER_BUILD_TIMEOUT, GIT_COMMAND_TIMEOUT};
use crate::core::JarflowError;

/// A pending invocation of an external program.
pub struct ToolCommand {
    program: String,

    args: Vec<String>,

    current_dir: Option<PathBuf>,

    capture_output: bool,

    env_vars: Vec<(String, String)>,

    timeout_duration: Option<Duration>,

    context: Option<String>,
}

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            capture_output: true,
            env_vars: Vec::new(),
            timeout_duration: Some(GIT_COMMAND_TIMEOUT),
            context: None,
        }
    }

    /// A `git` invocation.
    pub fn git() -> Self {
        Self::new("git")
    }

    /// A `docker` invocation with the build timeout.
    pub fn docker() -> Self {
        Self::new("docker").with_timeout(Some(DOCKER_BUILD_TIMEOUT))
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Stream output to the terminal instead of capturing it (long docker builds).
    pub const fn inherit_stdio(mut self) -> Self {
        self.capture_output = false;
        self
    }

    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    pub async fn execute(self) -> Result<ToolOutput> {
        let start = std::time::Instant::now();

        if which::which(&self.program).is_err() {
            return Err(JarflowError::ToolNotFound {
                tool: self.program.clone(),
            }
            .into());
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        let rendered = format!("{} {}", self.program, self.args.join(" "));
        match self.context {
            Some(ref ctx) => tracing::debug!(target: "process", "({}) Executing: {}", ctx, rendered),
            None => tracing::debug!(target: "process", "Executing: {}", rendered),
        }

        for (key, value) in &self.env_vars {
            tracing::trace!(target: "process", "Setting env var: {}", key);
            cmd.env(key, value);
        }

        if self.capture_output {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());
        }
        cmd.kill_on_drop(true);

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            match timeout(duration, output_future).await {
                Ok(result) => result.with_context(|| format!("Failed to execute {rendered}"))?,
                Err(_) => {
                    tracing::warn!(
                        target: "process",
                        "Command timed out after {} seconds: {}",
                        duration.as_secs(),
                        rendered
                    );
                    return Err(JarflowError::ToolCommandFailed {
                        tool: self.program.clone(),
                        operation: self.operation(),
                        stderr: format!("timed out after {} seconds", duration.as_secs()),
                    }
                    .into());
                }
            }
        } else {
            output_future.await.with_context(|| format!("Failed to execute {rendered}"))?
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "process",
                "Command failed with exit code: {:?}",
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "process", "Error: {}", stderr.trim());
            }
            return Err(JarflowError::ToolCommandFailed {
                tool: self.program.clone(),
                operation: self.operation(),
                stderr: if stderr.is_empty() { stdout } else { stderr },
            }
            .into());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(
                target: "process::perf",
                "{} {} took {:.2}s",
                self.program,
                self.operation(),
                elapsed.as_secs_f64()
            );
        }

        Ok(ToolOutput {
            stdout,
            stderr,
        })
    }

    /// Run and return trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let out = ToolCommand::new("sh").args(["-c", "echo hello"]).execute_stdout().await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let err = ToolCommand::new("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .execute()
            .await
            .unwrap_err();
        match err.downcast_ref::<JarflowError>() {
            Some(JarflowError::ToolCommandFailed {
                tool,
                stderr,
                ..
            }) => {
                assert_eq!(tool, "sh");
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_not_found() {
        let err = ToolCommand::new("jarflow-definitely-missing-binary").execute().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JarflowError>(),
            Some(JarflowError::ToolNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let err = ToolCommand::new("sh")
            .args(["-c", "sleep 5"])
            .with_timeout(Some(Duration::from_millis(50)))
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sh -c failed"));
    }
}
