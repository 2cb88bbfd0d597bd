//! CLI command execution helpers with automatic timing
//!
//! Wraps the `coalesce` binary built for this test run. Every command gets
//! an isolated `--config` path so tests never touch the user's config.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// CLI command builder with timing
pub struct CoalesceCommand {
    config_path: PathBuf,
    args: Vec<String>,
}

impl CoalesceCommand {
    /// Create a command using `config_path` as its config file
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Execute command and return result with timing
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();

        let output = Command::new(env!("CARGO_BIN_EXE_coalesce"))
            .arg("--config")
            .arg(&self.config_path)
            .args(&self.args)
            .env_remove("COALESCE_CONFIG")
            .env("RUST_LOG", "warn")
            .output()
            .context("Failed to execute coalesce")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }
}

/// Command execution result with timing
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if stdout contains text
    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    /// Check if stderr contains text
    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }

    /// Value of a `  key: value` line from the simulation summary
    pub fn summary(&self, key: &str) -> Option<String> {
        let prefix = format!("{}:", key);
        self.stdout
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix(&prefix))
            .map(|rest| rest.trim().to_string())
    }
}

/// Macro for convenient command construction
///
/// Usage:
/// ```
/// coalesce!(config_path, "config", "--get", "delays.search").assert_success()?;
/// ```
#[macro_export]
macro_rules! coalesce {
    ($config:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::CoalesceCommand::new($config);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_parsing() {
        let result = CommandResult {
            stdout: "Summary\n  executions:  1\n  last commit: \"hel\"\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
            duration: Duration::from_millis(10),
        };

        assert_eq!(result.summary("executions").as_deref(), Some("1"));
        assert_eq!(result.summary("last commit").as_deref(), Some("\"hel\""));
        assert_eq!(result.summary("error"), None);
    }
}
