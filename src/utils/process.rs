//! Process execution utilities
//!
//! Runs external compilers with captured output and proper error handling.

use crate::error::{BuilderError, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info, instrument};

/// Utility for running external processes
#[derive(Debug)]
pub struct ProcessRunner {
    debug: bool,
}

/// Result of a process execution
#[derive(Debug)]
pub struct ProcessResult {
    /// Exit status code
    pub exit_code: Option<i32>,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl ProcessRunner {
    /// Create a new process runner
    #[must_use]
    pub const fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Run a command in `current_dir` with extra environment and capture its output
    #[instrument(skip(self, env_vars))]
    pub fn run_command_with_output_in(
        &self,
        command: &str,
        args: &[&str],
        env_vars: &[(String, String)],
        current_dir: Option<&Path>,
    ) -> Result<ProcessResult> {
        let cmd_str = format!("{} {}", command, args.join(" "));

        if self.debug {
            debug!("Running command: {}", cmd_str);
            if !env_vars.is_empty() {
                debug!("Environment variables: {:?}", env_vars);
            }
        } else {
            info!("+ {}", cmd_str);
        }

        let mut cmd = Command::new(command);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());

        if let Some(dir) = current_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in env_vars {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(|e| {
            BuilderError::process(
                cmd_str.clone(),
                None,
                String::new(),
                format!("Failed to execute command: {e}"),
            )
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code();

        debug!(
            "Command finished: success={}, exit_code={:?}, stdout_len={}, stderr_len={}",
            output.status.success(),
            exit_code,
            stdout.len(),
            stderr.len()
        );

        if !output.status.success() {
            debug!("Command stderr: {}", stderr);
            return Err(BuilderError::process(cmd_str, exit_code, stdout, stderr));
        }

        Ok(ProcessResult {
            exit_code,
            stdout,
            stderr,
        })
    }

    /// Check if a command can be executed, either as a path or through PATH
    #[instrument(skip(self))]
    pub fn command_exists(&self, command: &str) -> bool {
        if command.contains(std::path::MAIN_SEPARATOR) || command.contains('/') {
            return Path::new(command).is_file();
        }

        match which::which(command) {
            Ok(path) => {
                debug!("Command '{}' found at {}", command, path.display());
                true
            }
            Err(e) => {
                debug!("Command '{}' not found: {}", command, e);
                false
            }
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(false)
    }
}
