use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use log::{info, warn};
use tokio::process::Command;

use crate::command::CommandInvocation;
use crate::error::ExecutionError;
use crate::harness::result::FAILURE_EXIT_CODE;

/// What a finished external process left behind
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// The external process collaborator
///
/// `execute` runs one invocation to completion. If the wall time budget elapses first the
/// harness drops the `execute` future and then calls `cancel` exactly once.
#[async_trait]
pub trait ProcessBackend: Send + Sync {
    async fn execute(&self, invocation: &CommandInvocation) -> Result<ProcessOutput, ExecutionError>;

    fn cancel(&self, invocation: &CommandInvocation);
}

/// Runs the command string through a POSIX shell
///
/// The shell `exec`s the command so the child is the tool itself, and the child is killed when
/// the `execute` future is dropped. A redirect target receives standard output.
pub struct ShellBackend {
    shell: PathBuf,
}

impl ShellBackend {
    pub fn new(shell: impl Into<PathBuf>) -> ShellBackend {
        ShellBackend { shell: shell.into() }
    }
}

impl Default for ShellBackend {
    fn default() -> Self {
        ShellBackend::new("/bin/sh")
    }
}

#[async_trait]
impl ProcessBackend for ShellBackend {
    async fn execute(&self, invocation: &CommandInvocation) -> Result<ProcessOutput, ExecutionError> {
        let script = format!("exec {}", invocation.command());

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&script)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = invocation.working_dir() {
            cmd.current_dir(dir);
        }

        match invocation.redirect_target() {
            Some(target) => {
                let file = File::create(target).map_err(|source| ExecutionError::Redirect {
                    path: target.to_path_buf(),
                    source,
                })?;
                cmd.stdout(Stdio::from(file));
            }
            None => {
                cmd.stdout(Stdio::piped());
            }
        }

        info!("Running process {}", invocation);
        let child = cmd.spawn().map_err(|source| ExecutionError::Spawn {
            command: invocation.command().to_string(),
            source,
        })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| ExecutionError::Backend(err.to_string()))?;

        Ok(ProcessOutput {
            // killed by a signal
            exit_code: output.status.code().unwrap_or(FAILURE_EXIT_CODE),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn cancel(&self, invocation: &CommandInvocation) {
        // the child was killed when the execute future was dropped
        warn!("Cancelled {} after {:?}", invocation.module(), invocation.wall_time());
    }
}
