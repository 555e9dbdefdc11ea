use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::harness::state::ExecutionState;

/// Exit code synthesised when the wall time budget runs out
pub static TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code for validation, parse and unhandled execution failures
pub static FAILURE_EXIT_CODE: i32 = -1;

/// A value recorded as produced by a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    /// parameter the value came from
    pub name: String,
    pub path: String,
    pub mime_type: String,
}

/// Outcome of one harness run, handed to every observer
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub module: String,
    pub command: String,
    pub state: ExecutionState,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub artifacts: Vec<Artifact>,
    pub error: Option<String>,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.state == ExecutionState::Succeeded
    }
}
