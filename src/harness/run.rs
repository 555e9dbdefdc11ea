use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use log::{debug, info, warn};

use crate::command::{CommandInvocation, OutputSlot};
use crate::descriptor::{Direction, Value};
use crate::error::{ExecutionError, Phase, ValidationError};
use crate::harness::observer::Observer;
use crate::harness::process::{ProcessBackend, ProcessOutput};
use crate::harness::result::{Artifact, ExecutionResult, FAILURE_EXIT_CODE, TIMEOUT_EXIT_CODE};
use crate::harness::state::ExecutionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Report the invocation without starting a process
    DryRun,
    Real,
}

/// Runs one invocation at a time on a dedicated single-threaded worker
pub struct Harness {
    backend: Arc<dyn ProcessBackend>,
    observers: Vec<Box<dyn Observer>>,
    validate_outputs: bool,
}

impl Harness {
    pub fn new(backend: Arc<dyn ProcessBackend>) -> Harness {
        Harness {
            backend,
            observers: Vec::new(),
            validate_outputs: true,
        }
    }

    /// Turn the output validation phase on or off
    pub fn validate_outputs(mut self, validate: bool) -> Self {
        self.validate_outputs = validate;
        self
    }

    pub fn register(&mut self, observer: Box<dyn Observer>) {
        info!("Registering {} observer", observer.name());
        self.observers.push(observer);
    }

    /// Run an invocation and notify observers with the final result
    ///
    /// Blocks until the process finishes or the invocation's wall time budget elapses. Nonzero
    /// exits and timeouts are results, only a faulty process backend is an error (observers
    /// still see a FAILED result first).
    pub fn run(&self, invocation: CommandInvocation, mode: RunMode) -> Result<ExecutionResult, ExecutionError> {
        info!("{}: {} ({:?})", invocation.module(), ExecutionState::Pending, mode);

        let outcome = match mode {
            RunMode::DryRun => Ok(self.dry_run(&invocation)),
            RunMode::Real => self.execute(&invocation),
        };

        match outcome {
            Ok(result) => {
                info!("{}: {}", result.module, result.state);
                self.notify(&result, mode);
                Ok(result)
            }
            Err((result, err)) => {
                warn!("{}: process backend failed: {}", result.module, err);
                self.notify(&result, mode);
                Err(err)
            }
        }
    }

    fn dry_run(&self, invocation: &CommandInvocation) -> ExecutionResult {
        info!("--dryRun set, not running {}", invocation);
        let now = Utc::now();
        ExecutionResult {
            module: invocation.module().to_string(),
            command: invocation.to_string(),
            state: ExecutionState::Succeeded,
            exit_code: 0,
            stdout: invocation.to_string(),
            stderr: String::new(),
            artifacts: Vec::new(),
            error: None,
            started: now,
            finished: now,
        }
    }

    fn execute(&self, invocation: &CommandInvocation) -> Result<ExecutionResult, (ExecutionResult, ExecutionError)> {
        let started = Utc::now();
        let mut result = ExecutionResult {
            module: invocation.module().to_string(),
            command: invocation.to_string(),
            state: ExecutionState::Running,
            exit_code: FAILURE_EXIT_CODE,
            stdout: String::new(),
            stderr: String::new(),
            artifacts: Vec::new(),
            error: None,
            started,
            finished: started,
        };

        let budget = invocation.wall_time();
        info!("{}: {} with a wall time budget of {:?}", invocation.module(), ExecutionState::Running, budget);
        let outcome = match run_on_worker(&self.backend, invocation) {
            Ok(outcome) => outcome,
            Err(err) => {
                result.finished = Utc::now();
                result.state = ExecutionState::Failed;
                result.error = Some(err.to_string());
                return Err((result, err));
            }
        };
        result.finished = Utc::now();

        match outcome {
            Ok(Ok(output)) => self.complete(invocation, &mut result, output),
            Ok(Err(err)) => {
                result.state = ExecutionState::Failed;
                result.error = Some(err.to_string());
                return Err((result, err));
            }
            Err(_elapsed) => {
                self.backend.cancel(invocation);
                result.state = ExecutionState::TimedOut;
                result.exit_code = TIMEOUT_EXIT_CODE;
                result.error = Some(format!("Wall time budget of {budget:?} exceeded"));
            }
        }

        Ok(result)
    }

    fn complete(&self, invocation: &CommandInvocation, result: &mut ExecutionResult, output: ProcessOutput) {
        result.exit_code = output.exit_code;
        result.stdout = output.stdout;
        result.stderr = output.stderr;

        if output.exit_code != 0 {
            result.state = ExecutionState::Failed;
            result.error = Some(format!("Process exited with code {}", output.exit_code));
            return;
        }

        if self.validate_outputs {
            let errors = validate_outputs(invocation.outputs());
            if !errors.is_empty() {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                warn!("{} fails output validation: {}", invocation.module(), messages.join("; "));
                result.state = ExecutionState::Failed;
                result.exit_code = FAILURE_EXIT_CODE;
                result.error = Some(messages.join("; "));
                return;
            }
        } else {
            debug!("Output validation disabled for {}", invocation.module());
        }

        // only successful runs produce artifacts
        result.state = ExecutionState::Succeeded;
        result.artifacts = collect_artifacts(invocation.outputs());
    }

    fn notify(&self, result: &ExecutionResult, mode: RunMode) {
        for observer in &self.observers {
            if mode == RunMode::DryRun && observer.persists() {
                debug!("Skipping {} observer under dry run", observer.name());
                continue;
            }
            if let Err(err) = observer.notify(result) {
                warn!("{} observer failed: {:#}", observer.name(), err);
            }
        }
    }
}

type Outcome = Result<Result<ProcessOutput, ExecutionError>, tokio::time::error::Elapsed>;

/// Drive the backend on a dedicated worker thread with its own single-threaded runtime
///
/// The caller blocks until the worker returns, so `run` also works from inside an async context.
fn run_on_worker(backend: &Arc<dyn ProcessBackend>, invocation: &CommandInvocation) -> Result<Outcome, ExecutionError> {
    let budget = invocation.wall_time();

    thread::scope(|scope| {
        let worker = scope.spawn(|| -> Result<Outcome, ExecutionError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(ExecutionError::Worker)?;
            Ok(runtime.block_on(async { tokio::time::timeout(budget, backend.execute(invocation)).await }))
        });

        worker
            .join()
            .unwrap_or_else(|_| Err(ExecutionError::Backend("harness worker panicked".to_string())))
    })
}

/// Output phase: required outputs have values and their files exist
fn validate_outputs(outputs: &[OutputSlot]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for slot in outputs.iter().filter(|s| s.direction == Direction::Output && s.required) {
        match &slot.value {
            None => errors.push(ValidationError::MissingRequired {
                name: slot.name.clone(),
                phase: Phase::Output,
            }),
            Some(value) => {
                for path in files(value) {
                    if !path.exists() {
                        errors.push(ValidationError::MissingOutput {
                            name: slot.name.clone(),
                            path,
                        });
                    }
                }
            }
        }
    }

    errors
}

/// Persisted parameters with a value present after the run
fn collect_artifacts(outputs: &[OutputSlot]) -> Vec<Artifact> {
    let mut artifacts = Vec::new();

    for slot in outputs.iter().filter(|s| s.persist) {
        let value = match &slot.value {
            Some(value) => value,
            None => continue,
        };
        let items: Vec<&Value> = match value {
            Value::List(items) => items.iter().collect(),
            scalar => vec![scalar],
        };

        for item in items {
            match item {
                Value::File(path) => {
                    let path = absolute(path);
                    if !path.exists() {
                        debug!("{} wasn't produced, not recording it", path.display());
                        continue;
                    }
                    let mime_type = slot
                        .mime_type
                        .clone()
                        .unwrap_or_else(|| guess_mime_type(&path).to_string());
                    artifacts.push(Artifact {
                        name: slot.name.clone(),
                        path: path.to_string_lossy().into_owned(),
                        mime_type,
                    });
                }
                other => artifacts.push(Artifact {
                    name: slot.name.clone(),
                    path: other.to_string(),
                    mime_type: slot.mime_type.clone().unwrap_or_else(|| "text/plain".to_string()),
                }),
            }
        }
    }

    artifacts
}

fn files(value: &Value) -> Vec<PathBuf> {
    match value {
        Value::File(path) => vec![absolute(path)],
        Value::List(items) => items.iter().flat_map(files).collect(),
        _ => Vec::new(),
    }
}

/// Same resolution the serializer applied on the command line
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "bam" => "application/bam",
        "cram" => "application/cram",
        "sam" => "text/sam",
        "vcf" => "text/vcf",
        "bed" => "text/bed",
        "fa" | "fasta" => "chemical/seq-na-fasta",
        "fq" | "fastq" => "chemical/seq-na-fastq",
        "gz" => "application/x-gzip",
        "json" => "application/json",
        "txt" | "log" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str, direction: Direction, required: bool, persist: bool, value: Option<Value>) -> OutputSlot {
        OutputSlot {
            name: name.to_string(),
            direction,
            required,
            persist,
            mime_type: None,
            value,
        }
    }

    #[test]
    fn missing_output_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.vcf");
        std::fs::write(&present, "##fileformat=VCFv4.2\n").unwrap();
        let absent = dir.path().join("absent.vcf");

        let outputs = vec![
            slot("present", Direction::Output, true, false, Some(Value::File(present))),
            slot("absent", Direction::Output, true, false, Some(Value::File(absent.clone()))),
            slot("unset", Direction::Output, true, false, None),
            slot("optional", Direction::Output, false, false, None),
        ];

        assert_eq!(
            validate_outputs(&outputs),
            vec![
                ValidationError::MissingOutput { name: "absent".into(), path: absent },
                ValidationError::MissingRequired { name: "unset".into(), phase: Phase::Output },
            ]
        );
    }

    #[test]
    fn artifacts_only_include_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let bam = dir.path().join("sorted.bam");
        std::fs::write(&bam, b"BAM\x01").unwrap();
        let missing = dir.path().join("missing.bai");

        let outputs = vec![
            slot("bam", Direction::Output, false, true, Some(Value::File(bam.clone()))),
            slot("index", Direction::Output, false, true, Some(Value::File(missing))),
            slot("not_persisted", Direction::Output, false, false, Some(Value::File(bam.clone()))),
        ];

        assert_eq!(
            collect_artifacts(&outputs),
            vec![Artifact {
                name: "bam".into(),
                path: bam.to_string_lossy().into_owned(),
                mime_type: "application/bam".into(),
            }]
        );
    }

    #[test]
    fn states_are_terminal_after_running() {
        assert!(!ExecutionState::Pending.is_terminal());
        assert!(!ExecutionState::Running.is_terminal());
        assert!(ExecutionState::TimedOut.is_terminal());
        assert_eq!(ExecutionState::TimedOut.to_string(), "TIMED_OUT");
    }
}
