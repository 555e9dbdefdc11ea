//! Run serialized invocations, bounded by a wall time budget, and notify observers

/// Execution lifecycle states
pub mod state;

/// Execution results and produced artifacts
pub mod result;

/// The external process collaborator and its shell implementation
pub mod process;

/// Logging and persisting observers
pub mod observer;

/// Dry and real runs, timeouts and output validation
pub mod run;

pub use observer::{LoggingObserver, Observer, PersistingObserver};
pub use process::{ProcessBackend, ProcessOutput, ShellBackend};
pub use result::{Artifact, ExecutionResult};
pub use run::{Harness, RunMode};
pub use state::ExecutionState;
