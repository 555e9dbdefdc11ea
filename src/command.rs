//! Serialize a module descriptor and its values into a command invocation

/// Executable template resolution against the workflow context
pub mod template;

/// The serialized command handed to the harness
pub mod invocation;

/// Type-specific formatting of parameter values into tokens
pub mod serialize;

pub use invocation::{CommandInvocation, OutputSlot};
pub use serialize::serialize;
pub use template::WorkflowContext;
