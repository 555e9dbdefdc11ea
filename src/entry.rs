//! The runtime side of an entry point: parsed values go into a module instance, the instance
//! builds an invocation, the harness runs it

/// In-process module state built from a descriptor
pub mod instance;

/// The generic dispatcher every generated program calls
pub mod dispatch;

pub use dispatch::{main_from_json, run};
pub use instance::{ModuleInstance, ModuleState};
