//! Immutable descriptions of wrapped tools
//!
//! A [ModuleDescriptor](module::ModuleDescriptor) is an ordered list of typed
//! [ParameterDescriptor](parameter::ParameterDescriptor)s plus an executable template and a
//! wall time budget. Descriptors are built by hand or loaded from JSON files, and are consumed
//! by both the command serializer and the argument deserializer.

/// Typed description of one invocation parameter
pub mod parameter;

/// Ordered parameter collections, construction checks and phase validation
pub mod module;

/// Value types, concrete values and value maps
pub mod value;

/// Read descriptor JSON files and validate them against the embedded schema
pub mod load;

pub use module::ModuleDescriptor;
pub use parameter::{Direction, ParameterDescriptor};
pub use value::{Value, ValueMap, ValueType};
