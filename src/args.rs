//! Parse entry point command lines back into parameter values

/// Options every entry point understands
pub mod options;

/// Token walking, flag matching and input validation
pub mod deserialize;

/// Usage text rendered from a descriptor
pub mod usage;

pub use deserialize::{deserialize, Deserialized, Parsed};
pub use options::EntryOptions;
pub use usage::usage;
