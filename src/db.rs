//! Job state persistence
//!
//! The persisting observer records every finished real run: module, identifiers, command,
//! terminal state, exit code, captured output, and (with `--persistFileData`) the produced
//! artifacts.

pub mod open;
pub mod store;

pub use store::{JobRow, RunIdentifiers, SqliteStore, StateStore};
