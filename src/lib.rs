//! modwrap wraps command line tools described by JSON module descriptors
//!
//! A [descriptor](descriptor) declares a tool's parameters. The [command] module serializes a
//! descriptor and its values into a command line, [args] parses entry point command lines back
//! into values, and the [harness] runs the command under a wall time budget and tells observers
//! how it went. [emit] generates one standalone program per descriptor, each a thin wrapper
//! around [entry::run].

pub mod args;
pub mod command;
pub mod db;
pub mod descriptor;
pub mod emit;
pub mod entry;
pub mod error;
pub mod harness;
pub mod settings;
