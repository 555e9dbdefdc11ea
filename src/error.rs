//! Error kinds shared by the descriptor model, the command line codecs and the harness
//!
//! Descriptor, validation, serialization and deserialization errors are resolved before a
//! command ever reaches the harness. Execution errors are collaborator faults: a clean nonzero
//! exit or a timeout is a normal [ExecutionResult](crate::harness::result::ExecutionResult).

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed module or parameter descriptor
#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    #[error("Parameter names can't be empty or contain whitespace: {0:?}")]
    InvalidName(String),

    #[error("Duplicate parameter name: {0}")]
    DuplicateName(String),

    #[error("Only one parameter may redirect standard output ({first} and {second} both do)")]
    MultipleRedirects { first: String, second: String },

    #[error("Wall time budget must be positive")]
    NonPositiveWallTime,

    #[error("Executable must be a single command without shell operators: {0:?}")]
    CompoundExecutable(String),

    #[error("Wall time budget of {0} days is out of range")]
    WallTimeOutOfRange(f64),

    #[error("Flag {flag} is used by both {first} and {second}")]
    FlagCollision { flag: String, first: String, second: String },

    #[error("Parameter {name} uses reserved flag {flag}")]
    ReservedFlag { name: String, flag: String },

    #[error("Boolean parameter {0} needs a flag")]
    PositionalBoolean(String),

    #[error("Parameter {0} has an unsupported list element type")]
    UnsupportedList(String),

    #[error("Enum parameter {0} declares no constants")]
    EmptyEnum(String),

    #[error("Redirect parameter {0} must be a file path")]
    RedirectNotFile(String),

    #[error("Invalid default for parameter {name}: {reason}")]
    InvalidDefault { name: String, reason: String },

    #[error("Can't load descriptor {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },
}

/// Validation happens in two phases: inputs before serialization, outputs after execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Input,
    Output,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Phase::Input => write!(f, "input"),
            Phase::Output => write!(f, "output"),
        }
    }
}

/// A single field failed a presence, type or membership check
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Missing required {phase} parameter: {name}")]
    MissingRequired { name: String, phase: Phase },

    #[error("Missing value after {flag}")]
    MissingValue { flag: String },

    #[error("Invalid value {value:?} for {name}: {reason}")]
    Malformed { name: String, value: String, reason: String },

    #[error("Invalid value {value:?} for {name}, expected one of [{valid}]", valid = .valid.join(", "))]
    NotInSet { name: String, value: String, valid: Vec<String> },

    #[error("Parameter {name} expects a value of type {expected}")]
    TypeMismatch { name: String, expected: String },

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Output {name} was not produced: {}", .path.display())]
    MissingOutput { name: String, path: PathBuf },
}

/// A value can't be formatted onto the command line
#[derive(Debug, Error, PartialEq)]
pub enum SerializationError {
    #[error("Invalid value {value:?} for {name}, expected one of [{valid}]", valid = .valid.join(", "))]
    NotInSet { name: String, value: String, valid: Vec<String> },

    #[error("Parameter {name} expects a value of type {expected}")]
    TypeMismatch { name: String, expected: String },

    #[error("Date value for {name} has sub-millisecond precision: {value}")]
    SubMillisecondDate { name: String, value: String },

    #[error("Flagged parameter {0} can't follow a positional value that needed the end-of-options marker")]
    FlagAfterEndOfOptions(String),

    #[error("Can't resolve executable template {template:?}: {reason}")]
    Template { template: String, reason: String },

    #[error("Can't make an absolute path for {name}: {reason}")]
    Path { name: String, reason: String },
}

/// Non-fatal problems met while walking a token list
#[derive(Debug, Error, PartialEq)]
pub enum DeserializationError {
    #[error("Unrecognised flag: {0}")]
    UnrecognizedFlag(String),

    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("Flag {0} given more than once, keeping the last value")]
    Repeated(String),
}

/// The process collaborator failed, as opposed to the process exiting nonzero
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Can't start the harness worker: {0}")]
    Worker(#[source] io::Error),

    #[error("Can't start {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Can't open redirect target {}: {source}", .path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Process backend fault: {0}")]
    Backend(String),
}

/// Why a module instance couldn't produce an invocation
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{} invalid input(s): {}", .0.len(), join(.0))]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<String>>().join("; ")
}
