use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::Deserialize;

use crate::descriptor::parameter::{enum_members_valid, Direction, ParameterDescriptor, RESERVED_FLAGS};
use crate::descriptor::value::{Value, ValueMap, ValueType};
use crate::error::{DescriptorError, Phase, ValidationError};

static SECONDS_PER_DAY: f64 = 86_400.0;

/// An ordered collection of parameters plus invocation metadata
///
/// Immutable once constructed, so one descriptor can be shared by any number of concurrent
/// harness runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawModule")]
pub struct ModuleDescriptor {
    name: String,
    executable: String,
    wall_time: Duration,
    parameters: Vec<ParameterDescriptor>,
}

impl ModuleDescriptor {
    pub fn new(
        name: impl Into<String>,
        executable: impl Into<String>,
        wall_time: Duration,
        parameters: Vec<ParameterDescriptor>,
    ) -> Result<ModuleDescriptor, DescriptorError> {
        if wall_time.is_zero() {
            return Err(DescriptorError::NonPositiveWallTime);
        }

        let executable = executable.into();
        if is_compound(&executable) {
            return Err(DescriptorError::CompoundExecutable(executable));
        }

        check_parameters(&parameters)?;

        Ok(ModuleDescriptor {
            name: name.into(),
            executable,
            wall_time,
            parameters,
        })
    }

    /// Parse descriptor JSON without schema validation, see [load](crate::descriptor::load) for files
    pub fn from_json(json: &str) -> Result<ModuleDescriptor, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn wall_time(&self) -> Duration {
        self.wall_time
    }

    /// Parameters in declaration order
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    /// Parameters sorted by order, ties keep declaration order
    pub fn ordered(&self) -> Vec<&ParameterDescriptor> {
        let mut ordered: Vec<&ParameterDescriptor> = self.parameters.iter().collect();
        // sort_by_key is stable
        ordered.sort_by_key(|p| p.order());
        ordered
    }

    pub fn redirect(&self) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.is_redirect())
    }

    /// Default values of every parameter that declares one
    pub fn defaults(&self) -> ValueMap {
        self.parameters
            .iter()
            .filter_map(|p| p.default_value().map(|v| (p.name(), v.clone())))
            .collect()
    }

    /// Check the values that belong to one validation phase
    ///
    /// Every value is checked against its declared type. Required parameters of the phase's
    /// direction must have a value or a default.
    pub fn validate(&self, values: &ValueMap, phase: Phase) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (name, value) in values.iter() {
            match self.parameter(name) {
                Some(param) => {
                    if let Some(err) = check_value(param, value) {
                        errors.push(err);
                    }
                }
                None => errors.push(ValidationError::UnknownParameter(name.clone())),
            }
        }

        let direction = match phase {
            Phase::Input => Direction::Input,
            Phase::Output => Direction::Output,
        };
        for param in self.parameters.iter().filter(|p| p.direction() == direction) {
            if param.is_required() && !values.contains(param.name()) && param.default_value().is_none() {
                errors.push(ValidationError::MissingRequired {
                    name: param.name().to_string(),
                    phase,
                });
            }
        }

        errors
    }
}

/// The harness `exec`s the command, so the executable must be a single simple command
fn is_compound(executable: &str) -> bool {
    executable.contains(|c| matches!(c, ';' | '&' | '|' | '`' | '<' | '>' | '\n')) || executable.contains("$(")
}

/// Per-parameter checks plus name, redirect and flag uniqueness
fn check_parameters(parameters: &[ParameterDescriptor]) -> Result<(), DescriptorError> {
    let mut names = HashSet::new();
    let mut redirect: Option<&str> = None;
    // flag text -> parameter that owns it
    let mut flags: HashMap<String, &str> = HashMap::new();

    for param in parameters {
        param.check()?;

        if !names.insert(param.name()) {
            return Err(DescriptorError::DuplicateName(param.name().to_string()));
        }

        if param.is_redirect() {
            if let Some(first) = redirect {
                return Err(DescriptorError::MultipleRedirects {
                    first: first.to_string(),
                    second: param.name().to_string(),
                });
            }
            redirect = Some(param.name());
        }

        let long = param.long_flag();
        let mut spellings = vec![long.clone()];
        if !param.flag().is_empty() && param.flag() != long {
            spellings.push(param.flag().to_string());
        }

        for flag in spellings {
            if RESERVED_FLAGS.contains(&flag.as_str()) {
                return Err(DescriptorError::ReservedFlag {
                    name: param.name().to_string(),
                    flag,
                });
            }
            if let Some(first) = flags.insert(flag.clone(), param.name()) {
                return Err(DescriptorError::FlagCollision {
                    flag,
                    first: first.to_string(),
                    second: param.name().to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Type and enum membership check of a single value
pub(crate) fn check_value(param: &ParameterDescriptor, value: &Value) -> Option<ValidationError> {
    if !param.value_type().conforms(value) {
        return Some(ValidationError::TypeMismatch {
            name: param.name().to_string(),
            expected: param.value_type().to_string(),
        });
    }
    if !value.is_millisecond_precise() {
        return Some(ValidationError::Malformed {
            name: param.name().to_string(),
            value: value.to_string(),
            reason: "dates carry millisecond precision".to_string(),
        });
    }
    if !enum_members_valid(param.value_type(), value) {
        let valid = match param.value_type() {
            ValueType::Enum(constants) => constants.clone(),
            ValueType::List(element) => match &**element {
                ValueType::Enum(constants) => constants.clone(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        return Some(ValidationError::NotInSet {
            name: param.name().to_string(),
            value: enum_text(value),
            valid,
        });
    }
    None
}

fn enum_text(value: &Value) -> String {
    match value {
        Value::Enum(v) => v.clone(),
        Value::List(values) => values.iter().map(enum_text).collect::<Vec<_>>().join(","),
        other => format!("{other:?}"),
    }
}

fn default_wall_time_days() -> f64 {
    1.0
}

/// Descriptor JSON form of a module
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModule {
    name: String,
    executable: String,
    #[serde(default = "default_wall_time_days")]
    wall_time_days: f64,
    #[serde(default)]
    parameters: Vec<ParameterDescriptor>,
}

impl TryFrom<RawModule> for ModuleDescriptor {
    type Error = DescriptorError;

    fn try_from(raw: RawModule) -> Result<Self, Self::Error> {
        if !raw.wall_time_days.is_finite() || raw.wall_time_days <= 0.0 {
            return Err(DescriptorError::NonPositiveWallTime);
        }
        let wall_time = Duration::try_from_secs_f64(raw.wall_time_days * SECONDS_PER_DAY)
            .map_err(|_| DescriptorError::WallTimeOutOfRange(raw.wall_time_days))?;
        ModuleDescriptor::new(raw.name, raw.executable, wall_time, raw.parameters)
    }
}
