use serde::Deserialize;

use crate::descriptor::value::{Value, ValueType};
use crate::error::DescriptorError;

/// Flags every entry point understands, parameters can't claim them
pub static RESERVED_FLAGS: [&str; 8] = [
    "--workflowRunAttemptId",
    "--sampleId",
    "--dryRun",
    "--validate",
    "--persistFileData",
    "--serialize",
    "--help",
    "-?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Input,
    Output,
}

/// Typed description of one invocation parameter
///
/// Built by hand with the `with_*` methods, or read from descriptor JSON. Either way the
/// parameter is checked by [ModuleDescriptor::new](crate::descriptor::module::ModuleDescriptor::new).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawParameter")]
pub struct ParameterDescriptor {
    name: String,
    value_type: ValueType,
    direction: Direction,
    flag: String,
    delimiter: String,
    order: i32,
    required: bool,
    redirect: bool,
    wrap_in_quotes: bool,
    persist_output: bool,
    default: Option<Value>,
    mime_type: Option<String>,
    description: Option<String>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.into(),
            value_type,
            direction: Direction::Input,
            flag: String::new(),
            delimiter: " ".to_string(),
            order: 0,
            required: false,
            redirect: false,
            wrap_in_quotes: false,
            persist_output: false,
            default: None,
            mime_type: None,
            description: None,
        }
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = flag.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn redirect(mut self) -> Self {
        self.redirect = true;
        self
    }

    pub fn wrap_in_quotes(mut self) -> Self {
        self.wrap_in_quotes = true;
        self
    }

    pub fn persist_output(mut self) -> Self {
        self.persist_output = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn flag(&self) -> &str {
        &self.flag
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect
    }

    pub fn is_quoted(&self) -> bool {
        self.wrap_in_quotes
    }

    pub fn is_persisted(&self) -> bool {
        self.persist_output
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Entry point spelling of the parameter, `--<name>`
    pub fn long_flag(&self) -> String {
        format!("--{}", self.name)
    }

    /// Parameters without a flag take unflagged tokens in order
    pub fn is_positional(&self) -> bool {
        self.flag.is_empty() && !self.redirect
    }

    /// Checks that only need the parameter itself
    pub(crate) fn check(&self) -> Result<(), DescriptorError> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(DescriptorError::InvalidName(self.name.clone()));
        }

        match &self.value_type {
            ValueType::Boolean if self.flag.is_empty() => {
                return Err(DescriptorError::PositionalBoolean(self.name.clone()))
            }
            ValueType::List(element) if matches!(**element, ValueType::Boolean | ValueType::List(_)) => {
                return Err(DescriptorError::UnsupportedList(self.name.clone()))
            }
            ValueType::Enum(constants) if constants.is_empty() => {
                return Err(DescriptorError::EmptyEnum(self.name.clone()))
            }
            ValueType::List(element) if matches!(&**element, ValueType::Enum(c) if c.is_empty()) => {
                return Err(DescriptorError::EmptyEnum(self.name.clone()))
            }
            _ => {}
        }

        if self.redirect && self.value_type != ValueType::File {
            return Err(DescriptorError::RedirectNotFile(self.name.clone()));
        }

        if let Some(default) = &self.default {
            let fits = self.value_type.conforms(default) && enum_members_valid(&self.value_type, default);
            if !fits {
                return Err(DescriptorError::InvalidDefault {
                    name: self.name.clone(),
                    reason: format!("expected {}", self.value_type),
                });
            }
        }

        Ok(())
    }
}

/// Enum values (or enum list elements) are members of the declared constant set
pub(crate) fn enum_members_valid(value_type: &ValueType, value: &Value) -> bool {
    match (value_type, value) {
        (ValueType::Enum(constants), Value::Enum(v)) => constants.contains(v),
        (ValueType::List(element), Value::List(values)) => {
            values.iter().all(|v| enum_members_valid(element, v))
        }
        _ => true,
    }
}

fn default_delimiter() -> String {
    " ".to_string()
}

/// Descriptor JSON form of a parameter, defaults are text parsed with the declared type
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParameter {
    name: String,
    #[serde(rename = "type")]
    value_type: ValueType,
    #[serde(default)]
    direction: Direction,
    #[serde(default)]
    flag: String,
    #[serde(default = "default_delimiter")]
    delimiter: String,
    #[serde(default)]
    order: i32,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    redirect: bool,
    #[serde(default)]
    wrap_in_quotes: bool,
    #[serde(default)]
    persist_output: bool,
    default: Option<String>,
    mime_type: Option<String>,
    description: Option<String>,
}

impl TryFrom<RawParameter> for ParameterDescriptor {
    type Error = DescriptorError;

    fn try_from(raw: RawParameter) -> Result<Self, Self::Error> {
        let default = match &raw.default {
            Some(text) => Some(parse_default(&raw.name, &raw.value_type, text)?),
            None => None,
        };

        Ok(ParameterDescriptor {
            name: raw.name,
            value_type: raw.value_type,
            direction: raw.direction,
            flag: raw.flag,
            delimiter: raw.delimiter,
            order: raw.order,
            required: raw.required,
            redirect: raw.redirect,
            wrap_in_quotes: raw.wrap_in_quotes,
            persist_output: raw.persist_output,
            default,
            mime_type: raw.mime_type,
            description: raw.description,
        })
    }
}

/// List defaults are comma separated
fn parse_default(name: &str, value_type: &ValueType, text: &str) -> Result<Value, DescriptorError> {
    let invalid = |reason: String| DescriptorError::InvalidDefault {
        name: name.to_string(),
        reason,
    };

    match value_type {
        ValueType::List(element) => text
            .split(',')
            .filter(|item| !item.is_empty())
            .map(|item| element.parse(name, item.trim()))
            .collect::<Result<Vec<Value>, _>>()
            .map(Value::List)
            .map_err(|err| invalid(err.to_string())),
        _ => value_type.parse(name, text).map_err(|err| invalid(err.to_string())),
    }
}
