use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Declared type of a parameter value
///
/// In descriptor JSON scalar types are plain strings (`"integer"`), enums carry their constant
/// set (`{"enum": ["A", "B"]}`) and lists their element type (`{"list": "file"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    File,
    Date,
    Enum(Vec<String>),
    List(Box<ValueType>),
}

/// A concrete parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    File(PathBuf),
    Date(DateTime<Utc>),
    Enum(String),
    List(Vec<Value>),
}

impl ValueType {
    /// Parse one command line token into a value of this type
    ///
    /// List types parse a single element, the caller appends it to the list.
    pub fn parse(&self, name: &str, text: &str) -> Result<Value, ValidationError> {
        let malformed = |reason: String| ValidationError::Malformed {
            name: name.to_string(),
            value: text.to_string(),
            reason,
        };

        match self {
            ValueType::String => Ok(Value::String(text.to_string())),
            ValueType::Integer => text
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|err| malformed(err.to_string())),
            ValueType::Float => text
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|err| malformed(err.to_string())),
            ValueType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(malformed("expected true or false".to_string())),
            },
            ValueType::File => Ok(Value::File(PathBuf::from(text))),
            ValueType::Date => parse_date(text).map(Value::Date).map_err(malformed),
            ValueType::Enum(constants) => {
                if constants.iter().any(|c| c == text) {
                    Ok(Value::Enum(text.to_string()))
                } else {
                    Err(ValidationError::NotInSet {
                        name: name.to_string(),
                        value: text.to_string(),
                        valid: constants.clone(),
                    })
                }
            }
            ValueType::List(element) => element.parse(name, text),
        }
    }

    /// Does the value have this type? Enum membership is checked separately.
    pub fn conforms(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::String, Value::String(_))
            | (ValueType::Integer, Value::Integer(_))
            | (ValueType::Float, Value::Float(_))
            | (ValueType::Boolean, Value::Boolean(_))
            | (ValueType::File, Value::File(_))
            | (ValueType::Date, Value::Date(_))
            | (ValueType::Enum(_), Value::Enum(_)) => true,
            (ValueType::List(element), Value::List(values)) => {
                values.iter().all(|v| element.conforms(v))
            }
            _ => false,
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, ValueType::Boolean)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ValueType::List(_))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Integer => write!(f, "integer"),
            ValueType::Float => write!(f, "float"),
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::File => write!(f, "file"),
            ValueType::Date => write!(f, "date"),
            ValueType::Enum(constants) => write!(f, "{}", constants.join("|")),
            ValueType::List(element) => write!(f, "list of {element}"),
        }
    }
}

impl Value {
    /// Dates travel as epoch milliseconds, finer precision can't survive the command line
    pub fn is_millisecond_precise(&self) -> bool {
        match self {
            Value::Date(date) => date.timestamp_subsec_nanos() % 1_000_000 == 0,
            Value::List(values) => values.iter().all(Value::is_millisecond_precise),
            _ => true,
        }
    }

    /// Truncate dates (and dates in lists) to whole milliseconds
    pub fn truncate_dates(self) -> Value {
        match self {
            Value::Date(date) => Value::Date(date.trunc_subsecs(3)),
            Value::List(values) => Value::List(values.into_iter().map(Value::truncate_dates).collect()),
            other => other,
        }
    }
}

/// Plain text form used in logs and usage text
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(s) | Value::Enum(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::File(path) => write!(f, "{}", path.display()),
            Value::Date(date) => write!(f, "{}", date.to_rfc3339()),
            Value::List(values) => {
                let items: Vec<String> = values.iter().map(Value::to_string).collect();
                write!(f, "{}", items.join(","))
            }
        }
    }
}

/// Dates travel as epoch milliseconds, RFC 3339 text is accepted too
fn parse_date(text: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(millis) = text.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| format!("timestamp {millis} is out of range"));
    }
    DateTime::parse_from_rfc3339(text)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|err| err.to_string())
}

/// Parameter name -> value, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueMap(BTreeMap<String, Value>);

impl ValueMap {
    pub fn new() -> ValueMap {
        ValueMap(BTreeMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.0.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        ValueMap(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl IntoIterator for ValueMap {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
