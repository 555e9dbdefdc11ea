use std::ops::ControlFlow;
use std::path::PathBuf;

use log::{debug, warn};

use crate::args::options::{parse_validate, EntryFlag, EntryOptions};
use crate::descriptor::{ModuleDescriptor, ParameterDescriptor, Value, ValueMap};
use crate::error::{DeserializationError, Phase, ValidationError};

/// Outcome of walking a token list
#[derive(Debug, PartialEq)]
pub enum Parsed {
    /// `--help` or `-?` was seen, nothing else was parsed
    Help,
    Args(Deserialized),
}

/// Parameter values and entry options recovered from tokens
///
/// `errors` are field-level problems (missing required inputs, malformed values) that reject
/// the whole parse. `warnings` are unrecognised or repeated flags, reported but not fatal.
#[derive(Debug, Default, PartialEq)]
pub struct Deserialized {
    pub values: ValueMap,
    pub options: EntryOptions,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<DeserializationError>,
}

impl Deserialized {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Map command line tokens back onto a descriptor's parameters
///
/// Parameters are matched by their long form `--<name>` (value in the next token) or by their
/// tool flag and delimiter, the form [serialize](crate::command::serialize) emits. Parameters
/// without a flag take the remaining unflagged tokens in order.
pub fn deserialize<S: AsRef<str>>(descriptor: &ModuleDescriptor, tokens: &[S]) -> Parsed {
    let tokens: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
    let mut walker = Walker::new(descriptor, tokens);

    while let Some(token) = walker.next() {
        if walker.step(token).is_break() {
            return Parsed::Help;
        }
    }

    Parsed::Args(walker.finish())
}

struct Walker<'a> {
    descriptor: &'a ModuleDescriptor,
    tokens: Vec<&'a str>,
    pos: usize,
    positional: Vec<&'a ParameterDescriptor>,
    next_positional: usize,
    options_ended: bool,
    parsed: Deserialized,
}

impl<'a> Walker<'a> {
    fn new(descriptor: &'a ModuleDescriptor, tokens: Vec<&'a str>) -> Walker<'a> {
        let positional = descriptor
            .ordered()
            .into_iter()
            .filter(|p| p.is_positional())
            .collect();

        Walker {
            descriptor,
            tokens,
            pos: 0,
            positional,
            next_positional: 0,
            options_ended: false,
            parsed: Deserialized::default(),
        }
    }

    fn next(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    /// Handle one token, breaking out when help is requested
    fn step(&mut self, token: &'a str) -> ControlFlow<()> {
        if self.options_ended {
            self.positional(token);
        } else if token == END_OF_OPTIONS {
            debug!("End of options, remaining tokens are positional");
            self.options_ended = true;
        } else if let Some(flag) = EntryFlag::lookup(token) {
            if flag == EntryFlag::Help {
                return ControlFlow::Break(());
            }
            self.entry(flag, token);
        } else if let Some(param) = self.long_flag(token) {
            self.flagged(param, token, None);
        } else if let Some((param, inline)) = self.tool_flag(token) {
            self.flagged(param, token, inline);
        } else if is_flag_like(token) {
            warn!("Unrecognised flag {token}");
            self.parsed.warnings.push(DeserializationError::UnrecognizedFlag(token.to_string()));
        } else {
            self.positional(token);
        }
        ControlFlow::Continue(())
    }

    fn entry(&mut self, flag: EntryFlag, token: &str) {
        match flag {
            EntryFlag::WorkflowRunAttemptId => {
                self.parsed.options.workflow_run_attempt_id = self.identifier(token, "workflowRunAttemptId");
            }
            EntryFlag::SampleId => {
                self.parsed.options.sample_id = self.identifier(token, "sampleId");
            }
            EntryFlag::DryRun => self.parsed.options.dry_run = true,
            EntryFlag::PersistFileData => self.parsed.options.persist_file_data = true,
            EntryFlag::Validate => {
                // the value is optional, a following flag isn't consumed
                let validate = match self.peek() {
                    Some(next) if !next.starts_with("--") => {
                        self.pos += 1;
                        parse_validate(next)
                    }
                    _ => true,
                };
                self.parsed.options.validate = Some(validate);
            }
            EntryFlag::Serialize => {
                if let Some(path) = self.value_for(token) {
                    self.parsed.options.serialize = Some(PathBuf::from(path));
                }
            }
            EntryFlag::Help => {}
        }
    }

    fn identifier(&mut self, token: &str, name: &str) -> Option<i64> {
        let text = self.value_for(token)?;
        match text.parse::<i64>() {
            Ok(id) => Some(id),
            Err(err) => {
                self.parsed.errors.push(ValidationError::Malformed {
                    name: name.to_string(),
                    value: text.to_string(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    /// Consume the next token as the value of `flag`
    fn value_for(&mut self, flag: &str) -> Option<&'a str> {
        let value = self.next();
        if value.is_none() {
            self.parsed.errors.push(ValidationError::MissingValue { flag: flag.to_string() });
        }
        value
    }

    fn long_flag(&self, token: &str) -> Option<&'a ParameterDescriptor> {
        let name = token.strip_prefix("--")?;
        self.descriptor.parameter(name)
    }

    /// Longest tool flag matching the token, with the inline value for non-space delimiters
    fn tool_flag(&self, token: &'a str) -> Option<(&'a ParameterDescriptor, Option<&'a str>)> {
        let mut best: Option<(&'a ParameterDescriptor, Option<&'a str>, usize)> = None;

        for param in self.descriptor.parameters().iter().filter(|p| !p.flag().is_empty()) {
            let candidate = if param.value_type().is_boolean() || param.delimiter() == " " {
                (token == param.flag()).then_some((None, param.flag().len()))
            } else {
                let prefix = format!("{}{}", param.flag(), param.delimiter());
                token
                    .strip_prefix(prefix.as_str())
                    .map(|rest| (Some(rest), prefix.len()))
            };

            if let Some((inline, len)) = candidate {
                if best.map_or(true, |(_, _, best_len)| len > best_len) {
                    best = Some((param, inline, len));
                }
            }
        }

        best.map(|(param, inline, _)| (param, inline))
    }

    fn flagged(&mut self, param: &'a ParameterDescriptor, token: &str, inline: Option<&'a str>) {
        if param.value_type().is_boolean() {
            self.parsed.values.insert(param.name(), Value::Boolean(true));
            return;
        }

        let text = match inline {
            Some(text) => Some(text),
            None => self.value_for(token),
        };
        if let Some(text) = text {
            self.assign(param, token, text);
        }
    }

    fn positional(&mut self, token: &str) {
        match self.positional.get(self.next_positional).copied() {
            Some(param) => {
                // a positional list takes every remaining positional token
                if !param.value_type().is_list() {
                    self.next_positional += 1;
                }
                self.assign(param, param.name(), token);
            }
            None => {
                warn!("Unexpected token {token}");
                self.parsed.warnings.push(DeserializationError::UnexpectedToken(token.to_string()));
            }
        }
    }

    fn assign(&mut self, param: &ParameterDescriptor, flag: &str, text: &str) {
        let text = if param.is_quoted() { unquote(text) } else { text };
        debug!("{} <- {:?}", param.name(), text);

        let value = match param.value_type().parse(param.name(), text) {
            Ok(value) => value,
            Err(err) => {
                self.parsed.errors.push(err);
                return;
            }
        };

        if param.value_type().is_list() {
            match self.parsed.values.get_mut(param.name()) {
                Some(Value::List(items)) => items.push(value),
                _ => {
                    self.parsed.values.insert(param.name(), Value::List(vec![value]));
                }
            }
        } else if self.parsed.values.insert(param.name(), value).is_some() {
            warn!("{flag} given more than once");
            self.parsed.warnings.push(DeserializationError::Repeated(flag.to_string()));
        }
    }

    fn finish(mut self) -> Deserialized {
        let mut missing: Vec<ValidationError> = self
            .descriptor
            .validate(&self.parsed.values, Phase::Input)
            .into_iter()
            .filter(|err| matches!(err, ValidationError::MissingRequired { .. }))
            .collect();
        self.parsed.errors.append(&mut missing);
        self.parsed
    }
}

/// Strip one surrounding pair of single quotes
fn unquote(text: &str) -> &str {
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Everything after this token is positional
pub(crate) static END_OF_OPTIONS: &str = "--";

/// Negative numbers are values, not flags
pub(crate) fn is_flag_like(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-') && token.parse::<f64>().is_err()
}
