use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::args::deserialize::{is_flag_like, END_OF_OPTIONS};
use crate::command::invocation::{CommandInvocation, OutputSlot};
use crate::command::template::WorkflowContext;
use crate::descriptor::parameter::{enum_members_valid, Direction};
use crate::descriptor::{ModuleDescriptor, ParameterDescriptor, Value, ValueMap, ValueType};
use crate::error::SerializationError;

/// One parameter occurrence, kept both as argv tokens and as shell text
struct Rendered {
    argv: Vec<String>,
    text: String,
}

/// Turn a descriptor and its values into a command invocation
///
/// Values are expected to have passed input validation. Absent parameters are skipped, present
/// ones are emitted in `order` (ties in declaration order). The redirect parameter never appears
/// inline, its value becomes the invocation's redirect target.
pub fn serialize(
    descriptor: &ModuleDescriptor,
    values: &ValueMap,
    context: &WorkflowContext,
) -> Result<CommandInvocation, SerializationError> {
    let prefix = context.resolve(descriptor.executable())?;
    let program: Vec<String> = prefix.split_whitespace().map(str::to_string).collect();

    let mut arguments: Vec<String> = Vec::new();
    let mut pieces: Vec<String> = vec![prefix.trim().to_string()];
    let mut redirect: Option<PathBuf> = None;
    let mut options_ended = false;

    for param in descriptor.ordered() {
        let value = match values.get(param.name()) {
            Some(value) => value,
            None => continue,
        };
        check(param, value)?;

        if param.is_redirect() {
            if let Value::File(path) = value {
                redirect = Some(absolute(param.name(), path)?);
            }
            continue;
        }

        let rendered = render(param, value)?;
        if param.flag().is_empty() {
            // a value that looks like a flag needs the end-of-options marker in front of it
            if !options_ended && rendered.iter().flat_map(|r| r.argv.iter()).any(|t| is_flag_like(t)) {
                arguments.push(END_OF_OPTIONS.to_string());
                pieces.push(END_OF_OPTIONS.to_string());
                options_ended = true;
            }
        } else if options_ended && !rendered.is_empty() {
            return Err(SerializationError::FlagAfterEndOfOptions(param.name().to_string()));
        }

        for rendered in rendered {
            arguments.extend(rendered.argv);
            pieces.push(rendered.text);
        }
    }

    let outputs = descriptor
        .parameters()
        .iter()
        .filter(|p| p.direction() == Direction::Output || p.is_persisted())
        .map(|p| OutputSlot {
            name: p.name().to_string(),
            direction: p.direction(),
            required: p.is_required(),
            persist: p.is_persisted(),
            mime_type: p.mime_type().map(str::to_string),
            value: values.get(p.name()).cloned(),
        })
        .collect();

    let command = pieces.join(" ");
    info!("Serialised {} to: {}", descriptor.name(), command);
    debug!("{} argv tokens: {:?}", descriptor.name(), arguments);

    Ok(CommandInvocation {
        module: descriptor.name().to_string(),
        program,
        arguments,
        command,
        working_dir: context.working_dir.clone(),
        redirect,
        wall_time: descriptor.wall_time(),
        outputs,
    })
}

/// Type and enum membership check, the enum error carries the full valid set
fn check(param: &ParameterDescriptor, value: &Value) -> Result<(), SerializationError> {
    if !param.value_type().conforms(value) {
        return Err(SerializationError::TypeMismatch {
            name: param.name().to_string(),
            expected: param.value_type().to_string(),
        });
    }
    if !value.is_millisecond_precise() {
        return Err(SerializationError::SubMillisecondDate {
            name: param.name().to_string(),
            value: value.to_string(),
        });
    }
    if !enum_members_valid(param.value_type(), value) {
        let constants: &[String] = match param.value_type() {
            ValueType::Enum(constants) => constants,
            ValueType::List(element) => match &**element {
                ValueType::Enum(constants) => constants,
                _ => &[],
            },
            _ => &[],
        };
        let offending = match value {
            Value::Enum(v) => v.clone(),
            Value::List(items) => items
                .iter()
                .find_map(|item| match item {
                    Value::Enum(v) if !constants.contains(v) => Some(v.clone()),
                    _ => None,
                })
                .unwrap_or_default(),
            _ => String::new(),
        };
        return Err(SerializationError::NotInSet {
            name: param.name().to_string(),
            value: offending,
            valid: constants.to_vec(),
        });
    }
    Ok(())
}

/// Format one parameter according to its value type
fn render(param: &ParameterDescriptor, value: &Value) -> Result<Vec<Rendered>, SerializationError> {
    match value {
        // presence-only flag
        Value::Boolean(true) => Ok(vec![Rendered {
            argv: vec![param.flag().to_string()],
            text: param.flag().to_string(),
        }]),
        Value::Boolean(false) => Ok(Vec::new()),
        Value::List(items) => items
            .iter()
            .map(|item| -> Result<Rendered, SerializationError> {
                Ok(pair(param, &scalar_text(param, item)?))
            })
            .collect(),
        scalar => Ok(vec![pair(param, &scalar_text(param, scalar)?)]),
    }
}

/// Flag and value joined by the parameter's delimiter
///
/// A single space delimiter keeps flag and value as separate argv tokens, any other delimiter
/// (including the empty one) produces a single `flag<delimiter>value` token.
fn pair(param: &ParameterDescriptor, value: &str) -> Rendered {
    let quoted = if param.is_quoted() {
        format!("'{}'", value.replace('\'', r"'\''"))
    } else {
        value.to_string()
    };

    if param.flag().is_empty() {
        return Rendered {
            argv: vec![value.to_string()],
            text: quoted,
        };
    }

    if param.delimiter() == " " {
        Rendered {
            argv: vec![param.flag().to_string(), value.to_string()],
            text: format!("{} {}", param.flag(), quoted),
        }
    } else {
        Rendered {
            argv: vec![format!("{}{}{}", param.flag(), param.delimiter(), value)],
            text: format!("{}{}{}", param.flag(), param.delimiter(), quoted),
        }
    }
}

fn scalar_text(param: &ParameterDescriptor, value: &Value) -> Result<String, SerializationError> {
    let text = match value {
        Value::String(s) | Value::Enum(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Date(date) => date.timestamp_millis().to_string(),
        Value::File(path) => absolute(param.name(), path)?.to_string_lossy().into_owned(),
        Value::List(_) => {
            return Err(SerializationError::TypeMismatch {
                name: param.name().to_string(),
                expected: param.value_type().to_string(),
            })
        }
    };
    Ok(text)
}

fn absolute(name: &str, path: &Path) -> Result<PathBuf, SerializationError> {
    std::path::absolute(path).map_err(|err| SerializationError::Path {
        name: name.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;

    fn module(params: Vec<ParameterDescriptor>) -> ModuleDescriptor {
        ModuleDescriptor::new("test", "tool", Duration::from_secs(60), params).unwrap()
    }

    fn context() -> WorkflowContext {
        WorkflowContext::new("test")
    }

    #[test]
    fn booleans_are_presence_only() {
        let m = module(vec![ParameterDescriptor::new("paired", ValueType::Boolean).with_flag("-p")]);

        let on: ValueMap = [("paired", Value::Boolean(true))].into_iter().collect();
        assert_eq!(serialize(&m, &on, &context()).unwrap().tokens(), ["-p"]);

        let off: ValueMap = [("paired", Value::Boolean(false))].into_iter().collect();
        assert!(serialize(&m, &off, &context()).unwrap().tokens().is_empty());
        assert!(serialize(&m, &ValueMap::new(), &context()).unwrap().tokens().is_empty());
    }

    #[test]
    fn delimiters_shape_tokens() {
        let m = module(vec![
            ParameterDescriptor::new("threads", ValueType::Integer).with_flag("-t"),
            ParameterDescriptor::new("memory", ValueType::String).with_flag("-Xmx").with_delimiter(""),
            ParameterDescriptor::new("level", ValueType::Integer).with_flag("--level").with_delimiter("="),
        ]);
        let values: ValueMap = [
            ("threads", Value::Integer(8)),
            ("memory", Value::String("4g".into())),
            ("level", Value::Integer(6)),
        ]
        .into_iter()
        .collect();

        let invocation = serialize(&m, &values, &context()).unwrap();
        assert_eq!(invocation.tokens(), ["-t", "8", "-Xmx4g", "--level=6"]);
        assert_eq!(invocation.command(), "tool -t 8 -Xmx4g --level=6");
    }

    #[test]
    fn lists_repeat_the_flag_in_order() {
        let m = module(vec![ParameterDescriptor::new("include", ValueType::List(Box::new(ValueType::String)))
            .with_flag("-I")
            .with_delimiter("")]);
        let values: ValueMap = [(
            "include",
            Value::List(vec![
                Value::String("a".into()),
                Value::String("b".into()),
                Value::String("c".into()),
            ]),
        )]
        .into_iter()
        .collect();
        assert_eq!(serialize(&m, &values, &context()).unwrap().tokens(), ["-Ia", "-Ib", "-Ic"]);

        let empty: ValueMap = [("include", Value::List(vec![]))].into_iter().collect();
        assert!(serialize(&m, &empty, &context()).unwrap().tokens().is_empty());
    }

    #[test]
    fn quoting_only_touches_the_command_string() {
        let m = module(vec![ParameterDescriptor::new("filter", ValueType::String)
            .with_flag("--filter")
            .wrap_in_quotes()]);
        let values: ValueMap = [("filter", Value::String("QUAL > 30".into()))].into_iter().collect();
        let invocation = serialize(&m, &values, &context()).unwrap();
        assert_eq!(invocation.command(), "tool --filter 'QUAL > 30'");
        assert_eq!(invocation.tokens(), ["--filter", "QUAL > 30"]);
    }

    #[test]
    fn dates_and_files_use_canonical_forms() {
        let m = module(vec![
            ParameterDescriptor::new("since", ValueType::Date).with_flag("--since"),
            ParameterDescriptor::new("bam", ValueType::File).with_flag("-b"),
        ]);
        let date = Utc.timestamp_millis_opt(1_600_000_000_000).unwrap();
        let values: ValueMap = [
            ("since", Value::Date(date)),
            ("bam", Value::File(PathBuf::from("reads.bam"))),
        ]
        .into_iter()
        .collect();

        let invocation = serialize(&m, &values, &context()).unwrap();
        assert_eq!(invocation.tokens()[1], "1600000000000");
        assert!(Path::new(&invocation.tokens()[3]).is_absolute());
        assert!(invocation.tokens()[3].ends_with("reads.bam"));
    }

    #[test]
    fn redirect_becomes_target() {
        let m = module(vec![
            ParameterDescriptor::new("input", ValueType::File).with_order(1),
            ParameterDescriptor::new("out", ValueType::File).redirect().required(),
        ]);
        let values: ValueMap = [
            ("input", Value::File(PathBuf::from("/data/in.vcf"))),
            ("out", Value::File(PathBuf::from("/data/out.vcf"))),
        ]
        .into_iter()
        .collect();

        let invocation = serialize(&m, &values, &context()).unwrap();
        assert_eq!(invocation.tokens(), ["/data/in.vcf"]);
        assert_eq!(invocation.redirect_target(), Some(Path::new("/data/out.vcf")));
        assert_eq!(invocation.to_string(), "tool /data/in.vcf > /data/out.vcf");
    }

    #[test]
    fn enum_outside_set_is_rejected() {
        let m = module(vec![ParameterDescriptor::new(
            "mode",
            ValueType::Enum(vec!["A".into(), "B".into(), "C".into()]),
        )
        .with_flag("--mode")]);
        let values: ValueMap = [("mode", Value::Enum("D".into()))].into_iter().collect();

        let err = serialize(&m, &values, &context()).unwrap_err();
        assert_eq!(
            err,
            SerializationError::NotInSet {
                name: "mode".into(),
                value: "D".into(),
                valid: vec!["A".into(), "B".into(), "C".into()],
            }
        );
        let message = err.to_string();
        assert!(message.contains("\"D\""));
        assert!(message.contains("[A, B, C]"));
    }

    #[test]
    fn serialization_is_repeatable() {
        let m = module(vec![
            ParameterDescriptor::new("b", ValueType::String).with_flag("-b").with_order(1),
            ParameterDescriptor::new("a", ValueType::String).with_flag("-a").with_order(1),
            ParameterDescriptor::new("z", ValueType::String).with_flag("-z").with_order(0),
        ]);
        let values: ValueMap = [
            ("a", Value::String("1".into())),
            ("b", Value::String("2".into())),
            ("z", Value::String("3".into())),
        ]
        .into_iter()
        .collect();

        let first = serialize(&m, &values, &context()).unwrap();
        let second = serialize(&m, &values, &context()).unwrap();
        assert_eq!(first.command(), second.command());
        assert_eq!(first.tokens(), ["-z", "3", "-b", "2", "-a", "1"]);
    }
}
