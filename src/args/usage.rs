use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::descriptor::{Direction, ModuleDescriptor, ParameterDescriptor};

/// Rendering context for usage text
#[derive(Serialize)]
struct UsageContext {
    program: String,
    module: String,
    executable: String,
    params: Vec<ParamContext>,
}

/// Rendering context for one parameter line
#[derive(Serialize)]
struct ParamContext {
    usage: String,
    detail: String,
    required: bool,
}

/// Render usage text for an entry point using TinyTemplate
pub fn render_usage(program: &str, descriptor: &ModuleDescriptor) -> Result<String, tinytemplate::error::Error> {
    /// included usage template
    static USAGE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/usage.txt"));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("usage", USAGE)?;

    let context = UsageContext {
        program: program.to_string(),
        module: descriptor.name().to_string(),
        executable: descriptor.executable().to_string(),
        params: descriptor.ordered().into_iter().map(param_context).collect(),
    };

    tt.render("usage", &context)
}

/// Usage text, or a one-line fallback if the template can't be rendered
pub fn usage(program: &str, descriptor: &ModuleDescriptor) -> String {
    render_usage(program, descriptor)
        .unwrap_or_else(|err| format!("Usage: {program} [options] [parameters] ({err})\n"))
}

fn param_context(param: &ParameterDescriptor) -> ParamContext {
    let placeholder = format!("<{}>", param.value_type());
    let mut usage = if param.value_type().is_boolean() {
        param.long_flag()
    } else {
        format!("{} {}", param.long_flag(), placeholder)
    };

    if param.is_positional() {
        usage.push_str(&format!(", {placeholder}"));
    } else if !param.flag().is_empty() && param.flag() != param.long_flag() {
        if param.value_type().is_boolean() {
            usage.push_str(&format!(", {}", param.flag()));
        } else {
            usage.push_str(&format!(", {}{}{}", param.flag(), param.delimiter(), placeholder));
        }
    }
    if param.value_type().is_list() {
        usage.push_str(" ...");
    }

    let mut detail: Vec<String> = Vec::new();
    if let Some(description) = param.description() {
        detail.push(description.to_string());
    }
    if param.direction() == Direction::Output {
        detail.push("output".to_string());
    }
    if param.is_redirect() {
        detail.push("receives standard output".to_string());
    }
    if let Some(default) = param.default_value() {
        detail.push(format!("default {default}"));
    }

    ParamContext {
        usage,
        detail: detail.join(", "),
        required: param.is_required(),
    }
}
