use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::args::{deserialize, usage, EntryOptions, Parsed};
use crate::db::{RunIdentifiers, SqliteStore};
use crate::descriptor::load::DescriptorLoader;
use crate::descriptor::ModuleDescriptor;
use crate::entry::instance::ModuleInstance;
use crate::error::ValidationError;
use crate::harness::result::FAILURE_EXIT_CODE;
use crate::harness::{Harness, LoggingObserver, PersistingObserver, ProcessBackend, RunMode, ShellBackend};
use crate::settings::Settings;

/// Parse `tokens` against a descriptor, run the module and return the process exit code
///
/// Help prints usage and returns 0. Parse and validation failures print the problems and usage
/// to stderr and return -1 without touching the harness. Otherwise the harness result decides:
/// 0 on success, 124 on timeout, the process exit code on failure.
pub fn run<S: AsRef<str>>(
    program: &str,
    descriptor: Arc<ModuleDescriptor>,
    tokens: &[S],
    settings: &Settings,
    backend: Arc<dyn ProcessBackend>,
) -> i32 {
    let parsed = match deserialize(&descriptor, tokens) {
        Parsed::Help => {
            println!("{}", usage(program, &descriptor));
            return 0;
        }
        Parsed::Args(parsed) => parsed,
    };

    for warning in &parsed.warnings {
        warn!("{}: {}", descriptor.name(), warning);
    }
    if !parsed.is_valid() {
        return rejected(program, &descriptor, &parsed.errors);
    }

    let options = parsed.options;
    let mut instance = ModuleInstance::new(Arc::clone(&descriptor));
    let errors = instance.assign_all(parsed.values);
    if !errors.is_empty() {
        return rejected(program, &descriptor, &errors);
    }

    if let Some(path) = &options.serialize {
        if let Err(err) = instance.write_state(&options, path) {
            eprintln!("Can't write state to {}: {:#}", path.display(), err);
            return FAILURE_EXIT_CODE;
        }
    }

    let invocation = match instance.build(&settings.workflow_context()) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{}", usage(program, &descriptor));
            return FAILURE_EXIT_CODE;
        }
    };

    let mode = if options.dry_run { RunMode::DryRun } else { RunMode::Real };
    let mut harness = Harness::new(backend).validate_outputs(options.validate_outputs());
    register_observers(&mut harness, mode, &options, settings);

    match harness.run(invocation, mode) {
        Ok(result) => {
            if mode == RunMode::DryRun {
                println!("{}", result.stdout);
            }
            result.exit_code
        }
        Err(err) => {
            eprintln!("{}: {}", descriptor.name(), err);
            FAILURE_EXIT_CODE
        }
    }
}

/// Load an embedded descriptor and run it with the process environment and a shell backend
///
/// Generated entry points are a thin `main` around this.
pub fn main_from_json(program: &str, descriptor_json: &str, args: &[String]) -> i32 {
    let descriptor = match DescriptorLoader::new().and_then(|loader| loader.read_str(Path::new(program), descriptor_json)) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            eprintln!("{err}");
            return FAILURE_EXIT_CODE;
        }
    };

    let settings = Settings::from_env();
    run(program, Arc::new(descriptor), args, &settings, Arc::new(ShellBackend::default()))
}

fn rejected(program: &str, descriptor: &ModuleDescriptor, errors: &[ValidationError]) -> i32 {
    for err in errors {
        eprintln!("{err}");
    }
    eprintln!("{}", usage(program, descriptor));
    FAILURE_EXIT_CODE
}

fn register_observers(harness: &mut Harness, mode: RunMode, options: &EntryOptions, settings: &Settings) {
    if mode == RunMode::DryRun {
        harness.register(Box::new(LoggingObserver));
        return;
    }

    let path = match &settings.state_db {
        Some(path) => path,
        None => {
            info!("No state database configured, results are only logged");
            harness.register(Box::new(LoggingObserver));
            return;
        }
    };

    match SqliteStore::open(path) {
        Ok(store) => {
            let ids = RunIdentifiers {
                workflow_run_attempt_id: options.workflow_run_attempt_id,
                sample_id: options.sample_id,
            };
            harness.register(Box::new(PersistingObserver::new(
                Box::new(store),
                ids,
                options.persist_file_data,
            )));
        }
        Err(err) => {
            warn!("Can't open state database {}: {}, results are only logged", path.display(), err);
            harness.register(Box::new(LoggingObserver));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::descriptor::{ParameterDescriptor, ValueType};

    fn echo_module() -> Arc<ModuleDescriptor> {
        let parameters = vec![
            ParameterDescriptor::new("message", ValueType::String).required(),
            ParameterDescriptor::new("count", ValueType::Integer).with_flag("-n").with_order(-1),
        ];
        Arc::new(ModuleDescriptor::new("echo", "echo", Duration::from_secs(10), parameters).unwrap())
    }

    #[test]
    fn help_exits_zero() {
        let code = run("echo", echo_module(), &["--help"], &Settings::default(), Arc::new(ShellBackend::default()));
        assert_eq!(code, 0);
    }

    #[test]
    fn missing_required_exits_before_running() {
        let code = run("echo", echo_module(), &["-n", "2"], &Settings::default(), Arc::new(ShellBackend::default()));
        assert_eq!(code, FAILURE_EXIT_CODE);
    }

    #[test]
    fn malformed_value_is_rejected() {
        let code = run(
            "echo",
            echo_module(),
            &["-n", "two", "hello"],
            &Settings::default(),
            Arc::new(ShellBackend::default()),
        );
        assert_eq!(code, FAILURE_EXIT_CODE);
    }

    #[test]
    fn bad_embedded_descriptor_fails() {
        let args: Vec<String> = Vec::new();
        assert_eq!(main_from_json("broken", "{", &args), FAILURE_EXIT_CODE);
    }
}
