use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::info;
use serde::Serialize;

use crate::args::EntryOptions;
use crate::command::{serialize, CommandInvocation, WorkflowContext};
use crate::descriptor::module::check_value;
use crate::descriptor::{ModuleDescriptor, Value, ValueMap};
use crate::error::{BuildError, Phase, ValidationError};

/// A descriptor plus the values assigned to it so far, seeded with defaults
#[derive(Debug, Clone)]
pub struct ModuleInstance {
    descriptor: Arc<ModuleDescriptor>,
    values: ValueMap,
}

/// What `--serialize` writes
#[derive(Debug, Serialize)]
pub struct ModuleState<'a> {
    pub module: &'a str,
    pub values: &'a ValueMap,
    pub options: &'a EntryOptions,
}

impl ModuleInstance {
    pub fn new(descriptor: Arc<ModuleDescriptor>) -> ModuleInstance {
        let values = descriptor.defaults();
        ModuleInstance { descriptor, values }
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    /// Assign one value, replacing a default or earlier assignment
    ///
    /// Dates are truncated to the millisecond precision the command line carries.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), ValidationError> {
        let value = value.truncate_dates();
        let param = self
            .descriptor
            .parameter(name)
            .ok_or_else(|| ValidationError::UnknownParameter(name.to_string()))?;
        if let Some(err) = check_value(param, &value) {
            return Err(err);
        }
        self.values.insert(name, value);
        Ok(())
    }

    /// Assign every value, collecting the ones that were rejected
    pub fn assign_all(&mut self, values: ValueMap) -> Vec<ValidationError> {
        values
            .into_iter()
            .filter_map(|(name, value)| self.assign(&name, value).err())
            .collect()
    }

    pub fn state<'a>(&'a self, options: &'a EntryOptions) -> ModuleState<'a> {
        ModuleState {
            module: self.descriptor.name(),
            values: &self.values,
            options,
        }
    }

    /// Write the instance state as pretty JSON
    pub fn write_state(&self, options: &EntryOptions, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.state(options))?;
        fs::write(path, json)?;
        info!("Wrote {} state to {}", self.descriptor.name(), path.display());
        Ok(())
    }

    /// Input validation, then serialization
    pub fn build(&self, context: &WorkflowContext) -> Result<CommandInvocation, BuildError> {
        let errors = self.descriptor.validate(&self.values, Phase::Input);
        if !errors.is_empty() {
            return Err(BuildError::Invalid(errors));
        }
        Ok(serialize(&self.descriptor, &self.values, context)?)
    }
}
