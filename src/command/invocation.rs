use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::descriptor::{Direction, Value};

/// A parameter the harness looks at again once the process has finished
///
/// Output parameters are checked by the output validation phase, persisted parameters become
/// produced artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSlot {
    pub name: String,
    pub direction: Direction,
    pub required: bool,
    pub persist: bool,
    pub mime_type: Option<String>,
    pub value: Option<Value>,
}

/// A serialized command, built once and consumed by one harness run
#[derive(Debug)]
pub struct CommandInvocation {
    pub(crate) module: String,
    pub(crate) program: Vec<String>,
    pub(crate) arguments: Vec<String>,
    pub(crate) command: String,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) redirect: Option<PathBuf>,
    pub(crate) wall_time: Duration,
    pub(crate) outputs: Vec<OutputSlot>,
}

impl CommandInvocation {
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Shell form of the command, without the redirect
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Resolved executable prefix split on whitespace
    pub fn program(&self) -> &[String] {
        &self.program
    }

    /// Parameter tokens only, the input of the argument deserializer
    pub fn tokens(&self) -> &[String] {
        &self.arguments
    }

    /// Program followed by parameter tokens, for backends that don't go through a shell
    pub fn argv(&self) -> Vec<String> {
        self.program.iter().chain(self.arguments.iter()).cloned().collect()
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// File receiving standard output, if a parameter redirects
    pub fn redirect_target(&self) -> Option<&Path> {
        self.redirect.as_deref()
    }

    pub fn wall_time(&self) -> Duration {
        self.wall_time
    }

    pub fn outputs(&self) -> &[OutputSlot] {
        &self.outputs
    }
}

/// The command as a user would type it, redirect included
impl fmt::Display for CommandInvocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(target) = &self.redirect {
            write!(f, " > {}", target.display())?;
        }
        Ok(())
    }
}
