//! Runtime settings read from the environment
//!
//! An optional `.env` file in the working directory is loaded first, real environment
//! variables win over it.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::command::WorkflowContext;

static WORKFLOW: &str = "MODWRAP_WORKFLOW";
static STATE_DB: &str = "MODWRAP_STATE_DB";
static WORKING_DIR: &str = "MODWRAP_WORKING_DIR";
static VAR_PREFIX: &str = "MODWRAP_VAR_";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub workflow_name: String,
    /// Persisting observer is disabled without a database
    pub state_db: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    /// Executable template variables, names lower-cased
    pub vars: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            workflow_name: "default".to_string(),
            state_db: None,
            working_dir: None,
            vars: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Settings {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded settings from {}", path.display()),
            Err(err) => debug!("No .env file loaded: {}", err),
        }
        Settings::from_vars(utf8_vars(env::vars_os()))
    }

    /// Build settings from `(name, value)` pairs, unrelated names are ignored
    pub fn from_vars<I, K, V>(vars: I) -> Settings
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut settings = Settings::default();

        for (name, value) in vars {
            let name = name.as_ref();
            let value: String = value.into();
            if name == WORKFLOW {
                settings.workflow_name = value;
            } else if name == STATE_DB {
                settings.state_db = Some(PathBuf::from(value));
            } else if name == WORKING_DIR {
                settings.working_dir = Some(PathBuf::from(value));
            } else if let Some(var) = name.strip_prefix(VAR_PREFIX) {
                if !var.is_empty() {
                    settings.vars.insert(var.to_ascii_lowercase(), value);
                }
            }
        }

        settings
    }

    pub fn workflow_context(&self) -> WorkflowContext {
        let mut context = WorkflowContext::new(self.workflow_name.clone());
        context.vars = self.vars.clone();
        context.working_dir = self.working_dir.clone();
        context
    }
}

/// Skip variables that aren't valid UTF-8 instead of failing on them
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (Ok(name), Err(_)) => {
                warn!("Ignoring {name}, its value isn't valid UTF-8");
                None
            }
            (Err(name), _) => {
                debug!("Ignoring variable {}, its name isn't valid UTF-8", name.to_string_lossy());
                None
            }
        })
}
