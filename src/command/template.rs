use std::collections::BTreeMap;
use std::path::PathBuf;

use log::debug;
use tinytemplate::TinyTemplate;

use crate::error::SerializationError;

/// External context an executable template is resolved against
///
/// Templates reference `{workflow_name}` and any extra variable by name, e.g.
/// `{tool_home}/bin/samtools sort`. A literal brace is written `\{`.
#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    pub workflow_name: String,
    pub vars: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl WorkflowContext {
    pub fn new(workflow_name: impl Into<String>) -> WorkflowContext {
        WorkflowContext {
            workflow_name: workflow_name.into(),
            ..WorkflowContext::default()
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Render an executable template with TinyTemplate
    pub fn resolve(&self, template: &str) -> Result<String, SerializationError> {
        if !template.contains('{') {
            return Ok(template.to_string());
        }

        let failed = |err: tinytemplate::error::Error| SerializationError::Template {
            template: template.to_string(),
            reason: err.to_string(),
        };

        let mut tt = TinyTemplate::new();
        // command lines aren't HTML
        tt.set_default_formatter(&tinytemplate::format_unescaped);
        tt.add_template("executable", template).map_err(failed)?;

        let mut context = self.vars.clone();
        context.insert("workflow_name".to_string(), self.workflow_name.clone());

        let resolved = tt.render("executable", &context).map_err(failed)?;
        debug!("Resolved executable {template:?} to {resolved:?}");
        Ok(resolved)
    }
}
