use log::{info, warn};

use crate::db::store::{RunIdentifiers, StateStore};
use crate::harness::result::ExecutionResult;

/// Notified once, in registration order, when a run reaches a terminal state
///
/// Observers run on the harness thread. A slow observer delays the harness return but isn't
/// bounded by the wall time budget.
pub trait Observer {
    fn name(&self) -> &str;

    /// Persisting observers are skipped under dry run
    fn persists(&self) -> bool {
        false
    }

    fn notify(&self, result: &ExecutionResult) -> anyhow::Result<()>;
}

/// Records nothing, logs the outcome
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn name(&self) -> &str {
        "logging"
    }

    fn notify(&self, result: &ExecutionResult) -> anyhow::Result<()> {
        info!("{} finished {} with exit code {}", result.module, result.state, result.exit_code);
        info!("Command: {}", result.command);
        if let Some(error) = &result.error {
            warn!("{}: {}", result.module, error);
        }
        Ok(())
    }
}

/// Forwards the outcome to a state store
pub struct PersistingObserver {
    store: Box<dyn StateStore>,
    ids: RunIdentifiers,
    persist_file_data: bool,
}

impl PersistingObserver {
    /// Produced artifacts are only recorded when `persist_file_data` is set
    pub fn new(store: Box<dyn StateStore>, ids: RunIdentifiers, persist_file_data: bool) -> PersistingObserver {
        PersistingObserver {
            store,
            ids,
            persist_file_data,
        }
    }
}

impl Observer for PersistingObserver {
    fn name(&self) -> &str {
        "persisting"
    }

    fn persists(&self) -> bool {
        true
    }

    fn notify(&self, result: &ExecutionResult) -> anyhow::Result<()> {
        let artifacts = if self.persist_file_data {
            result.artifacts.as_slice()
        } else {
            &[]
        };
        let id = self.store.record(&self.ids, result, artifacts)?;
        info!("Recorded {} as job {} ({}, {} artifacts)", result.module, id, result.state, artifacts.len());
        Ok(())
    }
}
