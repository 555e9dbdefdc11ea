use std::path::Path;

use log::info;
use rusqlite::{params, Connection};

use crate::db::open::{open_db, open_memory_db};
use crate::harness::result::{Artifact, ExecutionResult};

/// Identifiers the persisting observer records a result under
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunIdentifiers {
    pub workflow_run_attempt_id: Option<i64>,
    pub sample_id: Option<i64>,
}

/// The persistence collaborator: records job status and produced artifacts
pub trait StateStore {
    /// Record one finished run, returning the job id
    fn record(&self, ids: &RunIdentifiers, result: &ExecutionResult, artifacts: &[Artifact]) -> anyhow::Result<i64>;
}

/// A recorded job, as loaded back from the database
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: i64,
    pub module: String,
    pub workflow_run_attempt_id: Option<i64>,
    pub sample_id: Option<i64>,
    pub command: String,
    pub state: String,
    pub exit_code: i32,
    pub error: Option<String>,
}

/// SQLite backed state store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> rusqlite::Result<SqliteStore> {
        Ok(SqliteStore { conn: open_db(path)? })
    }

    pub fn in_memory() -> rusqlite::Result<SqliteStore> {
        Ok(SqliteStore { conn: open_memory_db()? })
    }

    pub fn load_jobs(&self) -> rusqlite::Result<Vec<JobRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, module, workflow_run_attempt_id, sample_id, command, state, exit_code, error
             FROM job ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(JobRow {
                id: row.get(0)?,
                module: row.get(1)?,
                workflow_run_attempt_id: row.get(2)?,
                sample_id: row.get(3)?,
                command: row.get(4)?,
                state: row.get(5)?,
                exit_code: row.get(6)?,
                error: row.get(7)?,
            })
        })?;
        rows.collect()
    }

    pub fn load_artifacts(&self, job_id: i64) -> rusqlite::Result<Vec<Artifact>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, path, mime_type FROM artifact WHERE job_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map([job_id], |row| {
            Ok(Artifact {
                name: row.get(0)?,
                path: row.get(1)?,
                mime_type: row.get(2)?,
            })
        })?;
        rows.collect()
    }
}

impl StateStore for SqliteStore {
    fn record(&self, ids: &RunIdentifiers, result: &ExecutionResult, artifacts: &[Artifact]) -> anyhow::Result<i64> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO job (module, workflow_run_attempt_id, sample_id, command, state, exit_code,
                              stdout, stderr, error, started, finished)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                result.module,
                ids.workflow_run_attempt_id,
                ids.sample_id,
                result.command,
                result.state.as_str(),
                result.exit_code,
                result.stdout,
                result.stderr,
                result.error,
                result.started.to_rfc3339(),
                result.finished.to_rfc3339(),
            ],
        )?;
        let job_id = tx.last_insert_rowid();

        for artifact in artifacts {
            info!("Recording artifact {} ({})", artifact.path, artifact.mime_type);
            tx.execute(
                "INSERT INTO artifact (job_id, name, path, mime_type) VALUES (?1, ?2, ?3, ?4)",
                params![job_id, artifact.name, artifact.path, artifact.mime_type],
            )?;
        }

        tx.commit()?;
        Ok(job_id)
    }
}
