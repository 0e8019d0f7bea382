//! The append-only backup run event log.

use jiff::Timestamp;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{run_action_column, uuid_column, uuid_literal};
use crate::error::{Error, Result};
use crate::event::{RunEvent, RunEventAction};

/// Filters for paging through runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSearchCriteria {
    pub run_id: Option<Uuid>,
}

fn map_event(row: &Row) -> rusqlite::Result<RunEvent> {
    let seconds: i64 = row.get(1)?;
    let at = Timestamp::from_second(seconds).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Integer, Box::new(e))
    })?;
    let run_id: Vec<u8> = row.get(2)?;
    Ok(RunEvent {
        run_id: uuid_column(2, &run_id)?,
        at,
        action: run_action_column(3, row.get(3)?)?,
    })
}

pub struct RunEventStreamRepository<'c> {
    conn: &'c Connection,
}

impl<'c> RunEventStreamRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Appends one run event, truncating the timestamp to whole seconds.
    pub fn add_event(&self, event: &RunEvent) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO FileBackupRunEvent (DateTimeUtc, BackupRunId, Action)
             VALUES (?1, ?2, ?3)",
        )?;
        stmt.execute((
            event.at.as_second(),
            event.run_id.as_bytes().as_slice(),
            event.action as i64,
        ))
        .map_err(Error::AddRunEventFailed)?;
        Ok(())
    }

    pub fn get_all_events(&self) -> Result<Vec<RunEvent>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT Id, DateTimeUtc, BackupRunId, Action FROM FileBackupRunEvent
             ORDER BY Id ASC",
        )?;
        let rows = stmt.query_map((), map_event)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every event belonging to a page of runs, newest runs first.
    /// Runs are selected by their `Started` events; `skip` and `run_limit`
    /// count runs, not events.
    pub fn search_by_run(
        &self,
        criteria: &RunSearchCriteria,
        skip: u64,
        run_limit: u64,
    ) -> Result<Vec<RunEvent>> {
        let mut run_filter = String::new();
        if let Some(run_id) = &criteria.run_id {
            run_filter = format!(" AND BackupRunId = {}", uuid_literal(run_id));
        }
        let query = format!(
            "SELECT Id, DateTimeUtc, BackupRunId, Action
             FROM FileBackupRunEvent
             WHERE BackupRunId IN (
                 SELECT BackupRunId FROM FileBackupRunEvent
                 WHERE Action = ?1{run_filter}
                 ORDER BY Id DESC
                 LIMIT {skip}, {run_limit}
             )
             ORDER BY Id DESC"
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map([RunEventAction::Started as i64], map_event)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// How many distinct runs have recorded any event.
    pub fn backup_count(&self) -> Result<u64> {
        let count: i64 = self.conn.prepare_cached(
            "SELECT COUNT(DISTINCT BackupRunId) FROM FileBackupRunEvent",
        )?.query_row((), |r| r.get(0))?;
        Ok(count as u64)
    }
}
