//! The append-only file event log and its queries.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{
    action_column, address_column, file_type_column, set_literal, uuid_column, uuid_literal,
};
use crate::error::{Error, Result};
use crate::event::{FileEvent, FileEventAction};
use crate::pathing::NativePath;

/// Filters on the event half of a search. Empty `actions` means "any".
#[derive(Debug, Clone, Default)]
pub struct FileEventSearchCriteria {
    pub run_id: Option<Uuid>,
    pub actions: BTreeSet<FileEventAction>,
}

/// Filters on the path half of a search.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilePathSearchCriteria {
    pub parent_path_id: Option<i64>,
}

/// Per-run rollup from [`FileEventStreamRepository::statistics_by_run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub matching_events: u64,
    pub matching_size_bytes: u64,
}

/// One row of a path-first search: the path always, its latest matching
/// event if it has one.
#[derive(Debug, Clone)]
pub struct PathFirstMatch {
    pub path_id: i64,
    pub full_path: NativePath,
    pub latest_event: Option<FileEvent>,
}

const EVENT_COLUMNS: &str = "FileEvent.Id, FilePath.Id, FilePath.FullPath, \
     FileEvent.ContentBlobAddress, FileEvent.Action, FileEvent.FileType, FileEvent.BackupRunId";

fn event_predicate(criteria: &FileEventSearchCriteria) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(run_id) = &criteria.run_id {
        clauses.push(format!("FileEvent.BackupRunId = {}", uuid_literal(run_id)));
    }
    if !criteria.actions.is_empty() {
        clauses.push(format!(
            "FileEvent.Action IN {}",
            set_literal(&criteria.actions, |a| (**a as i64).to_string())
        ));
    }
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}

fn path_predicate(criteria: &FilePathSearchCriteria) -> Option<String> {
    criteria
        .parent_path_id
        .map(|id| format!("FilePath.ParentId = {id}"))
}

fn map_event(row: &Row) -> rusqlite::Result<FileEvent> {
    let full_path: String = row.get(2)?;
    let content_address = match row.get::<_, Option<Vec<u8>>>(3)? {
        Some(bytes) => Some(address_column(3, &bytes)?),
        None => None,
    };
    let action = action_column(4, row.get(4)?)?;
    let file_type = file_type_column(5, row.get(5)?)?;
    let run_id: Vec<u8> = row.get(6)?;
    Ok(FileEvent {
        run_id: uuid_column(6, &run_id)?,
        full_path: NativePath::new(full_path),
        file_type,
        content_address,
        action,
    })
}

pub struct FileEventStreamRepository<'c> {
    conn: &'c Connection,
}

impl<'c> FileEventStreamRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Appends one event against an interned path.
    /// A digest that doesn't reference a recorded blob is refused.
    pub fn add_event(&self, event: &FileEvent, path_id: i64) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO FileEvent (PathId, ContentBlobAddress, Action, FileType, BackupRunId)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute((
            path_id,
            event.content_address.as_ref().map(|a| a.as_bytes()),
            event.action as i64,
            event.file_type as i64,
            event.run_id.as_bytes().as_slice(),
        ))
        .map_err(Error::AddFileEventFailed)?;
        Ok(())
    }

    /// All events, oldest first.
    pub fn get_all_events(&self) -> Result<Vec<FileEvent>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {EVENT_COLUMNS} FROM FileEvent
             JOIN FilePath ON FileEvent.PathId = FilePath.Id
             ORDER BY FileEvent.Id ASC"
        ))?;
        let rows = stmt.query_map((), map_event)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The most recent added/modified/removed event for exactly this path.
    pub fn find_last_changed_event(&self, path: &NativePath) -> Result<Option<FileEvent>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {EVENT_COLUMNS} FROM FileEvent
             JOIN FilePath ON FileEvent.PathId = FilePath.Id
             WHERE FilePath.FullPath = ?1 AND FileEvent.Action IN (0, 1, 2)
             ORDER BY FileEvent.Id DESC LIMIT 1"
        ))?;
        match stmt.query_row([path.as_str()], map_event) {
            Ok(event) => Ok(Some(event)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The most recent change event for the given path and every descendant,
    /// found by walking the path forest down from it.
    pub fn last_changed_events_under(
        &self,
        path: &NativePath,
    ) -> Result<BTreeMap<NativePath, FileEvent>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "WITH RECURSIVE descendant (n) AS (
                 SELECT Id FROM FilePath WHERE FullPath = ?1
                 UNION ALL
                 SELECT FilePath.Id FROM FilePath, descendant WHERE FilePath.ParentId = descendant.n
             )
             SELECT {EVENT_COLUMNS} FROM FileEvent
             JOIN FilePath ON FileEvent.PathId = FilePath.Id
             WHERE FilePath.Id IN descendant AND FileEvent.Action IN (0, 1, 2)
             GROUP BY FileEvent.PathId HAVING FileEvent.Id = MAX(FileEvent.Id)"
        ))?;
        let rows = stmt.query_map([path.as_str()], map_event)?;
        let mut result = BTreeMap::new();
        for row in rows {
            let event = row?;
            result.insert(event.full_path.clone(), event);
        }
        Ok(result)
    }

    /// Event count and total blob bytes per run, restricted to `actions`.
    /// Runs with no matching events come back zeroed.
    pub fn statistics_by_run(
        &self,
        run_ids: &[Uuid],
        actions: &BTreeSet<FileEventAction>,
    ) -> Result<HashMap<Uuid, RunStats>> {
        if run_ids.is_empty() || actions.is_empty() {
            return Ok(run_ids.iter().map(|id| (*id, RunStats::default())).collect());
        }
        let ids_set = set_literal(run_ids, |id| uuid_literal(id));
        let actions_set = set_literal(actions, |a| (**a as i64).to_string());
        let mut stmt = self.conn.prepare(&format!(
            "SELECT FileEvent.BackupRunId, COUNT(FileEvent.Id), SUM(Blob.SizeBytes) FROM FileEvent
             LEFT OUTER JOIN Blob ON FileEvent.ContentBlobAddress = Blob.Address
             WHERE FileEvent.BackupRunId IN {ids_set} AND FileEvent.Action IN {actions_set}
             GROUP BY FileEvent.BackupRunId"
        ))?;
        let rows = stmt.query_map((), |r| {
            let run_id: Vec<u8> = r.get(0)?;
            let count: i64 = r.get(1)?;
            let total: Option<i64> = r.get(2)?;
            Ok((
                uuid_column(0, &run_id)?,
                RunStats {
                    matching_events: count as u64,
                    matching_size_bytes: total.unwrap_or(0) as u64,
                },
            ))
        })?;
        let mut result = rows.collect::<rusqlite::Result<HashMap<_, _>>>()?;
        for run_id in run_ids {
            result.entry(*run_id).or_default();
        }
        Ok(result)
    }

    /// Events matching both criteria, oldest first, `skip`/`limit` paged.
    pub fn search(
        &self,
        path_criteria: &FilePathSearchCriteria,
        event_criteria: &FileEventSearchCriteria,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<FileEvent>> {
        let mut query = format!(
            "SELECT {EVENT_COLUMNS} FROM FileEvent
             JOIN FilePath ON FileEvent.PathId = FilePath.Id"
        );
        let clauses: Vec<String> = [event_predicate(event_criteria), path_predicate(path_criteria)]
            .into_iter()
            .flatten()
            .collect();
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(&format!(" ORDER BY FileEvent.Id ASC LIMIT {skip}, {limit}"));
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map((), map_event)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Pages over paths (newest interned first), attaching each path's latest
    /// event that matches the event criteria, if any.
    pub fn search_path_first(
        &self,
        path_criteria: &FilePathSearchCriteria,
        event_criteria: &FileEventSearchCriteria,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<PathFirstMatch>> {
        let mut subquery = String::from("SELECT MAX(FileEvent.Id) FROM FileEvent");
        if let Some(predicate) = event_predicate(event_criteria) {
            subquery.push_str(" WHERE ");
            subquery.push_str(&predicate);
        }
        subquery.push_str(" GROUP BY FileEvent.PathId");

        let mut query = format!(
            "SELECT FileEvent.Id, FilePath.Id, FilePath.FullPath, FileEvent.ContentBlobAddress,
                    FileEvent.Action, FileEvent.FileType, FileEvent.BackupRunId
             FROM FilePath
             LEFT OUTER JOIN FileEvent
               ON FileEvent.PathId = FilePath.Id AND FileEvent.Id IN ({subquery})"
        );
        if let Some(predicate) = path_predicate(path_criteria) {
            query.push_str(" WHERE ");
            query.push_str(&predicate);
        }
        query.push_str(&format!(" ORDER BY FilePath.Id DESC LIMIT {skip}, {limit}"));

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map((), |row| {
            let latest_event = match row.get::<_, Option<i64>>(0)? {
                Some(_) => Some(map_event(row)?),
                None => None,
            };
            let path_id: i64 = row.get(1)?;
            let full_path: String = row.get(2)?;
            Ok(PathFirstMatch {
                path_id,
                full_path: NativePath::new(full_path),
                latest_event,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_matching(
        &self,
        path_criteria: &FilePathSearchCriteria,
        event_criteria: &FileEventSearchCriteria,
    ) -> Result<u64> {
        let mut query = String::from(
            "SELECT COUNT(*) FROM FileEvent JOIN FilePath ON FileEvent.PathId = FilePath.Id",
        );
        let clauses: Vec<String> = [event_predicate(event_criteria), path_predicate(path_criteria)]
            .into_iter()
            .flatten()
            .collect();
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        let count: i64 = self.conn.prepare(&query)?.query_row((), |r| r.get(0))?;
        Ok(count as u64)
    }

    pub fn count_matching_paths(&self, path_criteria: &FilePathSearchCriteria) -> Result<u64> {
        let mut query = String::from("SELECT COUNT(*) FROM FilePath");
        if let Some(predicate) = path_predicate(path_criteria) {
            query.push_str(" WHERE ");
            query.push_str(&predicate);
        }
        let count: i64 = self.conn.prepare(&query)?.query_row((), |r| r.get(0))?;
        Ok(count as u64)
    }
}
