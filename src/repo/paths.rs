//! Path interning: every observed path becomes a numeric id, and parent
//! links make the rows a persistent forest.

use std::collections::HashMap;

use rusqlite::Connection;

use crate::error::{Error, Result};
use crate::pathing::NativePath;

/// Id and parent linkage for one interned path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredPath {
    pub path_id: i64,
    pub parent_id: Option<i64>,
}

pub struct FilePathRepository<'c> {
    conn: &'c Connection,
}

impl<'c> FilePathRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Interns a single path. Inserting a path that's already present
    /// violates uniqueness and fails.
    pub fn add_path(&self, path: &NativePath, parent_id: Option<i64>) -> Result<i64> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO FilePath (FullPath, ParentId) VALUES (?1, ?2)")?;
        stmt.execute((path.as_str(), parent_id))
            .map_err(|source| Error::AddFilePathFailed {
                path: path.as_str().to_owned(),
                source,
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_path(&self, path: &NativePath) -> Result<Option<i64>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT Id FROM FilePath WHERE FullPath = ?1")?;
        match stmt.query_row([path.as_str()], |r| r.get(0)) {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Interns the whole ancestor chain: given `/tmp/foo/a.txt`, `/` is added
    /// (if missing), then `/tmp/` with `/` as its parent, and so on down to
    /// the leaf, whose id is returned. `cache` short-circuits repeated lookups
    /// across calls and is updated with every segment seen.
    pub fn add_path_tree(
        &self,
        path: &NativePath,
        cache: &mut HashMap<NativePath, i64>,
    ) -> Result<i64> {
        let mut last_segment_id = None;
        for segment in path.intermediate_paths() {
            let segment_id = match cache.get(&segment) {
                Some(id) => *id,
                None => {
                    let id = match self.find_path(&segment)? {
                        Some(existing) => existing,
                        None => self.add_path(&segment, last_segment_id)?,
                    };
                    cache.insert(segment, id);
                    id
                }
            };
            last_segment_id = Some(segment_id);
        }
        // intermediate_paths() always yields at least the path itself
        Ok(last_segment_id.unwrap())
    }

    pub fn find_path_details(&self, path: &NativePath) -> Result<Option<StoredPath>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT Id, ParentId FROM FilePath WHERE FullPath = ?1")?;
        match stmt.query_row([path.as_str()], |r| {
            Ok(StoredPath {
                path_id: r.get(0)?,
                parent_id: r.get(1)?,
            })
        }) {
            Ok(details) => Ok(Some(details)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_all_paths(&self) -> Result<Vec<(i64, NativePath)>> {
        let mut stmt = self.conn.prepare_cached("SELECT Id, FullPath FROM FilePath")?;
        let rows = stmt.query_map((), |r| {
            let id: i64 = r.get(0)?;
            let path: String = r.get(1)?;
            Ok((id, NativePath::new(path)))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
