//! Read-only views over the recorded event stream.

use std::collections::BTreeMap;

use rusqlite::Connection;

use crate::error::Result;
use crate::event::{FileEvent, FileType};
use crate::pathing::NativePath;
use crate::repo::events::{
    FileEventSearchCriteria, FileEventStreamRepository, FilePathSearchCriteria,
};

/// One page of a [`FileFinder::search_events`] result.
#[derive(Debug, Default)]
pub struct ResultsPage {
    pub total_events: u64,
    pub next_page_skip: u64,
    pub events: Vec<FileEvent>,
}

/// Finds recorded files and directories in the backup.
pub struct FileFinder<'c> {
    conn: &'c Connection,
}

impl<'c> FileFinder<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find_last_changed_event(&self, path: &NativePath) -> Result<Option<FileEvent>> {
        FileEventStreamRepository::new(self.conn).find_last_changed_event(path)
    }

    pub fn last_changed_events_under(
        &self,
        path: &NativePath,
    ) -> Result<BTreeMap<NativePath, FileEvent>> {
        FileEventStreamRepository::new(self.conn).last_changed_events_under(path)
    }

    pub fn all_events(&self) -> Result<Vec<FileEvent>> {
        FileEventStreamRepository::new(self.conn).get_all_events()
    }

    pub fn search_events(
        &self,
        criteria: &FileEventSearchCriteria,
        skip: u64,
        page_size: u64,
    ) -> Result<ResultsPage> {
        let repo = FileEventStreamRepository::new(self.conn);
        let path_criteria = FilePathSearchCriteria::default();
        let events = repo.search(&path_criteria, criteria, skip, page_size)?;
        Ok(ResultsPage {
            total_events: repo.count_matching(&path_criteria, criteria)?,
            next_page_skip: skip + events.len() as u64,
            events,
        })
    }
}

/// A path as it currently exists in the backup, regardless of what's on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFile {
    pub path: NativePath,
    pub file_type: FileType,
}

/// Lists the paths whose latest recorded event still describes content:
/// added, modified, or unchanged.
pub struct VirtualFileBrowser<'c> {
    conn: &'c Connection,
}

impl<'c> VirtualFileBrowser<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn list(&self, skip: u64, limit: u64) -> Result<Vec<VirtualFile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT FilePath.FullPath, FileEvent.FileType FROM FileEvent
             JOIN FilePath ON FileEvent.PathId = FilePath.Id
             WHERE FileEvent.Id IN (SELECT MAX(Id) FROM FileEvent GROUP BY PathId)
               AND FileEvent.Action IN (0, 1, 5)
             ORDER BY FilePath.Id ASC LIMIT {skip}, {limit}"
        ))?;
        let rows = stmt.query_map((), |r| {
            let path: String = r.get(0)?;
            let file_type = crate::repo::file_type_column(1, r.get(1)?)?;
            Ok(VirtualFile {
                path: NativePath::new(path),
                file_type,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
