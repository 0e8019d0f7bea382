//! The change-detection adder: walk a source tree, dedup contents against
//! known blobs, and append only the events that differ from recorded history.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::sync::Arc;

use camino::Utf8Path;
use rusqlite::Connection;
use tracing::*;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::event::{FileEvent, FileEventAction, FileType};
use crate::hashing::Address;
use crate::pathing::NativePath;
use crate::pubsub::EventManager;
use crate::repo::blobs::{BlobInfo, BlobInfoRepository};
use crate::repo::events::FileEventStreamRepository;
use crate::repo::paths::FilePathRepository;
use crate::store::BlobStore;

/// Adds files and directories to the backup, one `add()` per source path.
///
/// Every emitted event is appended to the event stream, published to
/// subscribers, and kept for inspection via [`emitted_events`](Self::emitted_events).
pub struct FileAdder<'u> {
    conn: &'u Connection,
    store: Arc<dyn BlobStore>,
    run_id: Uuid,
    event_manager: EventManager<FileEvent>,
    emitted: Vec<FileEvent>,
    /// Path-intern cache; survives across one whole `add()` walk.
    path_ids: HashMap<NativePath, i64>,
}

impl<'u> FileAdder<'u> {
    pub fn new(conn: &'u Connection, store: Arc<dyn BlobStore>, run_id: Uuid) -> Self {
        Self {
            conn,
            store,
            run_id,
            event_manager: EventManager::new(),
            emitted: Vec::new(),
            path_ids: HashMap::new(),
        }
    }

    pub fn event_manager(&mut self) -> &mut EventManager<FileEvent> {
        &mut self.event_manager
    }

    /// Everything emitted so far, in emission order.
    pub fn emitted_events(&self) -> &[FileEvent] {
        &self.emitted
    }

    /// Records the current state of the file or directory at `source_path`
    /// as a delta against the last recorded state.
    pub fn add(&mut self, source_path: &Utf8Path) -> Result<()> {
        // Resolves symlinks and . / .. references, and checks existence.
        let canonical = source_path
            .canonicalize_utf8()
            .map_err(|_| Error::PathNotFound(source_path.to_owned()))?;
        let metadata = fs::metadata(&canonical)?;

        if metadata.is_file() {
            let path = NativePath::from(canonical.as_path());
            let previous = self.find_previous_for(&path)?;
            self.visit_path(path, previous)
        } else if metadata.is_dir() {
            let mut path = NativePath::from(canonical.as_path());
            path.ensure_trailing_separator();
            self.scan_directory(&path)
        } else {
            Err(Error::SourcePathNotSupported(canonical))
        }
    }

    fn scan_directory(&mut self, source_path: &NativePath) -> Result<()> {
        let mut last_events = FileEventStreamRepository::new(self.conn)
            .last_changed_events_under(source_path)?;
        info!(
            "Scanning {source_path} ({} previously tracked path(s))",
            last_events.len()
        );

        // The directory itself, before any of its children
        let previous = take_previous(&mut last_events, source_path);
        self.visit_path(source_path.clone(), previous)?;

        for entry in WalkDir::new(source_path.as_std_path())
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Couldn't walk into {source_path}: {e}");
                    continue;
                }
            };
            let Some(utf8) = Utf8Path::from_path(entry.path()) else {
                warn!("Skipping non-UTF-8 path {}", entry.path().display());
                continue;
            };
            let mut path = NativePath::from(utf8);
            if entry.file_type().is_dir() {
                path.ensure_trailing_separator();
            }
            let previous = take_previous(&mut last_events, &path);
            self.visit_path(path, previous)?;
        }

        // Anything left was tracked once but wasn't seen on disk this time.
        for (path, previous) in std::mem::take(&mut last_events) {
            self.visit_path(path, Some(previous))?;
        }
        Ok(())
    }

    fn visit_path(&mut self, path: NativePath, previous: Option<FileEvent>) -> Result<()> {
        // A stale directory-form path (`.../foo/`) over what's now a file
        // reports NotADirectory rather than NotFound; both mean "gone".
        let metadata = match fs::symlink_metadata(path.as_std_path()) {
            Ok(metadata) => metadata,
            Err(e)
                if e.kind() == io::ErrorKind::NotFound
                    || e.kind() == io::ErrorKind::NotADirectory =>
            {
                if let Some(previous) = previous {
                    if previous.action != FileEventAction::ChangedRemoved {
                        self.emit(FileEvent {
                            run_id: self.run_id,
                            full_path: previous.full_path.clone(),
                            file_type: previous.file_type,
                            content_address: previous.content_address,
                            action: FileEventAction::ChangedRemoved,
                        })?;
                    }
                }
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_file() {
            self.visit_file(path, previous)
        } else if metadata.is_dir() {
            self.visit_directory(path, previous)
        } else {
            self.emit(FileEvent::unsupported(self.run_id, path))
        }
    }

    fn visit_file(&mut self, path: NativePath, previous: Option<FileEvent>) -> Result<()> {
        // A path that used to be a directory is a removal plus an add,
        // not a modification.
        let previous = match previous {
            Some(p) if p.file_type != FileType::RegularFile && p.action.is_live() => {
                self.emit_removed(&p)?;
                None
            }
            other => other,
        };

        let Some(address) = self.save_file_contents(&path)? else {
            return Ok(());
        };

        let mut action = FileEventAction::ChangedAdded;
        if let Some(previous) = previous {
            match previous.action {
                FileEventAction::ChangedAdded | FileEventAction::ChangedModified => {
                    if previous.content_address == Some(address) {
                        return self.emit(FileEvent::regular_file(
                            self.run_id,
                            path,
                            Some(address),
                            FileEventAction::Unchanged,
                        ));
                    }
                    action = FileEventAction::ChangedModified;
                }
                FileEventAction::ChangedRemoved => (),
                _ => (),
            }
        }

        self.emit(FileEvent::regular_file(
            self.run_id,
            path,
            Some(address),
            action,
        ))
    }

    fn visit_directory(&mut self, path: NativePath, previous: Option<FileEvent>) -> Result<()> {
        let path = path.with_trailing_separator();
        match previous {
            None => self.emit(FileEvent::directory(
                self.run_id,
                path,
                FileEventAction::ChangedAdded,
            )),
            Some(p) if p.action == FileEventAction::ChangedRemoved => self.emit(
                FileEvent::directory(self.run_id, path, FileEventAction::ChangedAdded),
            ),
            Some(p) if p.file_type != FileType::Directory => {
                // Used to be a file, is a directory now
                self.emit_removed(&p)?;
                self.emit(FileEvent::directory(
                    self.run_id,
                    path,
                    FileEventAction::ChangedAdded,
                ))
            }
            // Known directories aren't re-announced
            Some(_) => Ok(()),
        }
    }

    /// Reads the file, writes its blob if the digest is new, and returns the
    /// address. An unreadable file emits `FailedToRead` and returns `None`.
    fn save_file_contents(&mut self, path: &NativePath) -> Result<Option<Address>> {
        let content = match fs::read(path.as_std_path()) {
            Ok(content) => content,
            Err(e) => {
                debug!("Couldn't read {path}: {e}");
                self.emit(FileEvent::regular_file(
                    self.run_id,
                    path.clone(),
                    None,
                    FileEventAction::FailedToRead,
                ))?;
                return Ok(None);
            }
        };

        let address = Address::from_contents(&content);
        let blobs = BlobInfoRepository::new(self.conn);
        if blobs.find(&address)?.is_none() {
            self.store.create_blob(&address, &content)?;
            blobs.add(&BlobInfo {
                address,
                size_bytes: content.len() as u64,
            })?;
        } else {
            trace!("Blob {address} already stored");
        }
        Ok(Some(address))
    }

    /// Looks up the previous change event for a single path, under either of
    /// its forms so type flips are seen.
    fn find_previous_for(&self, path: &NativePath) -> Result<Option<FileEvent>> {
        let events = FileEventStreamRepository::new(self.conn);
        if let Some(found) = events.find_last_changed_event(path)? {
            return Ok(Some(found));
        }
        events.find_last_changed_event(&other_form(path))
    }

    fn emit_removed(&mut self, previous: &FileEvent) -> Result<()> {
        self.emit(FileEvent {
            run_id: self.run_id,
            full_path: previous.full_path.clone(),
            file_type: previous.file_type,
            content_address: previous.content_address,
            action: FileEventAction::ChangedRemoved,
        })
    }

    fn emit(&mut self, event: FileEvent) -> Result<()> {
        let path_id = FilePathRepository::new(self.conn)
            .add_path_tree(&event.full_path, &mut self.path_ids)?;
        FileEventStreamRepository::new(self.conn).add_event(&event, path_id)?;
        debug!("{:>14} {}", format!("{}", event.action), event.full_path);
        self.event_manager.publish(&event);
        self.emitted.push(event);
        Ok(())
    }
}

/// Pulls the previous event for `path` out of the preloaded map, checking the
/// other directory/file form too: a type flip records the old event under the
/// form the path no longer has.
fn take_previous(
    last_events: &mut BTreeMap<NativePath, FileEvent>,
    path: &NativePath,
) -> Option<FileEvent> {
    last_events
        .remove(path)
        .or_else(|| last_events.remove(&other_form(path)))
}

fn other_form(path: &NativePath) -> NativePath {
    if path.ends_with_separator() {
        path.without_trailing_separator()
    } else {
        path.with_trailing_separator()
    }
}
