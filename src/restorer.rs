//! Materializes recorded events back onto disk under a new root.

use std::fmt;
use std::fs;
use std::sync::Arc;

use camino::Utf8Path;
use tracing::*;

use crate::error::{Error, Result};
use crate::event::{FileEvent, FileEventAction, FileType};
use crate::pathing::NativePath;
use crate::pubsub::EventManager;
use crate::store::BlobStore;

/// What happened to one event during a restore.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RestoreEventAction {
    Restored,
    /// Something already sits at the target path; it wasn't touched.
    Skipped,
    /// The event isn't a restorable add/modify.
    UnsupportedFileEvent,
    FailedToCreateDirectory,
    FailedToWriteFile,
}

impl fmt::Display for RestoreEventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Restored => "restored",
            Self::Skipped => "skipped",
            Self::UnsupportedFileEvent => "unsupported event",
            Self::FailedToCreateDirectory => "failed to create directory",
            Self::FailedToWriteFile => "failed to write file",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct RestoreEvent {
    pub original: FileEvent,
    pub target_path: NativePath,
    pub action: RestoreEventAction,
}

/// Rebuilds files and directories from a set of events into a target
/// directory. Restores are order-independent for the supported actions
/// since parent directories are created on demand.
pub struct FileRestorer {
    store: Arc<dyn BlobStore>,
    event_manager: EventManager<RestoreEvent>,
    emitted: Vec<RestoreEvent>,
}

impl FileRestorer {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            event_manager: EventManager::new(),
            emitted: Vec::new(),
        }
    }

    pub fn event_manager(&mut self) -> &mut EventManager<RestoreEvent> {
        &mut self.event_manager
    }

    pub fn emitted_events(&self) -> &[RestoreEvent] {
        &self.emitted
    }

    /// Restores each event under `target`, which must be an existing
    /// directory. Every event's original path is re-rooted below it.
    pub fn restore<'e>(
        &mut self,
        events: impl IntoIterator<Item = &'e FileEvent>,
        target: &Utf8Path,
    ) -> Result<()> {
        if !target.is_dir() {
            return Err(Error::TargetPathNotSupported(target.to_owned()));
        }
        let target = NativePath::from(target);
        for event in events {
            let event_target = target.append_full(&event.full_path);
            self.restore_event(event, event_target)?;
        }
        Ok(())
    }

    fn restore_event(&mut self, event: &FileEvent, target_path: NativePath) -> Result<()> {
        if !matches!(
            event.action,
            FileEventAction::ChangedAdded | FileEventAction::ChangedModified
        ) {
            return self.emit(event, target_path, RestoreEventAction::UnsupportedFileEvent);
        }

        if fs::symlink_metadata(target_path.as_std_path()).is_ok() {
            return self.emit(event, target_path, RestoreEventAction::Skipped);
        }

        match (event.file_type, event.content_address) {
            (FileType::RegularFile, Some(address)) => {
                if let Some(parent) = target_path.parent() {
                    if let Err(e) = fs::create_dir_all(parent.as_std_path()) {
                        debug!("Couldn't create {parent}: {e}");
                        return self.emit(
                            event,
                            target_path,
                            RestoreEventAction::FailedToCreateDirectory,
                        );
                    }
                }
                let content = self.store.get_blob(&address)?;
                if let Err(e) = fs::write(target_path.as_std_path(), content) {
                    debug!("Couldn't write {target_path}: {e}");
                    return self.emit(event, target_path, RestoreEventAction::FailedToWriteFile);
                }
                self.emit(event, target_path, RestoreEventAction::Restored)
            }
            (FileType::Directory, _) => {
                if let Err(e) = fs::create_dir_all(target_path.as_std_path()) {
                    debug!("Couldn't create {target_path}: {e}");
                    return self.emit(
                        event,
                        target_path,
                        RestoreEventAction::FailedToCreateDirectory,
                    );
                }
                self.emit(event, target_path, RestoreEventAction::Restored)
            }
            _ => self.emit(event, target_path, RestoreEventAction::UnsupportedFileEvent),
        }
    }

    fn emit(
        &mut self,
        original: &FileEvent,
        target_path: NativePath,
        action: RestoreEventAction,
    ) -> Result<()> {
        let event = RestoreEvent {
            original: original.clone(),
            target_path,
            action,
        };
        debug!("{:>14} {}", format!("{}", event.action), event.target_path);
        self.event_manager.publish(&event);
        self.emitted.push(event);
        Ok(())
    }
}
