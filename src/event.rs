//! The rows of the append-only change log.

use std::fmt;

use jiff::Timestamp;
use uuid::Uuid;

use crate::hashing::Address;
use crate::pathing::NativePath;

/// What kind of thing a path pointed at when we saw it.
///
/// The integer values are the on-disk encoding; don't reorder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i64)]
pub enum FileType {
    RegularFile = 0,
    Directory = 1,
    Unsupported = 2,
}

impl FileType {
    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::RegularFile),
            1 => Some(Self::Directory),
            2 => Some(Self::Unsupported),
            _ => None,
        }
    }
}

/// What happened to a path, or why we couldn't tell.
///
/// The integer values are the on-disk encoding; don't reorder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i64)]
pub enum FileEventAction {
    ChangedAdded = 0,
    ChangedModified = 1,
    ChangedRemoved = 2,
    FailedToRead = 3,
    Unsupported = 4,
    Unchanged = 5,
}

impl FileEventAction {
    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::ChangedAdded),
            1 => Some(Self::ChangedModified),
            2 => Some(Self::ChangedRemoved),
            3 => Some(Self::FailedToRead),
            4 => Some(Self::Unsupported),
            5 => Some(Self::Unchanged),
            _ => None,
        }
    }

    /// Added, modified, and removed events carry state; the rest are status.
    pub fn is_change(self) -> bool {
        matches!(
            self,
            Self::ChangedAdded | Self::ChangedModified | Self::ChangedRemoved
        )
    }

    /// Whether a previous event with this action represents live content
    /// that a disappearance (or type flip) must retract.
    pub fn is_live(self) -> bool {
        matches!(self, Self::ChangedAdded | Self::ChangedModified)
    }
}

impl fmt::Display for FileEventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ChangedAdded => "added",
            Self::ChangedModified => "modified",
            Self::ChangedRemoved => "removed",
            Self::FailedToRead => "failed to read",
            Self::Unsupported => "unsupported",
            Self::Unchanged => "unchanged",
        };
        write!(f, "{s}")
    }
}

/// One observation of one path during one backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub run_id: Uuid,
    pub full_path: NativePath,
    pub file_type: FileType,
    /// Present only for regular-file content events.
    pub content_address: Option<Address>,
    pub action: FileEventAction,
}

impl FileEvent {
    pub fn regular_file(
        run_id: Uuid,
        full_path: NativePath,
        content_address: Option<Address>,
        action: FileEventAction,
    ) -> Self {
        Self {
            run_id,
            full_path,
            file_type: FileType::RegularFile,
            content_address,
            action,
        }
    }

    pub fn directory(run_id: Uuid, full_path: NativePath, action: FileEventAction) -> Self {
        Self {
            run_id,
            full_path,
            file_type: FileType::Directory,
            content_address: None,
            action,
        }
    }

    pub fn unsupported(run_id: Uuid, full_path: NativePath) -> Self {
        Self {
            run_id,
            full_path,
            file_type: FileType::Unsupported,
            content_address: None,
            action: FileEventAction::Unsupported,
        }
    }
}

/// The on-disk encoding; don't reorder.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(i64)]
pub enum RunEventAction {
    Started = 0,
    Finished = 1,
}

impl RunEventAction {
    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Started),
            1 => Some(Self::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for RunEventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Started => "started",
            Self::Finished => "finished",
        };
        write!(f, "{s}")
    }
}

/// Brackets a backup run: exactly one `Started`, at most one `Finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEvent {
    pub run_id: Uuid,
    /// Second precision; sub-second digits are dropped at the store.
    pub at: Timestamp,
    pub action: RunEventAction,
}
