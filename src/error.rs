//! Typed errors so callers (and the CLIs picking exit codes) can tell
//! preconditions from storage faults.

use camino::Utf8PathBuf;

use crate::hashing::Address;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source of a backup doesn't exist.
    #[error("no file or directory at {0}")]
    PathNotFound(Utf8PathBuf),

    /// The source of a backup is something we can't walk (device, socket, ...).
    #[error("{0} isn't a regular file or directory")]
    SourcePathNotSupported(Utf8PathBuf),

    /// The target of a restore isn't an existing directory.
    #[error("restore target {0} isn't a directory")]
    TargetPathNotSupported(Utf8PathBuf),

    #[error("no backup database at {0}")]
    DatabaseNotFound(Utf8PathBuf),

    #[error("a backup database already exists at {0}")]
    DatabaseAlreadyExists(Utf8PathBuf),

    #[error("couldn't create a backup database at {path}: {source}")]
    CreateDatabaseFailed {
        path: Utf8PathBuf,
        source: rusqlite::Error,
    },

    /// Path uniqueness violated; interning the same path twice is a bug.
    #[error("couldn't insert path {path}: {source}")]
    AddFilePathFailed {
        path: String,
        source: rusqlite::Error,
    },

    /// Usually a digest that doesn't reference a known blob.
    #[error("couldn't append file event: {0}")]
    AddFileEventFailed(rusqlite::Error),

    #[error("couldn't append backup run event: {0}")]
    AddRunEventFailed(rusqlite::Error),

    /// The adder checks existence before inserting; seeing this is a bug.
    #[error("blob {0} is already recorded")]
    DuplicateBlob(Address),

    #[error("couldn't read blob {address}: {source}")]
    BlobRead {
        address: Address,
        source: std::io::Error,
    },

    #[error("{0} isn't a valid blob address")]
    InvalidAddress(String),

    #[error("{0} is not a valid blob store type")]
    UnknownStoreType(String),

    #[error("bad blob store settings: {0}")]
    StoreSettings(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
