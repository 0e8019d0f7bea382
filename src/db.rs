//! The backup database: one SQLite file holding blob metadata, interned
//! paths, and the two append-only event logs.

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{Connection, OpenFlags};
use tracing::*;

use crate::error::{Error, Result};

pub mod pool;

use pool::{ConnectionPool, PooledConnection};

/// How many connections a database will hand out before `acquire()` blocks.
pub const DEFAULT_POOL_CAPACITY: usize = 4;

const SCHEMA: &str = r#"
CREATE TABLE Blob (
    Address BLOB (20) PRIMARY KEY,
    SizeBytes INTEGER NOT NULL
);
CREATE TABLE FilePath (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    FullPath TEXT UNIQUE NOT NULL COLLATE BINARY,
    ParentId INTEGER REFERENCES FilePath (Id)
);
CREATE TABLE FileEvent (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    PathId INTEGER NOT NULL REFERENCES FilePath (Id),
    ContentBlobAddress BLOB (20) REFERENCES Blob (Address),
    Action INTEGER NOT NULL,
    FileType INTEGER NOT NULL,
    BackupRunId BLOB (16) NOT NULL
);
CREATE TABLE FileBackupRunEvent (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    DateTimeUtc INTEGER NOT NULL,
    BackupRunId BLOB (16) NOT NULL,
    Action INTEGER NOT NULL
);
"#;

/// Owns the database file and a bounded pool of connections to it.
pub struct Database {
    path: Utf8PathBuf,
    pool: ConnectionPool,
}

impl Database {
    /// Creates the database file and schema, then opens it.
    /// Fails if anything already sits at `path`.
    pub fn create(path: &Utf8Path) -> Result<Self> {
        if path.exists() {
            return Err(Error::DatabaseAlreadyExists(path.to_owned()));
        }
        debug!("Creating backup database at {path}");
        let conn = Connection::open(path).map_err(|source| Error::CreateDatabaseFailed {
            path: path.to_owned(),
            source,
        })?;
        conn.execute_batch(SCHEMA)
            .map_err(|source| Error::CreateDatabaseFailed {
                path: path.to_owned(),
                source,
            })?;
        drop(conn);
        Self::open(path)
    }

    /// Opens an existing database. Fails if there isn't one.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::DatabaseNotFound(path.to_owned()));
        }
        debug!("Opening backup database at {path}");
        let connect_to = path.to_owned();
        let pool = ConnectionPool::new(DEFAULT_POOL_CAPACITY, move || {
            open_connection(&connect_to)
        });
        Ok(Self {
            path: path.to_owned(),
            pool,
        })
    }

    pub fn open_or_create(path: &Utf8Path) -> Result<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Borrows a connection from the pool, blocking FIFO if all
    /// [`DEFAULT_POOL_CAPACITY`] of them are out.
    pub fn acquire(&self) -> Result<PooledConnection> {
        self.pool.acquire()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

fn open_connection(path: &Utf8Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    // Uniqueness and LIKE are byte-exact, foreign keys are real,
    // and concurrent units of work queue up instead of erroring out.
    conn.execute_batch(
        "PRAGMA case_sensitive_like = true;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(conn)
}
