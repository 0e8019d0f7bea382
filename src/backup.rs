//! The facade owning the database file and the active blob store.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};

use crate::db::Database;
use crate::error::Result;
use crate::store::BlobStore;
use crate::uow::UnitOfWork;

/// Name of the sidecar database copy dropped into blob stores.
pub const DATABASE_SIDECAR_NAME: &str = "backup.fdb.copy";

/// Owns the backup database and exactly one active blob store, and mints
/// units of work against the pair. Concurrent units of work each get their
/// own pooled connection.
pub struct Backup {
    database: Database,
    store: Arc<dyn BlobStore>,
}

impl Backup {
    /// Opens an existing database.
    pub fn open(database_path: &Utf8Path, store: Arc<dyn BlobStore>) -> Result<Self> {
        Ok(Self {
            database: Database::open(database_path)?,
            store,
        })
    }

    /// Creates a fresh database and opens it.
    pub fn create(database_path: &Utf8Path, store: Arc<dyn BlobStore>) -> Result<Self> {
        Ok(Self {
            database: Database::create(database_path)?,
            store,
        })
    }

    pub fn open_or_create(database_path: &Utf8Path, store: Arc<dyn BlobStore>) -> Result<Self> {
        Ok(Self {
            database: Database::open_or_create(database_path)?,
            store,
        })
    }

    /// Begins a transaction on a pooled connection. The backup must outlive
    /// the unit of work.
    pub fn unit_of_work(&self) -> Result<UnitOfWork> {
        UnitOfWork::begin(self.database.acquire()?, self.store.clone())
    }

    /// Swaps the active blob store; takes effect for units of work created
    /// after this call.
    pub fn set_blob_store(&mut self, store: Arc<dyn BlobStore>) {
        self.store = store;
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn database_path(&self) -> &Utf8Path {
        self.database.path()
    }

    /// Drops a copy of the database file into the active store as a named
    /// blob, so the metadata travels with the content.
    pub fn copy_database_to_store(&self) -> Result<()> {
        self.store
            .create_named_blob(DATABASE_SIDECAR_NAME, self.database.path())
    }
}

/// Where the daemon keeps its database when nobody says otherwise.
/// The path's parent may not exist yet.
pub fn default_database_path() -> anyhow::Result<Utf8PathBuf> {
    let mut path: Utf8PathBuf = home::home_dir()
        .ok_or_else(|| anyhow!("Can't find home directory"))?
        .try_into()
        .context("Home directory isn't UTF-8")?;
    path.extend([".backstream", "backup.fdb"]);
    Ok(path)
}
