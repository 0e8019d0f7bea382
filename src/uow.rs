//! One transactional session against the database and the active blob store.

use std::sync::Arc;

use tracing::*;
use uuid::Uuid;

use crate::adder::FileAdder;
use crate::db::pool::PooledConnection;
use crate::error::Result;
use crate::finder::{FileFinder, VirtualFileBrowser};
use crate::hashing::Address;
use crate::recorder::RunRecorder;
use crate::restorer::FileRestorer;
use crate::runs::RunReader;
use crate::store::BlobStore;

/// Scopes every repository write to one transaction on one pooled
/// connection. [`commit`](Self::commit) makes the work permanent;
/// dropping without committing rolls everything back.
pub struct UnitOfWork {
    conn: PooledConnection,
    store: Arc<dyn BlobStore>,
    committed: bool,
}

impl UnitOfWork {
    pub(crate) fn begin(conn: PooledConnection, store: Arc<dyn BlobStore>) -> Result<Self> {
        conn.execute_batch("BEGIN")?;
        Ok(Self {
            conn,
            store,
            committed: false,
        })
    }

    /// Makes the unit of work's writes permanent. Without this, dropping
    /// rolls them back.
    pub fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.committed = true;
        Ok(())
    }

    /// An adder recording events against the given backup run.
    pub fn file_adder(&self, run_id: Uuid) -> FileAdder<'_> {
        FileAdder::new(&self.conn, self.store.clone(), run_id)
    }

    pub fn file_restorer(&self) -> FileRestorer {
        FileRestorer::new(self.store.clone())
    }

    pub fn file_finder(&self) -> FileFinder<'_> {
        FileFinder::new(&self.conn)
    }

    pub fn virtual_file_browser(&self) -> VirtualFileBrowser<'_> {
        VirtualFileBrowser::new(&self.conn)
    }

    pub fn run_recorder(&self) -> RunRecorder<'_> {
        RunRecorder::new(&self.conn)
    }

    pub fn run_reader(&self) -> RunReader<'_> {
        RunReader::new(&self.conn)
    }

    /// Reads a blob straight from the active store.
    pub fn get_blob(&self, address: &Address) -> Result<Vec<u8>> {
        self.store.get_blob(address)
    }

    /// The transaction's connection. Useful for tests, not intended for
    /// general use.
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.committed {
            trace!("Rolling back uncommitted unit of work");
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("Rollback failed: {e}");
            }
        }
    }
}
