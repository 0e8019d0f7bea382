//! Places blob bytes can live: a directory, nowhere, (someday) cloud hosts.

use camino::Utf8Path;
use uuid::Uuid;

use crate::error::Result;
use crate::hashing::Address;

pub mod directory;
pub mod manager;
pub mod null;

pub use directory::DirectoryBlobStore;
pub use manager::BlobStoreManager;
pub use null::NullBlobStore;

/// Persists raw bytes keyed by digest.
///
/// Stores don't deduplicate; callers check the blob-info repository before
/// writing. A repeated `create_blob` may overwrite but must leave the
/// content reachable under its address.
pub trait BlobStore: Send + Sync {
    /// A simple string naming this kind of store, e.g. `"directory"`.
    fn type_string(&self) -> &'static str;

    fn id(&self) -> Uuid;

    fn create_blob(&self, address: &Address, content: &[u8]) -> Result<()>;

    /// Fails with [`Error::BlobRead`](crate::error::Error::BlobRead) if the
    /// blob can't be read, e.g. it doesn't exist or permissions say no.
    fn get_blob(&self, address: &Address) -> Result<Vec<u8>>;

    /// Copies a whole file into the store under a literal name
    /// (used for database-copy sidecars).
    fn create_named_blob(&self, name: &str, source_path: &Utf8Path) -> Result<()>;

    /// Serializes this store's configuration for the settings file.
    fn save_settings(&self) -> toml::Table;
}
