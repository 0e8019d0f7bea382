//! The filesystem store: one file per digest under a root directory.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::*;
use uuid::Uuid;

use super::BlobStore;
use crate::error::{Error, Result};
use crate::hashing::Address;

pub const TYPE: &str = "directory";

pub struct DirectoryBlobStore {
    id: Uuid,
    root: Utf8PathBuf,
}

impl DirectoryBlobStore {
    pub fn new<P: Into<Utf8PathBuf>>(root: P) -> Self {
        Self::with_id(Uuid::new_v4(), root)
    }

    pub fn with_id<P: Into<Utf8PathBuf>>(id: Uuid, root: P) -> Self {
        Self {
            id,
            root: root.into(),
        }
    }

    pub fn from_settings(settings: &toml::Table) -> Result<Self> {
        let root = settings
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::StoreSettings("directory store needs a path".to_owned()))?;
        let id = match settings.get("id").and_then(|v| v.as_str()) {
            Some(raw) => Uuid::parse_str(raw)
                .map_err(|e| Error::StoreSettings(format!("bad store id {raw}: {e}")))?,
            None => Uuid::new_v4(),
        };
        Ok(Self::with_id(id, root))
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn blob_path(&self, address: &Address) -> Utf8PathBuf {
        self.root.join(address.to_string())
    }
}

impl BlobStore for DirectoryBlobStore {
    fn type_string(&self) -> &'static str {
        TYPE
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn create_blob(&self, address: &Address, content: &[u8]) -> Result<()> {
        let path = self.blob_path(address);
        trace!("Writing blob {address} ({} bytes)", content.len());
        fs::write(path, content)?;
        Ok(())
    }

    fn get_blob(&self, address: &Address) -> Result<Vec<u8>> {
        fs::read(self.blob_path(address)).map_err(|source| Error::BlobRead {
            address: *address,
            source,
        })
    }

    fn create_named_blob(&self, name: &str, source_path: &Utf8Path) -> Result<()> {
        debug!("Copying {source_path} into the store as {name}");
        fs::copy(source_path, self.root.join(name))?;
        Ok(())
    }

    fn save_settings(&self) -> toml::Table {
        let mut settings = toml::Table::new();
        settings.insert("id".to_owned(), toml::Value::String(self.id.to_string()));
        settings.insert("path".to_owned(), toml::Value::String(self.root.to_string()));
        settings
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blob_round_trip() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let store = DirectoryBlobStore::new(root);

        let content = b"some very important bytes";
        let address = Address::from_contents(content);
        store.create_blob(&address, content)?;

        // One file per digest, named by its 40-hex address
        assert!(root.join(address.to_string()).is_file());
        assert_eq!(store.get_blob(&address)?, content);
        Ok(())
    }

    #[test]
    fn missing_blob_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryBlobStore::new(Utf8Path::from_path(dir.path()).unwrap());
        let address = Address::from_contents(b"never stored");
        assert!(matches!(
            store.get_blob(&address),
            Err(Error::BlobRead { .. })
        ));
    }

    #[test]
    fn named_blobs_keep_their_name() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_owned()).unwrap();
        let source = root.join("source.bin");
        fs::write(&source, b"sidecar")?;

        let store = DirectoryBlobStore::new(root.clone());
        store.create_named_blob("copy.bin", &source)?;
        assert_eq!(fs::read(root.join("copy.bin"))?, b"sidecar");
        Ok(())
    }

    #[test]
    fn settings_round_trip() -> Result<()> {
        let store = DirectoryBlobStore::new("/somewhere/blobs");
        let settings = store.save_settings();
        let reloaded = DirectoryBlobStore::from_settings(&settings)?;
        assert_eq!(reloaded.id(), store.id());
        assert_eq!(reloaded.root(), store.root());
        Ok(())
    }
}
