//! A store that stores nothing. Handy for tests and for the daemon's
//! metadata-only mode.

use camino::Utf8Path;
use uuid::Uuid;

use super::BlobStore;
use crate::error::Result;
use crate::hashing::Address;

pub const TYPE: &str = "null";

pub struct NullBlobStore {
    id: Uuid,
}

impl NullBlobStore {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn from_settings(settings: &toml::Table) -> Result<Self> {
        let id = settings
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .unwrap_or_else(Uuid::new_v4);
        Ok(Self { id })
    }
}

impl Default for NullBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for NullBlobStore {
    fn type_string(&self) -> &'static str {
        TYPE
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn create_blob(&self, _address: &Address, _content: &[u8]) -> Result<()> {
        Ok(())
    }

    fn get_blob(&self, _address: &Address) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn create_named_blob(&self, _name: &str, _source_path: &Utf8Path) -> Result<()> {
        Ok(())
    }

    fn save_settings(&self) -> toml::Table {
        let mut settings = toml::Table::new();
        settings.insert("id".to_owned(), toml::Value::String(self.id.to_string()));
        settings
    }
}
