//! Keeps the list of configured blob stores and persists it as TOML.
//!
//! The settings document has a top-level `stores` table with one
//! array-of-tables child per store type:
//!
//! ```toml
//! [[stores.directory]]
//! id = "..."
//! path = "/mnt/backups/blobs"
//! ```

use std::fs;
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use tracing::*;
use uuid::Uuid;

use super::{BlobStore, DirectoryBlobStore, NullBlobStore, directory, null};
use crate::error::{Error, Result};

pub struct BlobStoreManager {
    settings_path: Utf8PathBuf,
    stores: Mutex<Vec<Arc<dyn BlobStore>>>,
}

impl BlobStoreManager {
    pub fn new<P: Into<Utf8PathBuf>>(settings_path: P) -> Self {
        Self {
            settings_path: settings_path.into(),
            stores: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the managed stores with whatever the settings file holds.
    pub fn load_from_settings_file(&self) -> Result<()> {
        let raw = fs::read_to_string(&self.settings_path)?;
        let doc: toml::Table = raw
            .parse()
            .map_err(|e| Error::StoreSettings(format!("{}: {e}", self.settings_path)))?;

        let mut loaded: Vec<Arc<dyn BlobStore>> = Vec::new();
        if let Some(stores) = doc.get("stores").and_then(|v| v.as_table()) {
            for (type_string, entries) in stores {
                let entries = entries.as_array().ok_or_else(|| {
                    Error::StoreSettings(format!("stores.{type_string} isn't an array of tables"))
                })?;
                for entry in entries {
                    let settings = entry.as_table().ok_or_else(|| {
                        Error::StoreSettings(format!("stores.{type_string} entry isn't a table"))
                    })?;
                    loaded.push(construct(type_string, settings)?);
                }
            }
        }
        debug!("Loaded {} blob store(s) from {}", loaded.len(), self.settings_path);
        *self.stores.lock().unwrap() = loaded;
        Ok(())
    }

    /// Writes all managed stores to the settings file, creating parent
    /// directories as needed.
    pub fn save_to_settings_file(&self) -> Result<()> {
        let stores = self.stores.lock().unwrap();

        let mut by_type = toml::Table::new();
        for store in stores.iter() {
            let list = by_type
                .entry(store.type_string().to_owned())
                .or_insert_with(|| toml::Value::Array(Vec::new()));
            if let toml::Value::Array(list) = list {
                list.push(toml::Value::Table(store.save_settings()));
            }
        }
        let mut doc = toml::Table::new();
        doc.insert("stores".to_owned(), toml::Value::Table(by_type));

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.settings_path, doc.to_string())?;
        Ok(())
    }

    pub fn add_store(&self, store: Arc<dyn BlobStore>) -> Arc<dyn BlobStore> {
        let mut stores = self.stores.lock().unwrap();
        stores.push(store.clone());
        store
    }

    /// Adds a store from its type string and settings chunk.
    pub fn add_store_from(
        &self,
        type_string: &str,
        settings: &toml::Table,
    ) -> Result<Arc<dyn BlobStore>> {
        Ok(self.add_store(construct(type_string, settings)?))
    }

    /// Removes the store with the given id, if it's here.
    pub fn remove_by_id(&self, id: Uuid) {
        self.stores.lock().unwrap().retain(|s| s.id() != id);
    }

    pub fn stores(&self) -> Vec<Arc<dyn BlobStore>> {
        self.stores.lock().unwrap().clone()
    }
}

fn construct(type_string: &str, settings: &toml::Table) -> Result<Arc<dyn BlobStore>> {
    match type_string {
        directory::TYPE => Ok(Arc::new(DirectoryBlobStore::from_settings(settings)?)),
        null::TYPE => Ok(Arc::new(NullBlobStore::from_settings(settings)?)),
        other => Err(Error::UnknownStoreType(other.to_owned())),
    }
}
