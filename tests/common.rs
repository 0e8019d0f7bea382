#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use backstream::backup::Backup;
use backstream::event::{FileEvent, FileEventAction, FileType};
use backstream::pathing::NativePath;
use backstream::store::DirectoryBlobStore;

/// A backup with its store in one temp directory and a scratch source tree
/// in another. The database sits next to the blobs, CLI-style.
pub struct TestBackup {
    pub store_dir: TempDir,
    pub source_dir: TempDir,
    pub backup: Backup,
}

pub fn test_backup() -> Result<TestBackup> {
    let store_dir = tempfile::tempdir()?;
    let source_dir = tempfile::tempdir()?;
    let store_path = Utf8PathBuf::try_from(store_dir.path().to_owned()).unwrap();
    let backup = Backup::create(
        &store_path.join("backup.fdb"),
        Arc::new(DirectoryBlobStore::new(store_path.clone())),
    )?;
    Ok(TestBackup {
        store_dir,
        source_dir,
        backup,
    })
}

impl TestBackup {
    /// The canonicalized source scratch directory.
    pub fn source_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::try_from(self.source_dir.path().canonicalize().unwrap()).unwrap()
    }

    /// Runs one whole backup run (recorder bracket included) over `source`
    /// and returns the emitted events, committed.
    pub fn add(&self, source: &Utf8Path) -> Result<Vec<FileEvent>> {
        let mut uow = self.backup.unit_of_work()?;
        let emitted = {
            let mut recorder = uow.run_recorder();
            let run_id = recorder.start()?;
            let mut adder = uow.file_adder(run_id);
            adder.add(source)?;
            recorder.stop(run_id)?;
            adder.emitted_events().to_vec()
        };
        uow.commit()?;
        Ok(emitted)
    }

    /// Like [`add`](Self::add), but expects the add itself to fail and
    /// returns that error.
    pub fn add_expecting_error(&self, source: &Utf8Path) -> backstream::error::Error {
        let uow = self.backup.unit_of_work().unwrap();
        let mut adder = uow.file_adder(uuid::Uuid::new_v4());
        adder
            .add(source)
            .expect_err("add should have failed")
    }
}

/// Squashes events down to (action, type, stored path) for easy comparison.
pub fn shapes(events: &[FileEvent]) -> Vec<(FileEventAction, FileType, String)> {
    events
        .iter()
        .map(|e| (e.action, e.file_type, e.full_path.as_str().to_owned()))
        .collect()
}

pub fn native(path: &Utf8Path) -> NativePath {
    NativePath::from(path)
}

pub fn native_dir(path: &Utf8Path) -> NativePath {
    NativePath::from(path).with_trailing_separator()
}
