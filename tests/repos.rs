use std::collections::HashMap;

use anyhow::Result;
use uuid::Uuid;

use backstream::error::Error;
use backstream::event::{FileEvent, FileEventAction, RunEventAction};
use backstream::hashing::Address;
use backstream::pathing::NativePath;
use backstream::repo::blobs::{BlobInfo, BlobInfoRepository};
use backstream::repo::events::FileEventStreamRepository;
use backstream::repo::paths::FilePathRepository;
use backstream::repo::runs::RunEventStreamRepository;

mod common;
use common::*;

#[test]
fn duplicate_blobs_are_refused() -> Result<()> {
    let t = test_backup()?;
    let uow = t.backup.unit_of_work()?;
    let repo = BlobInfoRepository::new(uow.connection());

    let info = BlobInfo {
        address: Address::from_contents(b"once"),
        size_bytes: 4,
    };
    repo.add(&info)?;
    assert!(matches!(repo.add(&info), Err(Error::DuplicateBlob(_))));
    // The original row is intact
    assert_eq!(repo.find(&info.address)?.unwrap().size_bytes, 4);
    Ok(())
}

#[test]
fn events_may_only_reference_known_blobs() -> Result<()> {
    let t = test_backup()?;
    let uow = t.backup.unit_of_work()?;
    let paths = FilePathRepository::new(uow.connection());
    let events = FileEventStreamRepository::new(uow.connection());

    let mut cache = HashMap::new();
    let path = NativePath::new("/tmp/ghost.txt");
    let path_id = paths.add_path_tree(&path, &mut cache)?;

    let event = FileEvent::regular_file(
        Uuid::new_v4(),
        path,
        Some(Address::from_contents(b"never recorded")),
        FileEventAction::ChangedAdded,
    );
    assert!(matches!(
        events.add_event(&event, path_id),
        Err(Error::AddFileEventFailed(_))
    ));
    Ok(())
}

#[test]
fn interning_a_path_twice_is_refused() -> Result<()> {
    let t = test_backup()?;
    let uow = t.backup.unit_of_work()?;
    let repo = FilePathRepository::new(uow.connection());

    let path = NativePath::new("/tmp/once");
    let id = repo.add_path(&path, None)?;
    assert!(matches!(
        repo.add_path(&path, None),
        Err(Error::AddFilePathFailed { .. })
    ));
    assert_eq!(repo.find_path(&path)?, Some(id));
    Ok(())
}

#[test]
fn add_path_tree_is_idempotent_across_cache_reuse() -> Result<()> {
    let t = test_backup()?;
    let uow = t.backup.unit_of_work()?;
    let repo = FilePathRepository::new(uow.connection());

    let mut cache = HashMap::new();
    let first = repo.add_path_tree(&NativePath::new("/a/b/c.txt"), &mut cache)?;
    let second = repo.add_path_tree(&NativePath::new("/a/b/c.txt"), &mut cache)?;
    assert_eq!(first, second);
    // A fresh cache still finds the existing rows instead of duplicating
    let mut fresh = HashMap::new();
    let third = repo.add_path_tree(&NativePath::new("/a/b/c.txt"), &mut fresh)?;
    assert_eq!(first, third);
    assert_eq!(repo.get_all_paths()?.len(), 4); // /, /a/, /a/b/, /a/b/c.txt
    Ok(())
}

#[test]
fn run_events_keep_their_bracketing() -> Result<()> {
    let t = test_backup()?;
    let mut uow = t.backup.unit_of_work()?;
    {
        let mut recorder = uow.run_recorder();
        let run_id = recorder.start()?;
        recorder.stop(run_id)?;
    }
    uow.commit()?;

    let uow = t.backup.unit_of_work()?;
    let events = RunEventStreamRepository::new(uow.connection()).get_all_events()?;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, RunEventAction::Started);
    assert_eq!(events[1].action, RunEventAction::Finished);
    assert_eq!(events[0].run_id, events[1].run_id);
    assert!(events[0].at <= events[1].at);
    Ok(())
}

#[test]
fn rolled_back_units_of_work_leave_nothing() -> Result<()> {
    let t = test_backup()?;
    {
        let uow = t.backup.unit_of_work()?;
        let repo = BlobInfoRepository::new(uow.connection());
        repo.add(&BlobInfo {
            address: Address::from_contents(b"doomed"),
            size_bytes: 6,
        })?;
        // Dropped without commit
    }
    let uow = t.backup.unit_of_work()?;
    let repo = BlobInfoRepository::new(uow.connection());
    assert!(repo.all()?.is_empty());
    Ok(())
}
