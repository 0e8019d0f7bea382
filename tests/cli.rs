use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn bs_backup() -> Command {
    Command::cargo_bin("bs_backup").expect("binary missing")
}

fn bs_restore() -> Command {
    Command::cargo_bin("bs_restore").expect("binary missing")
}

fn canonical(p: &Path) -> PathBuf {
    p.canonicalize().expect("couldn't canonicalize")
}

#[test]
fn backup_then_restore_round_trip() -> Result<()> {
    let source_dir = tempdir()?;
    let target_dir = tempdir()?;
    let out_dir = tempdir()?;

    fs::create_dir(source_dir.path().join("sub"))?;
    fs::write(source_dir.path().join("a.txt"), "hello")?;
    fs::write(source_dir.path().join("sub/b.txt"), "nested")?;

    bs_backup()
        .arg("--source")
        .arg(source_dir.path())
        .arg("--target")
        .arg(target_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("added"));

    // The store now holds the database, its sidecar copy, and blobs
    assert!(target_dir.path().join("backup.fdb").is_file());
    assert!(target_dir.path().join("backup.fdb.copy").is_file());

    bs_restore()
        .arg("--path")
        .arg(canonical(source_dir.path()))
        .arg("--source")
        .arg(target_dir.path())
        .arg("--destination")
        .arg(out_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("restored"));

    // Original paths are re-rooted below the destination
    let mut restored_root = out_dir.path().to_owned();
    for component in canonical(source_dir.path())
        .to_str()
        .unwrap()
        .split('/')
        .filter(|c| !c.is_empty())
    {
        restored_root = restored_root.join(component.replace(':', ""));
    }
    assert_eq!(fs::read(restored_root.join("a.txt"))?, b"hello");
    assert_eq!(fs::read(restored_root.join("sub/b.txt"))?, b"nested");
    Ok(())
}

#[test]
fn second_backup_is_incremental() -> Result<()> {
    let source_dir = tempdir()?;
    let target_dir = tempdir()?;
    fs::write(source_dir.path().join("a.txt"), "hello")?;

    let run = || {
        bs_backup()
            .arg("--source")
            .arg(source_dir.path())
            .arg("--target")
            .arg(target_dir.path())
            .assert()
            .success()
    };
    run();
    run().stdout(predicate::str::contains("unchanged"));
    Ok(())
}

#[test]
fn daemon_help_smoke() {
    Command::cargo_bin("bs_daemon")
        .expect("binary missing")
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn missing_arguments_exit_1() {
    bs_backup().arg("--source").arg("/tmp").assert().code(1);
    bs_restore().assert().code(1);
}

#[test]
fn missing_source_exits_2() -> Result<()> {
    let target_dir = tempdir()?;
    bs_backup()
        .arg("--source")
        .arg("/definitely/not/here")
        .arg("--target")
        .arg(target_dir.path())
        .assert()
        .code(2);
    Ok(())
}

#[test]
fn restore_to_non_directory_exits_3() -> Result<()> {
    let source_dir = tempdir()?;
    let target_dir = tempdir()?;
    fs::write(source_dir.path().join("a.txt"), "hello")?;
    bs_backup()
        .arg("--source")
        .arg(source_dir.path())
        .arg("--target")
        .arg(target_dir.path())
        .assert()
        .success();

    bs_restore()
        .arg("--path")
        .arg(canonical(source_dir.path()))
        .arg("--source")
        .arg(target_dir.path())
        .arg("--destination")
        .arg(source_dir.path().join("a.txt"))
        .assert()
        .code(3);
    Ok(())
}

#[test]
fn restore_without_a_database_exits_5() -> Result<()> {
    let empty = tempdir()?;
    let out = tempdir()?;
    bs_restore()
        .arg("--path")
        .arg("/whatever")
        .arg("--source")
        .arg(empty.path())
        .arg("--destination")
        .arg(out.path())
        .assert()
        .code(5);
    Ok(())
}
