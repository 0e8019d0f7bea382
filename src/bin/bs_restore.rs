//! Restore a recorded path (and everything under it) to a destination
//! directory.

use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;

use backstream::backup::Backup;
use backstream::error::Error;
use backstream::logging;
use backstream::pathing::NativePath;
use backstream::store::DirectoryBlobStore;

/// Restore files and directories from a backup.
#[derive(Debug, Parser)]
#[command(name = "bs_restore")]
struct Args {
    /// Verbosity (-v, -vv, -vvv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to restore
    #[arg(short, long)]
    path: String,

    /// Backup directory to restore from
    #[arg(short, long)]
    source: Utf8PathBuf,

    /// Destination directory to restore to
    #[arg(short, long)]
    destination: Utf8PathBuf,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.use_stderr() {
                eprintln!("{e}");
                return ExitCode::from(1);
            }
            print!("{e}");
            return ExitCode::SUCCESS;
        }
    };
    logging::init(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(match e {
                Error::PathNotFound(_) => 2,
                Error::TargetPathNotSupported(_) => 3,
                Error::CreateDatabaseFailed { .. } | Error::DatabaseAlreadyExists(_) => 4,
                Error::DatabaseNotFound(_) => 5,
                _ => 1,
            })
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let database_path = args.source.join("backup.fdb");
    let store = Arc::new(DirectoryBlobStore::new(args.source.clone()));
    let backup = Backup::open(&database_path, store)?;

    let uow = backup.unit_of_work()?;
    let finder = uow.file_finder();

    let mut query_path = NativePath::new(args.path.clone());
    query_path.make_preferred();
    let mut events = finder.last_changed_events_under(&query_path)?;
    if events.is_empty() {
        // Directories are stored with a trailing separator; be forgiving
        // about which form we were given.
        events = finder.last_changed_events_under(&query_path.with_trailing_separator())?;
    }

    let mut restorer = uow.file_restorer();
    restorer.event_manager().subscribe(|restore| {
        println!(
            "{} {} to {}",
            restore.action, restore.original.full_path, restore.target_path
        )
    });
    restorer.restore(events.values(), &args.destination)?;
    Ok(())
}
