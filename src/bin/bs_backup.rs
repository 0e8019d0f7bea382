//! Back up a file or directory into a target store directory.

use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;

use backstream::backup::Backup;
use backstream::error::Error;
use backstream::logging;
use backstream::store::DirectoryBlobStore;

/// Back up a file or directory.
#[derive(Debug, Parser)]
#[command(name = "bs_backup")]
struct Args {
    /// Verbosity (-v, -vv, -vvv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Source path to back up (file or directory)
    #[arg(short, long)]
    source: Utf8PathBuf,

    /// Target directory to save the backup to
    #[arg(short, long)]
    target: Utf8PathBuf,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and --version aren't errors.
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
                Error::SourcePathNotSupported(_) => 3,
                Error::CreateDatabaseFailed { .. } | Error::DatabaseAlreadyExists(_) => 4,
                Error::DatabaseNotFound(_) => 5,
                _ => 1,
            })
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let database_path = args.target.join("backup.fdb");
    let store = Arc::new(DirectoryBlobStore::new(args.target.clone()));
    let backup = Backup::open_or_create(&database_path, store)?;

    let mut uow = backup.unit_of_work()?;
    {
        let mut recorder = uow.run_recorder();
        let run_id = recorder.start()?;

        let mut adder = uow.file_adder(run_id);
        adder
            .event_manager()
            .subscribe(|event| println!("{} {}", event.action, event.full_path));
        adder.add(&args.source)?;

        recorder.stop(run_id)?;
    }
    uow.commit()?;

    // Keep a copy of the metadata next to the blobs it describes.
    backup.copy_database_to_store()?;
    Ok(())
}
