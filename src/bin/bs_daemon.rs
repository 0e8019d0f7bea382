//! The backup daemon: a job executor behind a small HTTP interface.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use tracing::*;

use backstream::backup::{self, Backup};
use backstream::executor::JobExecutor;
use backstream::logging;
use backstream::store::NullBlobStore;
use backstream::uow::UnitOfWork;

/// Run the backup daemon.
#[derive(Debug, Parser)]
#[command(name = "bs_daemon")]
struct Args {
    /// Verbosity (-v, -vv, -vvv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// TCP port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Backup database location (defaults to ~/.backstream/backup.fdb)
    #[arg(long)]
    database: Option<Utf8PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let database_path = match args.database {
        Some(path) => path,
        None => backup::default_database_path()?,
    };
    info!("Using the backup database at {database_path}");
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Metadata only; blob stores are configured separately.
    let backup = Arc::new(Backup::open_or_create(
        &database_path,
        Arc::new(NullBlobStore::new()),
    )?);
    let executor = Arc::new(JobExecutor::new(backup));

    let app = Router::new()
        .route("/ping", post(ping))
        .route("/backup", post(queue_backup))
        .with_state(executor);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port))
        .await
        .with_context(|| format!("Couldn't listen on port {}", args.port))?;
    info!("Listening on port {}", args.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;
    Ok(())
}

/// Echoes whatever JSON it's given.
async fn ping(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
    Json(body)
}

#[derive(Debug, serde_derive::Deserialize)]
struct BackupRequest {
    path: Utf8PathBuf,
}

async fn queue_backup(
    State(executor): State<Arc<JobExecutor>>,
    Json(request): Json<BackupRequest>,
) -> StatusCode {
    info!("Queueing backup of {}", request.path);
    executor.queue(Box::new(move |uow| file_backup_job(uow, &request.path)));
    StatusCode::ACCEPTED
}

/// One whole backup run inside one unit of work.
fn file_backup_job(uow: &mut UnitOfWork, path: &Utf8Path) -> Result<()> {
    {
        let mut recorder = uow.run_recorder();
        let run_id = recorder.start()?;

        let mut adder = uow.file_adder(run_id);
        adder
            .event_manager()
            .subscribe(|event| debug!("{} {}", event.action, event.full_path));
        adder.add(path)?;

        recorder.stop(run_id)?;
    }
    uow.commit()?;
    Ok(())
}
