//! Per-run summaries: when a backup ran, and how much it changed.

use std::collections::{BTreeSet, HashMap};

use jiff::Timestamp;
use rusqlite::Connection;
use tracing::*;
use uuid::Uuid;

use crate::error::Result;
use crate::event::{FileEventAction, RunEvent, RunEventAction};
use crate::repo::events::FileEventStreamRepository;
use crate::repo::runs::{RunEventStreamRepository, RunSearchCriteria};

#[derive(Debug, Clone)]
pub struct BackupSummary {
    pub run_id: Uuid,
    pub started_utc: Option<Timestamp>,
    pub finished_utc: Option<Timestamp>,
    /// Filled only when the search asked for run events.
    pub run_events: Vec<RunEvent>,
    pub modified_files_count: u64,
    pub total_size_bytes: u64,
}

impl BackupSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_utc: None,
            finished_utc: None,
            run_events: Vec::new(),
            modified_files_count: 0,
            total_size_bytes: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ResultsPage {
    pub backups: Vec<BackupSummary>,
    pub next_page_skip: u64,
    pub total_backups: u64,
}

/// Pages through recorded backup runs, newest first.
pub struct RunReader<'c> {
    conn: &'c Connection,
}

impl<'c> RunReader<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn search(
        &self,
        criteria: &RunSearchCriteria,
        skip: u64,
        page_size: u64,
        include_run_events: bool,
    ) -> Result<ResultsPage> {
        let run_repo = RunEventStreamRepository::new(self.conn);

        // Keep summaries ordered by the first event seen for each run
        let mut summary_order = Vec::new();
        let mut summaries: HashMap<Uuid, BackupSummary> = HashMap::new();
        for event in run_repo.search_by_run(criteria, skip, page_size)? {
            let summary = summaries.entry(event.run_id).or_insert_with(|| {
                summary_order.push(event.run_id);
                BackupSummary::new(event.run_id)
            });
            match event.action {
                RunEventAction::Started => summary.started_utc = Some(event.at),
                RunEventAction::Finished => summary.finished_utc = Some(event.at),
            }
            if include_run_events {
                summary.run_events.push(event);
            }
        }

        let modified: BTreeSet<FileEventAction> = [
            FileEventAction::ChangedAdded,
            FileEventAction::ChangedModified,
        ]
        .into();
        let all_stats = FileEventStreamRepository::new(self.conn)
            .statistics_by_run(&summary_order, &modified)?;

        let mut page = ResultsPage {
            next_page_skip: skip + (summary_order.len() as u64).min(page_size),
            total_backups: run_repo.backup_count()?,
            ..Default::default()
        };
        for run_id in &summary_order {
            let mut summary = summaries.remove(run_id).unwrap();
            match all_stats.get(run_id) {
                Some(stats) => {
                    summary.modified_files_count = stats.matching_events;
                    summary.total_size_bytes = stats.matching_size_bytes;
                }
                None => warn!("Failed to calculate statistics for run {run_id}"),
            }
            page.backups.push(summary);
        }
        Ok(page)
    }
}
