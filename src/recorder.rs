//! Brackets backup runs with Started/Finished events.

use jiff::Timestamp;
use rusqlite::Connection;
use tracing::*;
use uuid::Uuid;

use crate::error::Result;
use crate::event::{RunEvent, RunEventAction};
use crate::pubsub::EventManager;
use crate::repo::runs::RunEventStreamRepository;

pub struct RunRecorder<'c> {
    conn: &'c Connection,
    event_manager: EventManager<RunEvent>,
}

impl<'c> RunRecorder<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            event_manager: EventManager::new(),
        }
    }

    pub fn event_manager(&mut self) -> &mut EventManager<RunEvent> {
        &mut self.event_manager
    }

    /// Opens a new run and returns its id.
    pub fn start(&mut self) -> Result<Uuid> {
        let run_id = Uuid::new_v4();
        info!("Backup run {run_id} started");
        self.emit(RunEvent {
            run_id,
            at: Timestamp::now(),
            action: RunEventAction::Started,
        })?;
        Ok(run_id)
    }

    pub fn stop(&mut self, run_id: Uuid) -> Result<()> {
        info!("Backup run {run_id} finished");
        self.emit(RunEvent {
            run_id,
            at: Timestamp::now(),
            action: RunEventAction::Finished,
        })
    }

    fn emit(&mut self, event: RunEvent) -> Result<()> {
        RunEventStreamRepository::new(self.conn).add_event(&event)?;
        self.event_manager.publish(&event);
        Ok(())
    }
}
