//! A single-consumer job queue: backup and restore operations run one at a
//! time, each inside its own unit of work, with failures kept to themselves.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::*;

use crate::backup::Backup;
use crate::uow::UnitOfWork;

/// A queued operation. Jobs commit their own unit of work; an uncommitted
/// one rolls back when the job returns.
pub type Job = Box<dyn FnOnce(&mut UnitOfWork) -> anyhow::Result<()> + Send>;

struct QueueState {
    jobs: VecDeque<Job>,
    running: bool,
}

struct Shared {
    backup: Arc<Backup>,
    queue: Mutex<QueueState>,
    signal: Condvar,
}

/// Owns the worker thread. Jobs run strictly in enqueue order; a job
/// completing implies every earlier job already completed.
pub struct JobExecutor {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl JobExecutor {
    pub fn new(backup: Arc<Backup>) -> Self {
        let shared = Arc::new(Shared {
            backup,
            queue: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                running: true,
            }),
            signal: Condvar::new(),
        });
        let worker_shared = shared.clone();
        let worker = std::thread::spawn(move || run(worker_shared));
        Self {
            shared,
            worker: Some(worker),
        }
    }

    pub fn queue(&self, job: Job) {
        {
            let mut state = self.shared.queue.lock().unwrap();
            state.jobs.push_back(job);
        }
        self.shared.signal.notify_one();
    }

    /// How many jobs are waiting (not counting one currently running).
    pub fn queued_count(&self) -> usize {
        self.shared.queue.lock().unwrap().jobs.len()
    }

    /// Discards queued jobs and joins the worker. A job already running
    /// finishes first.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.queue.lock().unwrap();
            state.jobs.clear();
            state.running = false;
        }
        self.shared.signal.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for JobExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut state = shared.queue.lock().unwrap();
            loop {
                if !state.running {
                    return;
                }
                if let Some(job) = state.jobs.pop_front() {
                    break job;
                }
                state = shared.signal.wait(state).unwrap();
            }
        };
        execute(&shared.backup, job);
    }
}

fn execute(backup: &Backup, job: Job) {
    let outcome = catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<()> {
        let mut uow = backup.unit_of_work()?;
        job(&mut uow)
    }));
    match outcome {
        Ok(Ok(())) => (),
        Ok(Err(e)) => error!("Error while executing job: {e:#}"),
        Err(_) => error!("Panic while executing job"),
    }
}
