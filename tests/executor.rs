use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};

use backstream::executor::JobExecutor;

mod common;
use common::*;

#[test]
fn jobs_run_in_enqueue_order_with_fault_isolation() -> Result<()> {
    let t = test_backup()?;
    let backup = Arc::new(t.backup);
    let executor = JobExecutor::new(backup);

    let applied = Arc::new(Mutex::new(Vec::new()));
    let push = |value: i32| {
        let applied = applied.clone();
        move |_uow: &mut backstream::uow::UnitOfWork| -> Result<()> {
            applied.lock().unwrap().push(value);
            Ok(())
        }
    };

    executor.queue(Box::new(push(10)));
    // This one fails after doing its work; the next job must still run.
    let applied2 = applied.clone();
    executor.queue(Box::new(move |_uow| {
        applied2.lock().unwrap().push(20);
        bail!("deliberately broken job")
    }));
    executor.queue(Box::new(push(30)));

    // A final job tells us everything ahead of it has finished.
    let (tx, rx) = mpsc::channel();
    executor.queue(Box::new(move |_uow| {
        tx.send(()).unwrap();
        Ok(())
    }));
    rx.recv()?;

    assert_eq!(*applied.lock().unwrap(), [10, 20, 30]);
    Ok(())
}

#[test]
fn a_panicking_job_does_not_kill_the_worker() -> Result<()> {
    let t = test_backup()?;
    let backup = Arc::new(t.backup);
    let executor = JobExecutor::new(backup);

    executor.queue(Box::new(|_uow| panic!("whoops")));

    let (tx, rx) = mpsc::channel();
    executor.queue(Box::new(move |_uow| {
        tx.send(()).unwrap();
        Ok(())
    }));
    rx.recv()?;
    Ok(())
}

#[test]
fn stop_discards_queued_jobs() -> Result<()> {
    let t = test_backup()?;
    let backup = Arc::new(t.backup);
    let mut executor = JobExecutor::new(backup);

    // Block the worker so the following jobs stay queued.
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    executor.queue(Box::new(move |_uow| {
        entered_tx.send(()).unwrap();
        release_rx.recv().unwrap();
        Ok(())
    }));
    entered_rx.recv()?;

    let ran = Arc::new(Mutex::new(false));
    let ran2 = ran.clone();
    executor.queue(Box::new(move |_uow| {
        *ran2.lock().unwrap() = true;
        Ok(())
    }));
    assert_eq!(executor.queued_count(), 1);

    // stop() clears the queue at once, then waits for the running job;
    // release it shortly after so the join can finish.
    let releaser = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(200));
        release_tx.send(()).unwrap();
    });
    executor.stop();
    releaser.join().unwrap();
    // The running job finished; the queued one was thrown away.
    assert!(!*ran.lock().unwrap());
    Ok(())
}

#[test]
fn jobs_see_a_working_unit_of_work() -> Result<()> {
    let t = test_backup()?;
    let source = t.source_path();
    std::fs::write(source.join("a.txt"), "from a job")?;

    let backup = Arc::new(t.backup);
    let executor = JobExecutor::new(backup.clone());

    let (tx, rx) = mpsc::channel();
    executor.queue(Box::new(move |uow| {
        let mut recorder = uow.run_recorder();
        let run_id = recorder.start()?;
        let mut adder = uow.file_adder(run_id);
        adder.add(&source)?;
        recorder.stop(run_id)?;
        drop(adder);
        drop(recorder);
        uow.commit()?;
        tx.send(()).unwrap();
        Ok(())
    }));
    rx.recv()?;

    let uow = backup.unit_of_work()?;
    let events = uow.file_finder().all_events()?;
    assert_eq!(events.len(), 2); // the directory and the file
    Ok(())
}
