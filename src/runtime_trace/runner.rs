//! Start/stop/wait state machine of a single record.
//!
//! A record goes `Idle -> Running -> Finished -> Idle`:
//!
//! 1. `reap` settles a finished run, `start` then launches one thread.
//! 2. The worker publishes its finish before the thread exits, there is no forced kill.
//! 3. `begin_stop` hands the run over, `Stopping::wait` asks the body to finish
//!    and releases its thread, `end_stop` settles the record.
//!
//! Every function taking a `RecordInner` runs with the record lock held by the caller.
//! Waiting and joining happen in `Stopping::wait`, after the caller released that lock.
//! The worker thread never takes it.

use super::record::{Completion, Finish, RecordInner, RunHandle};
use super::state::{StopOutcome, TaskStatus};
use crate::prelude::*;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, Builder, JoinHandle};
use std::time::SystemTime;

/// Notified on the worker thread right after the finish is published.
pub(crate) type FinishNotifier = Box<dyn FnOnce(Option<TaskOutcome>) + Send + 'static>;

/// What the coordinator hands over for a launch besides the task itself.
pub(crate) struct Launch {
    pub(crate) record_id: i64,
    pub(crate) thread_name: String,
    pub(crate) shutdown: Arc<AtomicBool>,
    pub(crate) notifier: Option<FinishNotifier>,
}

/// A run taken out of its record, to be waited on and released without the record lock.
///
/// Only the first stopper of a run gets its thread, later ones just wait.
#[must_use]
#[derive(Debug)]
pub(crate) struct Stopping {
    record_id: Option<i64>,
    control: Arc<TaskControl>,
    completion: Arc<Completion>,
    thread: Option<JoinHandle<()>>,
}

impl Stopping {
    pub(crate) fn record_id(&self) -> Option<i64> {
        self.record_id
    }

    /// Ask the body to finish, wait up to `timeout`, then release the thread.
    ///
    /// A body that ignores the request keeps this call blocked on the join past `timeout`,
    /// the record itself stays readable meanwhile.
    pub(crate) fn wait(self, timeout: Duration) -> Stopped {
        if !self.completion.is_finished() {
            self.control.request_stop();
        }

        let outcome = if self.completion.wait_timeout(timeout) {
            StopOutcome::Graceful
        } else {
            warn!(
                "Task did not stop within {:?}, record_id: {:?}, joining anyway.",
                timeout, self.record_id
            );
            StopOutcome::Overdue
        };

        if let Some(thread) = self.thread {
            release_thread(thread);
        }

        Stopped {
            outcome,
            completion: self.completion,
        }
    }
}

/// The result of `Stopping::wait`, settled into the record by `end_stop`.
#[derive(Debug)]
pub(crate) struct Stopped {
    outcome: StopOutcome,
    completion: Arc<Completion>,
}

impl Stopped {
    pub(crate) fn outcome(&self) -> StopOutcome {
        self.outcome
    }
}

fn release_thread(thread: JoinHandle<()>) {
    // Reached from the run's own finish callback or body, the handle is just dropped.
    if thread.thread().id() == thread::current().id() {
        return;
    }

    if thread.join().is_err() {
        error!("A task thread panicked after its body returned.");
    }
}

/// Settle a finished run so the record can start again.
///
/// Fails with `AlreadyRunning` while the body is in flight.
/// The returned run still has to be released once the record lock is dropped.
pub(crate) fn reap(inner: &mut RecordInner) -> Result<Option<Stopping>, TaskError> {
    let finished = match inner.running.as_ref() {
        Some(run) => run.completion.is_finished(),
        None => return Ok(None),
    };
    if !finished {
        return Err(TaskError::AlreadyRunning);
    }

    let stopping = begin_stop(inner)?;
    settle(inner);
    Ok(Some(stopping))
}

/// Launch `task` on a record holding no run, `reap` it first.
pub(crate) fn start(inner: &mut RecordInner, task: Task, launch: Launch) -> Result<(), TaskError> {
    if inner.running.is_some() {
        return Err(TaskError::AlreadyRunning);
    }

    let Task {
        body,
        finish_callback,
        stop_handler,
        ..
    } = task;
    let Launch {
        record_id,
        thread_name,
        shutdown,
        notifier,
    } = launch;

    let control = Arc::new(TaskControl::new(stop_handler));
    let completion = Arc::new(Completion::default());

    let worker_control = control.clone();
    let worker_completion = completion.clone();
    let worker = move || {
        let span = info_span!("task_run", record_id);
        let _entered = span.enter();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| body(&*worker_control))) {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                error!("Task body panicked, record_id: {}.", record_id);
                None
            }
        };

        worker_completion.publish(Finish {
            outcome,
            at: SystemTime::now(),
        });

        if let Some(notifier) = notifier {
            notifier(outcome);
        }

        // Torn down, nobody is left to hear about it.
        if shutdown.load(Ordering::Acquire) {
            debug!("Skip finish callback during teardown, record_id: {}.", record_id);
            return;
        }

        if let (Some(callback), Some(outcome)) = (finish_callback, outcome) {
            callback(outcome);
        }
    };

    let started_at = SystemTime::now();
    let thread = Builder::new().name(thread_name).spawn(worker)?;

    inner.control = control;
    inner.started_at = Some(started_at);
    inner.finished_at = None;
    inner.result = None;
    inner.record_id = Some(record_id);
    inner.running = Some(RunHandle {
        thread: Some(thread),
        completion,
    });

    debug!("Task thread launched, record_id: {}.", record_id);
    Ok(())
}

/// Where to wait for the current run, the caller releases the lock before waiting.
pub(crate) fn completion(inner: &RecordInner) -> Result<Arc<Completion>, TaskError> {
    inner
        .running
        .as_ref()
        .map(|run| run.completion.clone())
        .ok_or(TaskError::NotRunning)
}

/// Hand the current run over for stopping.
///
/// The run stays in the record until `end_stop`, so no second run starts meanwhile.
pub(crate) fn begin_stop(inner: &mut RecordInner) -> Result<Stopping, TaskError> {
    let run = inner.running.as_mut().ok_or(TaskError::NotRunning)?;

    Ok(Stopping {
        record_id: inner.record_id,
        control: inner.control.clone(),
        completion: run.completion.clone(),
        thread: run.thread.take(),
    })
}

/// Settle the stopped run, unless it is still in its body or the record moved on.
pub(crate) fn end_stop(inner: &mut RecordInner, stopped: &Stopped) {
    let is_current = inner
        .running
        .as_ref()
        .map_or(false, |run| Arc::ptr_eq(&run.completion, &stopped.completion));

    if is_current && stopped.completion.is_finished() {
        settle(inner);
    }
}

fn settle(inner: &mut RecordInner) {
    if let Some(run) = inner.running.take() {
        let finish = run.completion.get().copied();
        inner.result = finish.and_then(|finish| finish.outcome);
        inner.finished_at = Some(finish.map_or_else(SystemTime::now, |finish| finish.at));
        inner.control = Arc::new(TaskControl::default());
    }
}

pub(crate) fn status(inner: &RecordInner) -> TaskStatus {
    if inner.is_in_flight() {
        TaskStatus::Processing
    } else if inner.finished_at().is_some() {
        TaskStatus::Finished
    } else {
        TaskStatus::NotStarted
    }
}
