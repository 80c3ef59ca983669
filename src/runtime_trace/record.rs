//! The state kept for one task-id.

use crate::prelude::*;

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::JoinHandle;
use std::time::{Instant, SystemTime};

use event_listener::Event;
use once_cell::sync::OnceCell;

/// What a worker publishes once the body returned.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Finish {
    /// `None` when the body panicked.
    pub(crate) outcome: Option<TaskOutcome>,
    pub(crate) at: SystemTime,
}

/// Publication point between a worker thread and its observers.
///
/// Set exactly once by the worker, so anything that sees it set also sees the outcome.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    finish: OnceCell<Finish>,
    event: Event,
}

impl Completion {
    pub(crate) fn publish(&self, finish: Finish) {
        if self.finish.set(finish).is_ok() {
            self.event.notify(usize::MAX);
        }
    }

    pub(crate) fn get(&self) -> Option<&Finish> {
        self.finish.get()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finish.get().is_some()
    }

    /// Block until the finish is published or `timeout` elapses.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_finished() {
                return true;
            }

            let listener = self.event.listen();

            // Published between the check and the listener registration.
            if self.is_finished() {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            listener.wait_timeout(deadline - now);
        }
    }
}

/// The in-flight thread of a record and where it publishes to.
#[derive(Debug)]
pub(crate) struct RunHandle {
    /// `None` once a stopper took it over.
    pub(crate) thread: Option<JoinHandle<()>>,
    pub(crate) completion: Arc<Completion>,
}

#[derive(Debug)]
pub(crate) struct RecordInner {
    pub(crate) control: Arc<TaskControl>,
    pub(crate) started_at: Option<SystemTime>,
    pub(crate) finished_at: Option<SystemTime>,
    pub(crate) result: Option<TaskOutcome>,
    pub(crate) record_id: Option<i64>,
    pub(crate) running: Option<RunHandle>,
    /// Set once the record left the registry; a holder of a stale `Arc` must re-resolve.
    pub(crate) detached: bool,
}

impl Default for RecordInner {
    fn default() -> Self {
        RecordInner {
            control: Arc::new(TaskControl::default()),
            started_at: None,
            finished_at: None,
            result: None,
            record_id: None,
            running: None,
            detached: false,
        }
    }
}

impl RecordInner {
    fn published(&self) -> Option<&Finish> {
        self.running.as_ref().and_then(|run| run.completion.get())
    }

    /// Finish time, including one the worker published but nobody reaped yet.
    pub(crate) fn finished_at(&self) -> Option<SystemTime> {
        self.finished_at.or_else(|| self.published().map(|finish| finish.at))
    }

    /// Last completed outcome.
    pub(crate) fn result(&self) -> Option<TaskOutcome> {
        match self.published() {
            Some(finish) => finish.outcome,
            None => self.result,
        }
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.running
            .as_ref()
            .map_or(false, |run| !run.completion.is_finished())
    }

    /// Finished and its thread (if still held here) has fully exited, so reaping will not block.
    pub(crate) fn is_reapable(&self) -> bool {
        match self.running.as_ref() {
            Some(run) => {
                run.completion.is_finished()
                    && run.thread.as_ref().map_or(true, JoinHandle::is_finished)
            }
            None => self.finished_at.is_some(),
        }
    }
}

/// One entry of the registry.
#[derive(Debug, Default)]
pub(crate) struct TaskRecord {
    inner: Mutex<RecordInner>,
}

impl TaskRecord {
    pub(crate) fn lock(&self) -> MutexGuard<'_, RecordInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `None` while another thread works on the record.
    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, RecordInner>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_completion_wait() {
        let completion = Arc::new(Completion::default());
        assert!(!completion.wait_timeout(Duration::from_millis(10)));

        let completion_ref = completion.clone();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            completion_ref.publish(Finish {
                outcome: Some(7),
                at: SystemTime::now(),
            });
        });

        assert!(completion.wait_timeout(Duration::from_secs(5)));
        assert_eq!(completion.get().and_then(|finish| finish.outcome), Some(7));
        worker.join().unwrap();
    }

    #[test]
    fn test_completion_publishes_once() {
        let completion = Completion::default();
        let at = SystemTime::now();

        completion.publish(Finish {
            outcome: Some(1),
            at,
        });
        completion.publish(Finish {
            outcome: Some(2),
            at: SystemTime::now(),
        });

        assert_eq!(completion.get().and_then(|finish| finish.outcome), Some(1));
        assert_eq!(completion.get().map(|finish| finish.at), Some(at));
    }

    #[test]
    fn test_fresh_record() {
        let record = TaskRecord::default();
        let inner = record.lock();

        assert!(inner.finished_at().is_none());
        assert!(inner.result().is_none());
        assert!(!inner.is_in_flight());
        assert!(!inner.is_reapable());
    }

    #[test]
    fn test_try_lock_while_held() {
        let record = TaskRecord::default();
        let _held = record.lock();

        assert!(record.try_lock().is_none());
    }
}
