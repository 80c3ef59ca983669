// status_report is mod for report task lifecycle
// if open feature status-report, then compile that mod .
use crate::prelude::*;

/// Receiving end of the public events of a coordinator.
#[derive(Debug, Clone)]
pub struct StatusReporter<K> {
    inner: AsyncReceiver<PublicEvent<K>>,
}

impl<K> StatusReporter<K> {
    /// Take the next public event without blocking.
    pub fn get_public_event(&self) -> AnyResult<PublicEvent<K>> {
        let event = self.inner.try_recv()?;
        Ok(event)
    }

    /// Block the thread until the next public event arrives.
    pub fn next_public_event_with_wait(&self) -> AnyResult<PublicEvent<K>> {
        let event = smol::block_on(self.inner.recv())?;
        Ok(event)
    }

    /// Async-await the next public event.
    pub async fn next_public_event_with_async_wait(&self) -> AnyResult<PublicEvent<K>> {
        let event = self.inner.recv().await?;
        Ok(event)
    }

    pub(crate) fn new(inner: AsyncReceiver<PublicEvent<K>>) -> Self {
        Self { inner }
    }
}

/// Lifecycle events of the tasks, carrying the task-id and the record-id of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicEvent<K> {
    StartTask(K, i64),
    /// The outcome is `None` when the body panicked.
    FinishTask(K, i64, Option<TaskOutcome>),
    StopTask(K, i64),
    ReapTask(K),
}

impl<K> PublicEvent<K> {
    /// The task-id the event is about.
    pub fn task_id(&self) -> &K {
        match self {
            PublicEvent::StartTask(task_id, _)
            | PublicEvent::FinishTask(task_id, _, _)
            | PublicEvent::StopTask(task_id, _)
            | PublicEvent::ReapTask(task_id) => task_id,
        }
    }
}
