/// Observable state of a task-id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// No record is kept under the id.
    Unknown,
    /// A record exists but nothing was ever launched on it.
    NotStarted,
    /// A thread is in flight and the body has not returned yet.
    Processing,
    /// The last run finished, its outcome can be read until the record is reaped.
    Finished,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Unknown
    }
}

/// Which timestamp of a record to read.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimeKind {
    /// When the current (or last) run was launched.
    Started,
    /// When the last run finished, unset while a run is in flight.
    Finished,
}

/// How a stop request ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StopOutcome {
    /// The body honored the request within the grace period.
    Graceful,
    /// The grace period elapsed and the thread was joined past its budget.
    Overdue,
}

impl StopOutcome {
    /// Whether the task stopped within its grace period.
    pub fn is_graceful(self) -> bool {
        self == StopOutcome::Graceful
    }
}
