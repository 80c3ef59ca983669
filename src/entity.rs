//! TaskCoordinator keeps ad-hoc background tasks addressed by an id,
//! each running on its own OS thread,
//! and lets the caller start, wait on, stop and inspect them.
//!
//! # TaskCoordinator
//!
//! User applications can be served through the lib used by TaskCoordinator:
//!
//! 1. Launch a task under an id, restart it under the same id once it finished.
//! 2. Cooperative cancellation: the body polls its `TaskControl`.
//! 3. Optional auto-cleanup, a sweeper thread reaps finished tasks.

use crate::prelude::*;
use crate::runtime_trace::record::{RecordInner, TaskRecord};
use crate::runtime_trace::registry::TaskRegistry;
use crate::runtime_trace::runner::{self, FinishNotifier, Launch};
use crate::runtime_trace::sweeper::Sweeper;

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use event_listener::Event;
use snowflake::SnowflakeIdGenerator;

cfg_status_report!(
    use crate::utils::status_report::StatusReporter;
);

/// Grace period for stops issued on teardown.
pub(crate) const DEFAULT_FINAL_GRACE: Duration = Duration::from_millis(320);
/// Grace period when a finished run is reaped by a restart.
pub(crate) const DEFAULT_RESTART_GRACE: Duration = Duration::from_millis(660);
/// Grace period of an explicit `stop_task`.
pub(crate) const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(1120);
/// Idle time of the sweeper between two cycles.
pub(crate) const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(600);
/// Grace period for reaps done by the sweeper.
pub(crate) const DEFAULT_SWEEP_GRACE: Duration = DEFAULT_FINAL_GRACE;

const DEFAULT_THREAD_NAME_PREFIX: &str = "task";

/// Timing and naming knobs shared by every part of a coordinator.
#[derive(Clone, Debug)]
pub(crate) struct CoordinatorConf {
    pub(crate) auto_cleanup: bool,
    pub(crate) sweep_interval: Duration,
    pub(crate) stop_grace: Duration,
    pub(crate) restart_grace: Duration,
    pub(crate) final_grace: Duration,
    pub(crate) sweep_grace: Duration,
    pub(crate) thread_name_prefix: String,
}

impl Default for CoordinatorConf {
    fn default() -> Self {
        CoordinatorConf {
            auto_cleanup: false,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stop_grace: DEFAULT_STOP_GRACE,
            restart_grace: DEFAULT_RESTART_GRACE,
            final_grace: DEFAULT_FINAL_GRACE,
            sweep_grace: DEFAULT_SWEEP_GRACE,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.into(),
        }
    }
}

/// Builds TaskCoordinator with custom configuration values.
///
/// Methods can be chained in order to set the configuration values. The
/// TaskCoordinator is constructed by calling `build`.
///
/// # Examples
///
/// ```
/// use thread_tasker::prelude::*;
/// use std::time::Duration;
///
/// let coordinator: TaskCoordinator = TaskCoordinatorBuilder::default()
///     .auto_cleanup(true)
///     .sweep_interval(Duration::from_millis(200))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct TaskCoordinatorBuilder {
    conf: CoordinatorConf,
    id_generator_conf: (i32, i32),
    /// Whether or not to enable the status-report
    #[cfg(feature = "status-report")]
    enable_status_report: bool,
}

impl Default for TaskCoordinatorBuilder {
    fn default() -> Self {
        TaskCoordinatorBuilder {
            conf: CoordinatorConf::default(),
            id_generator_conf: (1, 1),
            #[cfg(feature = "status-report")]
            enable_status_report: false,
        }
    }
}

/// SharedHeader Store the core context of the coordinator.
pub(crate) struct SharedHeader<K> {
    // Every task record, keyed by task-id.
    pub(crate) registry: TaskRegistry<K>,
    pub(crate) conf: CoordinatorConf,
    // Raised on teardown, seen by the sweeper and by workers before their finish callback.
    pub(crate) shutdown: Arc<AtomicBool>,
    pub(crate) shutdown_event: Event,
    // Unique id generator for runs.
    pub(crate) id_generator: Mutex<SnowflakeIdGenerator>,
    #[cfg(feature = "status-report")]
    pub(crate) status_report_sender: Option<AsyncSender<PublicEvent<K>>>,
}

impl<K: TaskKey> fmt::Debug for SharedHeader<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("")
            .field(&self.registry)
            .field(&self.conf)
            .field(&self.shutdown)
            .finish()
    }
}

impl<K: TaskKey> SharedHeader<K> {
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn shut_down(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.shutdown_event.notify(usize::MAX);
    }

    fn next_record_id(&self) -> i64 {
        self.id_generator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .generate()
    }

    fn launch(&self, task_id: &K, thread_name: Option<String>) -> Launch {
        let record_id = self.next_record_id();
        let thread_name = thread_name
            .unwrap_or_else(|| format!("{}-{}", self.conf.thread_name_prefix, record_id));

        Launch {
            record_id,
            thread_name,
            shutdown: self.shutdown.clone(),
            notifier: self.finish_notifier(task_id, record_id),
        }
    }

    #[cfg_attr(not(feature = "status-report"), allow(unused_variables))]
    fn finish_notifier(&self, task_id: &K, record_id: i64) -> Option<FinishNotifier> {
        #[cfg(feature = "status-report")]
        if let Some(sender) = self.status_report_sender.clone() {
            let task_id = task_id.clone();
            return Some(Box::new(move |outcome| {
                sender
                    .try_send(PublicEvent::FinishTask(task_id, record_id, outcome))
                    .unwrap_or_else(|e| debug!("Status report dropped: {}", e));
            }));
        }

        None
    }

    #[cfg(feature = "status-report")]
    pub(crate) fn report(&self, event: PublicEvent<K>) {
        if let Some(sender) = self.status_report_sender.as_ref() {
            sender
                .try_send(event)
                .unwrap_or_else(|e| debug!("Status report dropped: {}", e));
        }
    }
}

/// TaskCoordinator is the owner of every named task and of the optional sweeper thread.
///
/// Dropping it stops every remaining task, giving each a short grace period.
pub struct TaskCoordinator<K: TaskKey = String> {
    shared_header: Arc<SharedHeader<K>>,
    sweeper: Option<Sweeper>,
    #[cfg(feature = "status-report")]
    status_reporter: Option<StatusReporter<K>>,
}

impl<K: TaskKey> fmt::Debug for TaskCoordinator<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCoordinator")
            .field("shared_header", &self.shared_header)
            .field("sweeper", &self.sweeper.is_some())
            .finish()
    }
}

impl<K: TaskKey> Default for TaskCoordinator<K> {
    fn default() -> Self {
        TaskCoordinator::new()
    }
}

impl TaskCoordinatorBuilder {
    /// Build TaskCoordinator, launching the sweeper when auto-cleanup is on.
    pub fn build<K: TaskKey>(self) -> AnyResult<TaskCoordinator<K>> {
        let auto_cleanup = self.conf.auto_cleanup;
        let mut coordinator = self.assemble();

        if auto_cleanup {
            coordinator.sweeper = Some(Sweeper::launch(coordinator.shared_header.clone())?);
        }

        info!(
            "TaskCoordinator built, auto-cleanup: {}.",
            coordinator.sweeper.is_some()
        );
        Ok(coordinator)
    }

    fn assemble<K: TaskKey>(self) -> TaskCoordinator<K> {
        let (machine_id, node_id) = self.id_generator_conf;

        #[cfg(feature = "status-report")]
        let (status_report_sender, status_reporter) = if self.enable_status_report {
            let (sender, receiver) = unbounded::<PublicEvent<K>>();
            (Some(sender), Some(StatusReporter::new(receiver)))
        } else {
            (None, None)
        };

        let shared_header = SharedHeader {
            registry: TaskRegistry::default(),
            conf: self.conf,
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_event: Event::new(),
            id_generator: Mutex::new(SnowflakeIdGenerator::new(machine_id, node_id)),
            #[cfg(feature = "status-report")]
            status_report_sender,
        };

        TaskCoordinator {
            shared_header: Arc::new(shared_header),
            sweeper: None,
            #[cfg(feature = "status-report")]
            status_reporter,
        }
    }

    /// Run a sweeper thread that removes finished tasks.
    pub fn auto_cleanup(mut self, auto_cleanup: bool) -> Self {
        self.conf.auto_cleanup = auto_cleanup;
        self
    }

    /// Idle time between two sweeps.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.conf.sweep_interval = interval;
        self
    }

    /// Grace period of `stop_task`.
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.conf.stop_grace = grace;
        self
    }

    /// Grace period used when a finished run is reaped by a restart.
    pub fn restart_grace(mut self, grace: Duration) -> Self {
        self.conf.restart_grace = grace;
        self
    }

    /// Grace period given to each task on teardown and on `remove_task`.
    pub fn final_grace(mut self, grace: Duration) -> Self {
        self.conf.final_grace = grace;
        self
    }

    /// Grace period used by the sweeper.
    pub fn sweep_grace(mut self, grace: Duration) -> Self {
        self.conf.sweep_grace = grace;
        self
    }

    /// Prefix of the generated task thread names.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.conf.thread_name_prefix = prefix.into();
        self
    }

    /// Set internal id-generator for `machine_id` and `node_id`.
    pub fn id_generator_conf(mut self, machine_id: i32, node_id: i32) -> Self {
        self.id_generator_conf = (machine_id, node_id);
        self
    }
}

cfg_status_report!(
/// # Required features
///
/// This function requires the `status-report` feature of the `thread_tasker`
/// crate to be enabled.
    impl TaskCoordinatorBuilder {
        /// Whether to expose public events.
        pub fn enable_status_report(mut self) -> Self {
            self.enable_status_report = true;
            self
        }
    }

    impl<K: TaskKey> TaskCoordinator<K> {
        /// Take StatusReporter from TaskCoordinator, through which you can get public events.
        pub fn take_status_reporter(&mut self) -> Option<StatusReporter<K>> {
            self.status_reporter.take()
        }
    }
);

impl<K: TaskKey> TaskCoordinator<K> {
    /// New a TaskCoordinator without auto-cleanup.
    pub fn new() -> TaskCoordinator<K> {
        TaskCoordinatorBuilder::default().assemble()
    }

    /// Start `task` under `task_id`.
    ///
    /// Fails with `AlreadyRunning` if the previous run under that id is still in its body.
    /// A finished run under the same id is reaped first.
    pub fn start_task(&self, task_id: K, mut task: Task) -> Result<(), TaskError> {
        let record = self.shared_header.registry.get_or_create(task_id.clone());
        let mut inner = record.lock();

        if inner.detached {
            // Reaped between lookup and lock, a fresh record takes its place.
            drop(inner);
            return self.start_task(task_id, task);
        }

        let previous = runner::reap(&mut inner)?;

        let launch = self
            .shared_header
            .launch(&task_id, task.thread_name.take());
        let record_id = launch.record_id;

        let started = runner::start(&mut inner, task, launch);

        if let Err(TaskError::Spawn(ref e)) = started {
            error!("Task {:?} can't start: {}", task_id, e);

            if inner.started_at.is_none() {
                inner.detached = true;
                self.shared_header.registry.remove(&task_id, &record);
            }
        }

        drop(inner);
        if let Some(previous) = previous {
            let _ = previous.wait(self.shared_header.conf.restart_grace);
        }
        started?;

        debug!("Task {:?} started, record_id: {}.", task_id, record_id);

        #[cfg(feature = "status-report")]
        self.shared_header
            .report(PublicEvent::StartTask(task_id, record_id));

        Ok(())
    }

    /// Start `body` with `input` under `task_id`, without callbacks.
    pub fn spawn<F, W>(&self, task_id: K, body: F, input: W) -> Result<(), TaskError>
    where
        F: FnOnce(&TaskControl, W) -> TaskOutcome + Send + 'static,
        W: Send + 'static,
    {
        self.start_task(task_id, Task::new(body, input))
    }

    /// Block until the task finishes or `timeout` elapses.
    ///
    /// Waiting never asks the task to stop.
    pub fn wait_task<Q>(&self, task_id: &Q, timeout: Duration) -> Result<(), TaskError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let completion = self
            .with_record(task_id, |inner| runner::completion(inner))
            .ok_or(TaskError::NotFound)??;

        if completion.wait_timeout(timeout) {
            Ok(())
        } else {
            Err(TaskError::Timeout)
        }
    }

    /// Ask the task to stop and release its thread, waiting up to the configured stop grace.
    pub fn stop_task<Q>(&self, task_id: &Q) -> Result<StopOutcome, TaskError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.stop_task_with_timeout(task_id, self.shared_header.conf.stop_grace)
    }

    /// Same as `stop_task` with an explicit grace period.
    ///
    /// A body that never honors the request keeps this call blocked past `timeout`.
    pub fn stop_task_with_timeout<Q>(
        &self,
        task_id: &Q,
        timeout: Duration,
    ) -> Result<StopOutcome, TaskError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let record = self
            .shared_header
            .registry
            .get(task_id)
            .ok_or(TaskError::NotFound)?;

        let stopping = {
            let mut inner = record.lock();
            if inner.detached {
                return Err(TaskError::NotFound);
            }
            runner::begin_stop(&mut inner)?
        };
        let record_id = stopping.record_id();

        // Waited on without the record lock, readers of the task are never held up.
        let stopped = stopping.wait(timeout);
        runner::end_stop(&mut record.lock(), &stopped);
        let outcome = stopped.outcome();

        debug!("Task stopped, record_id: {:?}, {:?}.", record_id, outcome);

        #[cfg(feature = "status-report")]
        if let (Some(task_id), Some(record_id)) =
            (self.shared_header.registry.key(task_id), record_id)
        {
            self.shared_header
                .report(PublicEvent::StopTask(task_id, record_id));
        }

        Ok(outcome)
    }

    /// Current status of the task, `Unknown` if no record is kept under the id.
    pub fn get_status<Q>(&self, task_id: &Q) -> TaskStatus
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.with_record(task_id, |inner| runner::status(inner))
            .unwrap_or(TaskStatus::Unknown)
    }

    /// Start or finish time of the task, `None` when unknown or unset.
    pub fn get_time<Q>(&self, task_id: &Q, kind: TimeKind) -> Option<SystemTime>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.with_record(task_id, |inner| match kind {
            TimeKind::Started => inner.started_at,
            TimeKind::Finished => inner.finished_at(),
        })
        .flatten()
    }

    /// Outcome of the last finished run.
    ///
    /// `None` when the id is unknown, nothing finished yet, or the body panicked.
    pub fn get_result<Q>(&self, task_id: &Q) -> Option<TaskOutcome>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.with_record(task_id, |inner| inner.result()).flatten()
    }

    /// Unique id of the current (or last) run of the task.
    pub fn get_record_id<Q>(&self, task_id: &Q) -> Option<i64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.with_record(task_id, |inner| inner.record_id).flatten()
    }

    /// Reap the task and forget its record.
    ///
    /// Fails with `AlreadyRunning` while the body is still in flight.
    pub fn remove_task<Q>(&self, task_id: &Q) -> Result<(), TaskError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let record = self
            .shared_header
            .registry
            .get(task_id)
            .ok_or(TaskError::NotFound)?;

        let previous = {
            let mut inner = record.lock();
            if inner.detached {
                return Err(TaskError::NotFound);
            }

            let previous = runner::reap(&mut inner)?;
            inner.detached = true;
            self.shared_header.registry.remove(task_id, &record);
            previous
        };

        if let Some(previous) = previous {
            let _ = previous.wait(self.shared_header.conf.final_grace);
        }

        Ok(())
    }

    /// Number of records kept, finished and unreaped ones included.
    pub fn task_count(&self) -> usize {
        self.shared_header.registry.len()
    }

    /// Ids of every record kept.
    pub fn task_ids(&self) -> Vec<K> {
        self.shared_header.registry.ids()
    }

    /// Set internal id-generator for `machine_id` and `node_id`.
    /// The id-generator binds a unique record id to every run.
    pub fn update_id_generator_conf(&self, machine_id: i32, node_id: i32) {
        let mut id_generator = self
            .shared_header
            .id_generator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        id_generator.machine_id = machine_id;
        id_generator.node_id = node_id;
    }

    #[cfg(test)]
    pub(crate) fn shared_header(&self) -> &SharedHeader<K> {
        &self.shared_header
    }

    fn with_record<Q, R, F>(&self, task_id: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&mut RecordInner) -> R,
    {
        let record: Arc<TaskRecord> = self.shared_header.registry.get(task_id)?;
        let mut inner = record.lock();

        if inner.detached {
            return None;
        }

        Some(f(&mut *inner))
    }
}

impl<K: TaskKey> Drop for TaskCoordinator<K> {
    fn drop(&mut self) {
        self.shared_header.shut_down();

        if let Some(sweeper) = self.sweeper.take() {
            sweeper.join();
        }

        let final_grace = self.shared_header.conf.final_grace;
        for (task_id, record) in self.shared_header.registry.drain() {
            let stopping = {
                let mut inner = record.lock();
                inner.detached = true;
                runner::begin_stop(&mut inner).ok()
            };

            if let Some(stopping) = stopping {
                let stopped = stopping.wait(final_grace);
                runner::end_stop(&mut record.lock(), &stopped);
                debug!("Task {:?} stopped on teardown, {:?}.", task_id, stopped.outcome());
            }
        }

        info!("TaskCoordinator torn down.");
    }
}
