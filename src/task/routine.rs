use super::control::{StopHandler, TaskControl};

use std::fmt;

/// Outcome code returned by a task body.
pub type TaskOutcome = i32;

/// The body of a task, with its work-input already bound.
pub(crate) type TaskBody = Box<dyn FnOnce(&TaskControl) -> TaskOutcome + Send + 'static>;

/// Callback invoked with the outcome after a natural finish.
pub type FinishCallback = Box<dyn FnOnce(TaskOutcome) + Send + 'static>;

/// A unit of work ready to be started under a task-id.
///
/// Built by `TaskBuilder`, consumed by `TaskCoordinator::start_task`.
pub struct Task {
    pub(crate) body: TaskBody,
    pub(crate) finish_callback: Option<FinishCallback>,
    pub(crate) stop_handler: Option<StopHandler>,
    pub(crate) thread_name: Option<String>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("finish_callback", &self.finish_callback.is_some())
            .field("stop_handler", &self.stop_handler.is_some())
            .field("thread_name", &self.thread_name)
            .finish()
    }
}

impl Task {
    /// A task without callbacks, equivalent to `TaskBuilder::default().spawn(body, input)`.
    pub fn new<F, W>(body: F, input: W) -> Task
    where
        F: FnOnce(&TaskControl, W) -> TaskOutcome + Send + 'static,
        W: Send + 'static,
    {
        TaskBuilder::default().spawn(body, input)
    }
}

/// Builds a `Task`.
///
/// # Examples
///
/// ```
/// use thread_tasker::prelude::*;
///
/// let task = TaskBuilder::default()
///     .set_finish_callback(|outcome| println!("finished with {}", outcome))
///     .spawn(|control: &TaskControl, rounds: u32| {
///         for _ in 0..rounds {
///             if control.is_stop_requested() {
///                 return 1;
///             }
///         }
///         0
///     }, 3);
/// ```
#[derive(Default)]
pub struct TaskBuilder {
    finish_callback: Option<FinishCallback>,
    stop_handler: Option<StopHandler>,
    thread_name: Option<String>,
}

impl fmt::Debug for TaskBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskBuilder")
            .field("finish_callback", &self.finish_callback.is_some())
            .field("stop_handler", &self.stop_handler.is_some())
            .field("thread_name", &self.thread_name)
            .finish()
    }
}

impl TaskBuilder {
    /// Set the callback invoked with the outcome once the body returns on its own.
    ///
    /// It is skipped for runs that finish while the coordinator is being torn down.
    pub fn set_finish_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(TaskOutcome) + Send + 'static,
    {
        self.finish_callback = Some(Box::new(callback));
        self
    }

    /// Set the handler invoked when stop is requested.
    ///
    /// The body can also register one itself through `TaskControl::set_stop_handler`.
    pub fn set_stop_handler<F>(mut self, handler: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.stop_handler = Some(Box::new(handler));
        self
    }

    /// Name of the thread running the task, defaults to the coordinator's prefix and the task-id.
    pub fn set_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = Some(thread_name.into());
        self
    }

    /// Bind the body to its work-input.
    pub fn spawn<F, W>(self, body: F, input: W) -> Task
    where
        F: FnOnce(&TaskControl, W) -> TaskOutcome + Send + 'static,
        W: Send + 'static,
    {
        Task {
            body: Box::new(move |control: &TaskControl| body(control, input)),
            finish_callback: self.finish_callback,
            stop_handler: self.stop_handler,
            thread_name: self.thread_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_task() {
        let task = TaskBuilder::default()
            .set_finish_callback(|_| {})
            .set_thread_name("builder-test")
            .spawn(|_control: &TaskControl, input: i32| input * 2, 21);

        assert!(task.finish_callback.is_some());
        assert!(task.stop_handler.is_none());
        assert_eq!(task.thread_name.as_deref(), Some("builder-test"));

        let control = TaskControl::default();
        assert_eq!((task.body)(&control), 42);
    }

    #[test]
    fn test_body_observes_control() {
        let task = Task::new(
            |control: &TaskControl, _: ()| if control.is_stop_requested() { 1 } else { 0 },
            (),
        );

        let control = TaskControl::default();
        control.request_stop();
        assert_eq!((task.body)(&control), 1);
    }
}
