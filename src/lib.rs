//! thread-tasker is a coordinator of named background tasks.
//!
//! Every task runs on its own OS thread and is addressed by an id the caller picks,
//! the coordinator lets you start, wait on, stop, inspect and reap it by that id.
//!
//! Cancellation is cooperative: a stop request raises a flag on the task's `TaskControl`
//! (and runs an optional stop handler), the body decides when to honor it.
//!
//! With auto-cleanup a sweeper thread forgets finished tasks on its own,
//! otherwise their records stay readable until restarted, removed or the coordinator drops.
//!
//! # Example
//!
//! ```
//! use thread_tasker::prelude::*;
//! use std::thread;
//! use std::time::Duration;
//!
//! fn main() -> AnyResult<()> {
//!     let coordinator = TaskCoordinator::new();
//!
//!     let body = |_control: &TaskControl, outcome: TaskOutcome| {
//!         thread::sleep(Duration::from_millis(50));
//!         outcome
//!     };
//!     coordinator.spawn("job1".to_string(), body, 7)?;
//!
//!     assert!(coordinator.wait_task("job1", Duration::from_millis(10)).is_err());
//!     coordinator.wait_task("job1", Duration::from_secs(2))?;
//!
//!     assert_eq!(coordinator.get_status("job1"), TaskStatus::Finished);
//!     assert_eq!(coordinator.get_result("job1"), Some(7));
//!     Ok(())
//! }
//! ```
//!
//! # Feature flags
//!
//! - `status-report`: expose task lifecycle events through a `StatusReporter`.
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
pub(crate) mod macros;

pub mod entity;
pub mod error;
pub mod prelude;
pub mod runtime_trace;
pub mod task;
pub mod utils;
