//! A "prelude" for users of the `thread-tasker` crate.
//!
//! This prelude is similar to the standard library's prelude in that you'll
//! almost always want to import its entire contents, but unlike the standard
//! library's prelude you'll have to do so manually:
//!
//! ```
//! use thread_tasker::prelude::*;
//! ```
//!
//! The prelude may grow over time as additional items see ubiquitous use.

pub use crate::entity::{TaskCoordinator, TaskCoordinatorBuilder};
pub use crate::error::*;
pub use crate::runtime_trace::registry::TaskKey;
pub use crate::runtime_trace::state::{StopOutcome, TaskStatus, TimeKind};
pub use crate::task::{FinishCallback, StopHandler, Task, TaskBuilder, TaskControl, TaskOutcome};

pub use anyhow::{anyhow, Result as AnyResult};
pub use thiserror::Error;

cfg_status_report!(
    pub use crate::utils::status_report::{PublicEvent, StatusReporter};
    pub(crate) use smol::channel::{unbounded, Receiver as AsyncReceiver, Sender as AsyncSender};
);

pub(crate) use log::{debug, error, info, trace, warn};
pub(crate) use std::time::Duration;
pub(crate) use tracing::info_span;
