//! task is the module describing what a caller hands to the coordinator:
//! the body bound to its work-input, the optional callbacks,
//! and the cooperative cancellation handle the body polls.

pub mod control;
pub mod routine;

pub use control::{StopHandler, TaskControl};
pub use routine::{FinishCallback, Task, TaskBuilder, TaskOutcome};
