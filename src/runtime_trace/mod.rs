//! kind of container for trace named tasks.
//!
//! # TaskRegistry
//!
//! storage every task record, you can reach a running task by its task-id:
//!
//! 1. task-id is unique, one record per id at a time.
//! 2. A record is created on first start and reused by every restart under the same id.
//!
//! # Sweeper
//!
//! this is the resource guardian:
//!
//! 1. Only running when auto-cleanup is enabled.
//! 2. Each cycle it reaps finished tasks and forgets their records.
//! 3. Busy records are skipped and picked up on the next cycle.
pub(crate) mod record;
pub mod registry;
pub(crate) mod runner;
pub mod state;
pub(crate) mod sweeper;
