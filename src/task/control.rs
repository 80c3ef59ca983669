//! Cooperative cancellation shared between the coordinator and a running task body.
//!
//! # TaskControl
//!
//! Each run gets a fresh `TaskControl`:
//!
//! 1. The stop flag is advisory, the body has to poll `is_stop_requested` to cooperate.
//! 2. An optional stop handler is invoked once when stop is requested,
//! so a body parked in a blocking call it owns (a socket read, a child wait) can be woken.
//! 3. `wait_for_stop` lets a body sleep until either stop is requested or its timeout elapses.

use crate::prelude::*;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use event_listener::Event;

/// Callback used to unblock a task body when stop is requested.
pub type StopHandler = Box<dyn FnOnce() + Send + 'static>;

/// Per-run cancellation handle.
#[derive(Default)]
pub struct TaskControl {
    stop_flag: AtomicBool,
    stop_handler: Mutex<Option<StopHandler>>,
    stop_event: Event,
}

impl fmt::Debug for TaskControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskControl")
            .field("stop_flag", &self.is_stop_requested())
            .finish()
    }
}

impl TaskControl {
    pub(crate) fn new(stop_handler: Option<StopHandler>) -> Self {
        TaskControl {
            stop_handler: Mutex::new(stop_handler),
            ..Default::default()
        }
    }

    /// Whether the coordinator asked this run to finish.
    #[inline(always)]
    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    /// Register (or replace) the handler invoked when stop is requested.
    ///
    /// If stop was already requested the handler runs right away on the calling thread.
    pub fn set_stop_handler<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_stop_requested() {
            handler();
            return;
        }

        *self.lock_handler() = Some(Box::new(handler));

        // Stop may have raced in between the check and the store.
        if self.is_stop_requested() {
            if let Some(handler) = self.lock_handler().take() {
                handler();
            }
        }
    }

    /// Block until stop is requested or `timeout` elapses.
    ///
    /// Returns `true` if stop was requested.
    pub fn wait_for_stop(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_stop_requested() {
                return true;
            }

            let listener = self.stop_event.listen();

            if self.is_stop_requested() {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            listener.wait_timeout(deadline - now);
        }
    }

    /// Invoke the stop handler (if any) and raise the flag.
    pub(crate) fn request_stop(&self) {
        let handler = self.lock_handler().take();
        self.stop_flag.store(true, Ordering::Release);

        if let Some(handler) = handler {
            handler();
        }

        self.stop_event.notify(usize::MAX);
    }

    fn lock_handler(&self) -> std::sync::MutexGuard<'_, Option<StopHandler>> {
        self.stop_handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
