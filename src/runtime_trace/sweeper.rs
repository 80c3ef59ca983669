use super::registry::TaskKey;
use super::runner;
use crate::entity::SharedHeader;
use crate::prelude::*;

use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

use anyhow::Context;

/// Background reaper of finished tasks, only running with auto-cleanup.
#[derive(Debug)]
pub(crate) struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub(crate) fn launch<K: TaskKey>(shared_header: Arc<SharedHeader<K>>) -> AnyResult<Sweeper> {
        let handle = Builder::new()
            .name("task_sweeper".into())
            .spawn(move || {
                info!(" `task_sweeper` start.");
                sweep_until_shutdown(&shared_header);
                info!(" `task_sweeper` exit.");
            })
            .context("`task_sweeper` can't start.")?;

        Ok(Sweeper { handle })
    }

    /// The shutdown flag must be raised before, or this blocks forever.
    pub(crate) fn join(self) {
        if self.handle.join().is_err() {
            error!("`task_sweeper` panicked.");
        }
    }
}

fn sweep_until_shutdown<K: TaskKey>(shared_header: &SharedHeader<K>) {
    let interval = shared_header.conf.sweep_interval;

    loop {
        if shared_header.is_shutting_down() {
            break;
        }

        let listener = shared_header.shutdown_event.listen();

        if shared_header.is_shutting_down() {
            break;
        }

        // Woken up means shutdown, the next round sees the flag.
        if listener.wait_timeout(interval) {
            continue;
        }

        let reaped = sweep_finished(shared_header);
        if reaped > 0 {
            debug!("`task_sweeper` reaped {} finished tasks.", reaped);
        }
    }
}

/// Reap and remove every finished record whose thread already exited.
///
/// Records busy with another caller are left for the next cycle.
pub(crate) fn sweep_finished<K: TaskKey>(shared_header: &SharedHeader<K>) -> usize {
    let grace = shared_header.conf.sweep_grace;
    let mut reaped = Vec::new();

    shared_header.registry.retain(|task_id, record| {
        let mut inner = match record.try_lock() {
            Some(inner) => inner,
            None => return true,
        };

        if !inner.is_reapable() {
            return true;
        }

        // Finished runs only, neither the stop handler nor a join runs under the registry lock.
        reaped.push(runner::reap(&mut inner).ok().flatten());
        inner.detached = true;
        trace!("Reap task {:?}, record_id: {:?}.", task_id, inner.record_id);

        #[cfg(feature = "status-report")]
        shared_header.report(PublicEvent::ReapTask(task_id.clone()));

        false
    });

    // Released here, outside the registry lock.
    let count = reaped.len();
    for previous in reaped.into_iter().flatten() {
        let _ = previous.wait(grace);
    }
    count
}
