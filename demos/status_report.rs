use thread_tasker::prelude::*;

use std::time::Duration;

fn main() -> AnyResult<()> {
    let mut coordinator = TaskCoordinatorBuilder::default()
        .enable_status_report()
        .build::<u64>()?;
    let status_reporter = coordinator
        .take_status_reporter()
        .ok_or_else(|| anyhow!("status report is disabled"))?;

    for task_id in 0..3u64 {
        coordinator.spawn(task_id, |_: &TaskControl, n: u64| (n * n) as TaskOutcome, task_id)?;
    }

    for task_id in 0..3u64 {
        coordinator.wait_task(&task_id, Duration::from_secs(1))?;
    }

    // Finish events are sent from the task threads right after they publish.
    std::thread::sleep(Duration::from_millis(50));

    while let Ok(event) = status_reporter.get_public_event() {
        println!("{:?}", event);
    }

    Ok(())
}
