use thread_tasker::prelude::*;

use std::thread;
use std::time::Duration;

fn main() -> AnyResult<()> {
    env_logger::init();

    let coordinator = TaskCoordinatorBuilder::default()
        .auto_cleanup(true)
        .sweep_interval(Duration::from_millis(300))
        .build::<String>()?;

    let task = TaskBuilder::default()
        .set_finish_callback(|outcome| println!("report finished with {}", outcome))
        .spawn(
            |control: &TaskControl, pages: u32| {
                for page in 0..pages {
                    if control.is_stop_requested() {
                        return -1;
                    }
                    println!("rendering page {}", page);
                    thread::sleep(Duration::from_millis(20));
                }
                pages as TaskOutcome
            },
            5,
        );
    coordinator.start_task("report".into(), task)?;

    coordinator.wait_task("report", Duration::from_secs(1))?;
    println!(
        "status: {:?}, result: {:?}",
        coordinator.get_status("report"),
        coordinator.get_result("report")
    );

    // The sweeper forgets it shortly after.
    thread::sleep(Duration::from_millis(700));
    println!("status after sweep: {:?}", coordinator.get_status("report"));

    Ok(())
}
