use thread_tasker::prelude::*;

use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

// A body blocked in `accept` is woken by connecting to it from the stop handler.
fn main() -> AnyResult<()> {
    env_logger::init();

    let coordinator: TaskCoordinator = TaskCoordinator::new();
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let address = listener.local_addr()?;

    let task = TaskBuilder::default()
        .set_stop_handler(move || {
            if let Ok(stream) = TcpStream::connect(address) {
                let _ = stream.shutdown(Shutdown::Both);
            }
        })
        .spawn(
            |control: &TaskControl, listener: TcpListener| {
                let mut served = 0;
                for stream in listener.incoming() {
                    if control.is_stop_requested() {
                        break;
                    }
                    if stream.is_ok() {
                        served += 1;
                    }
                }
                served
            },
            listener,
        );
    coordinator.start_task("acceptor".into(), task)?;

    thread::sleep(Duration::from_millis(100));
    println!("status: {:?}", coordinator.get_status("acceptor"));

    let outcome = coordinator.stop_task("acceptor")?;
    println!(
        "stopped {:?}, served {:?} connections",
        outcome,
        coordinator.get_result("acceptor")
    );

    Ok(())
}
