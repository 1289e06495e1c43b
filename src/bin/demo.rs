//! Demo: registers a few timers against one scheduler and sleeps.
//!
//! Usage:
//!   cargo run --bin demo

use log::info;
use std::thread;
use std::time::Duration;
use timer_pool::{Scheduler, Timer};

fn setup_logger() -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {} [{}] {}",
                chrono::Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn main() {
    if let Err(e) = setup_logger() {
        eprintln!("failed to initialize logging: {}", e);
    }

    let scheduler = Scheduler::new();

    info!("create repeating 1000ms timer");
    let t1000 = scheduler.push(Duration::from_millis(1000), || {
        info!("1000ms");
        true
    });

    info!("create repeating 2000ms timer");
    let t2000 = scheduler.push(Duration::from_millis(2000), || {
        info!("2000ms");
        true
    });

    // The pre-constructed form: build the timer first, schedule it later.
    info!("create repeating 500ms timer");
    let t500 = Timer::new(Duration::from_millis(500), || {
        info!("500ms");
        true
    });
    scheduler.push_timer(&t500);

    info!("create one-shot 3000ms timer");
    let _t3000 = scheduler.push(Duration::from_millis(3000), || {
        info!("3000ms");
        false
    });

    thread::sleep(Duration::from_secs(10));
    info!("stop 1000ms timer");
    scheduler.stop(&t1000);

    thread::sleep(Duration::from_secs(10));
    info!("stop 2000ms timer");
    scheduler.stop(&t2000);

    thread::sleep(Duration::from_secs(10));
    info!("close scheduler");
    scheduler.join();
}
