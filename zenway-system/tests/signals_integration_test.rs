// zenway-system/tests/signals_integration_test.rs
//
// Signal dispositions are process wide, so everything runs in a single test.

use anyhow::Result;
use signal_hook::consts::signal::{SIGTERM, SIGUSR1, SIGUSR2};
use std::cell::RefCell;
use std::os::fd::AsRawFd;
use std::rc::Rc;
use std::time::Duration;
use zenway_buffer_manager::BufferPool;
use zenway_system::main_loop::MainLoop;
use zenway_system::manager::Manager;
use zenway_system::output::Outputs;
use zenway_system::signals::SignalSource;
use zenway_system::sources::Sources;

const WAIT: Option<Duration> = Some(Duration::from_secs(1));

#[test]
fn test_signals_drive_visibility_and_shutdown() -> Result<()> {
    let mut main_loop = MainLoop::new()?;
    let renderer = Outputs::new(BufferPool::new(2, 16, 4)?, Vec::new());
    let manager = Rc::new(RefCell::new(Manager::new(Sources::default(), Box::new(renderer))));
    main_loop.register_notification_handler(manager.clone());

    let signals = SignalSource::new(manager.borrow().control(), main_loop.wakeup_handle())?;
    main_loop.register_io_handler(signals.as_raw_fd(), "signals", signals.clone())?;

    signal_hook::low_level::raise(SIGUSR1)?;
    assert!(main_loop.dispatch(WAIT)?);
    assert!(manager.borrow().is_visible());

    signal_hook::low_level::raise(SIGUSR2)?;
    assert!(main_loop.dispatch(WAIT)?);
    assert!(!manager.borrow().is_visible());

    signal_hook::low_level::raise(SIGTERM)?;
    main_loop.run()?;
    assert!(main_loop.wakeup_handle().is_stopped());
    Ok(())
}
