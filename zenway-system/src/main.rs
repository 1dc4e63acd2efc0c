// zenway overlay entry point

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{error, info, warn};
use zenway_core::config::{ConfigLoader, ZenwayConfig};
use zenway_core::logging::{init_logging, init_minimal_logging, scoped_minimal_logging};
use zenway_system::main_loop::{IoHandler, MainLoop};
use zenway_system::manager::Manager;
use zenway_system::output::Outputs;
use zenway_system::signals::SignalSource;
use zenway_system::sources::clock::LocalTime;
use zenway_system::sources::{DateSource, NetworkSource, PowerSource, Source, Sources, TimeSource};

fn main() {
    let startup_logging = scoped_minimal_logging();
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match ConfigLoader::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    drop(startup_logging);

    if let Err(e) = init_logging(&config.logging, false) {
        init_minimal_logging();
        warn!("Falling back to minimal logging, configured logging failed: {}", e);
    }

    if let Err(e) = run(config) {
        error!("zenway terminated: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: ZenwayConfig) -> Result<()> {
    info!("Starting zenway with {} panels on {} outputs", config.panels.len(), config.outputs.len());

    let mut main_loop = MainLoop::new().context("Failed to create main loop")?;
    let mut sources = Sources::default();
    let handlers = build_sources(&config, &main_loop, &mut sources)?;
    for (name, fd, handler) in handlers {
        main_loop
            .register_io_handler(fd, name, handler)
            .with_context(|| format!("Failed to register {}", name))?;
    }

    let outputs = Outputs::headless(&config).context("Failed to set up outputs")?;
    let manager = Rc::new(RefCell::new(Manager::new(sources, Box::new(outputs))));
    main_loop.register_notification_handler(manager.clone());

    let signals = SignalSource::new(manager.borrow().control(), main_loop.wakeup_handle())
        .context("Failed to install signal handlers")?;
    main_loop.register_io_handler(signals.as_raw_fd(), "signals", signals.clone() as Arc<dyn IoHandler>)?;

    manager.borrow_mut().show();
    main_loop.wakeup_handle().wakeup();
    main_loop.run()?;

    info!("zenway shutting down");
    Ok(())
}

type Registration = (&'static str, std::os::fd::RawFd, Arc<dyn IoHandler>);

/// Creates the enabled sources, registers them by name and returns the ones that
/// need a poll entry.
fn build_sources(config: &ZenwayConfig, main_loop: &MainLoop, sources: &mut Sources) -> Result<Vec<Registration>> {
    let mut handlers: Vec<Registration> = Vec::new();

    if config.power.enabled {
        let power = PowerSource::new(&config.power, main_loop.wakeup_handle()).context("Failed to set up power source")?;
        sources.register("power", power.clone() as Arc<dyn Source>);
        handlers.push(("power", power.as_raw_fd(), power as Arc<dyn IoHandler>));
    }

    if config.clock.enabled {
        let now = LocalTime::now();
        let date = DateSource::new(&now);
        let time = TimeSource::new(date.clone()).context("Failed to set up clock")?;
        sources.register("date", date as Arc<dyn Source>);
        sources.register("time", time.clone() as Arc<dyn Source>);
        handlers.push(("time", time.as_raw_fd(), time as Arc<dyn IoHandler>));
    }

    if config.network.enabled {
        let network =
            NetworkSource::new(&config.network, main_loop.wakeup_handle()).context("Failed to set up network source")?;
        sources.register("networks", network.clone() as Arc<dyn Source>);
        handlers.push(("networks", network.as_raw_fd(), network as Arc<dyn IoHandler>));
    }

    Ok(handlers)
}
