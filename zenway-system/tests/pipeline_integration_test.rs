// zenway-system/tests/pipeline_integration_test.rs
//
// Manager, outputs and buffer pool wired together behind the main loop.

use anyhow::Result;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zenway_buffer_manager::{Buffer, BufferHandle, BufferPool};
use zenway_system::error::RenderError;
use zenway_system::main_loop::MainLoop;
use zenway_system::manager::Manager;
use zenway_system::output::{FillPainter, Output, Outputs, Panel, PanelSurface};
use zenway_system::sources::{Source, SourceFlags, Sources};

const WAIT: Option<Duration> = Some(Duration::from_secs(1));

#[derive(Default)]
struct TestSource {
    flags: SourceFlags,
    value: Mutex<Value>,
}

impl TestSource {
    fn set(&self, value: Value) {
        *self.value.lock().unwrap() = value;
        self.flags.mark_changed();
    }
}

impl Source for TestSource {
    fn flags(&self) -> &SourceFlags {
        &self.flags
    }

    fn state(&self) -> Value {
        self.value.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct SurfaceLog {
    commits: usize,
    hides: usize,
}

/// Presents instantly, or refuses every commit when `broken`.
struct TestSurface {
    log: Rc<RefCell<SurfaceLog>>,
    broken: bool,
}

impl PanelSurface for TestSurface {
    fn commit(&mut self, _handle: &BufferHandle, buffer: Arc<Buffer>) -> Result<(), RenderError> {
        if self.broken {
            return Err(RenderError::Surface {
                panel: "test".to_string(),
                message: "output unplugged".to_string(),
            });
        }
        self.log.borrow_mut().commits += 1;
        buffer.release();
        Ok(())
    }

    fn hide(&mut self) {
        self.log.borrow_mut().hides += 1;
    }
}

fn panel(name: &str, sources: &[&str], log: &Rc<RefCell<SurfaceLog>>, broken: bool) -> Panel {
    Panel::new(
        name,
        sources.iter().map(|s| s.to_string()).collect(),
        Box::new(FillPainter::new(0xff20_2020)),
        Box::new(TestSurface {
            log: Rc::clone(log),
            broken,
        }),
    )
}

struct Rig {
    main_loop: MainLoop,
    manager: Rc<RefCell<Manager>>,
    power: Arc<TestSource>,
    time: Arc<TestSource>,
    battery_panel: Rc<RefCell<SurfaceLog>>,
    clock_panel: Rc<RefCell<SurfaceLog>>,
    alert_panel: Rc<RefCell<SurfaceLog>>,
}

/// One healthy output with a battery and a clock panel, optionally a broken second
/// output carrying the same panels.
fn rig(with_broken_output: bool) -> Result<Rig> {
    let battery_panel = Rc::new(RefCell::new(SurfaceLog::default()));
    let clock_panel = Rc::new(RefCell::new(SurfaceLog::default()));
    let alert_panel = Rc::new(RefCell::new(SurfaceLog::default()));
    let broken = Rc::new(RefCell::new(SurfaceLog::default()));

    let mut outputs = vec![Output::new(
        "eDP-1",
        vec![
            panel("battery", &["power"], &battery_panel, false),
            panel("clock", &["time"], &clock_panel, false),
        ],
        Some(panel("alert", &["power"], &alert_panel, false)),
    )];
    if with_broken_output {
        outputs.push(Output::new(
            "HDMI-A-1",
            vec![
                panel("battery", &["power"], &broken, true),
                panel("clock", &["time"], &broken, true),
            ],
            None,
        ));
    }
    let pool = BufferPool::new(2, 64, 8)?;
    let renderer = Outputs::new(pool, outputs);

    let mut sources = Sources::default();
    let power = Arc::new(TestSource::default());
    let time = Arc::new(TestSource::default());
    sources.register("power", power.clone());
    sources.register("time", time.clone());

    let mut main_loop = MainLoop::new()?;
    let manager = Rc::new(RefCell::new(Manager::new(sources, Box::new(renderer))));
    main_loop.register_notification_handler(manager.clone());

    Ok(Rig {
        main_loop,
        manager,
        power,
        time,
        battery_panel,
        clock_panel,
        alert_panel,
    })
}

#[test]
fn test_only_panels_with_dirty_sources_are_redrawn() -> Result<()> {
    let mut rig = rig(false)?;
    rig.manager.borrow_mut().show();
    rig.main_loop.wakeup_handle().wakeup();
    assert!(rig.main_loop.dispatch(WAIT)?);
    assert_eq!(rig.battery_panel.borrow().commits, 1);
    assert_eq!(rig.clock_panel.borrow().commits, 1);

    rig.power.set(json!({"capacity": 55}));
    rig.main_loop.wakeup_handle().wakeup();
    assert!(rig.main_loop.dispatch(WAIT)?);
    assert_eq!(rig.battery_panel.borrow().commits, 2);
    assert_eq!(rig.clock_panel.borrow().commits, 1);
    assert!(rig.power.is_drawn());

    let manager = rig.manager.borrow();
    assert_eq!(manager.sources().script().value("power"), Some(&json!({"capacity": 55})));
    Ok(())
}

#[test]
fn test_failing_output_does_not_block_others_and_keeps_sources_dirty() -> Result<()> {
    let mut rig = rig(true)?;
    rig.manager.borrow_mut().show();
    rig.main_loop.wakeup_handle().wakeup();
    assert!(rig.main_loop.dispatch(WAIT)?);

    // The healthy output was drawn regardless.
    assert_eq!(rig.battery_panel.borrow().commits, 1);
    assert_eq!(rig.clock_panel.borrow().commits, 1);
    // Nothing is acknowledged, so the next change retries everything.
    assert!(!rig.power.is_drawn());
    assert!(!rig.time.is_drawn());
    // Publishing does not depend on rendering.
    assert!(rig.power.is_published());
    Ok(())
}

#[test]
fn test_alert_while_hidden_draws_only_the_popup() -> Result<()> {
    let mut rig = rig(false)?;
    rig.power.set(json!({"capacity": 4, "is_alerted": true}));
    rig.main_loop.wakeup_handle().alert_and_wakeup();
    assert!(rig.main_loop.dispatch(WAIT)?);

    assert!(rig.manager.borrow().is_alerted());
    assert!(!rig.manager.borrow().is_visible());
    assert_eq!(rig.alert_panel.borrow().commits, 1);
    assert_eq!(rig.battery_panel.borrow().commits, 0);
    assert_eq!(rig.clock_panel.borrow().commits, 0);

    // Showing acknowledges the alert and takes the popup down.
    rig.manager.borrow_mut().show();
    rig.main_loop.wakeup_handle().wakeup();
    assert!(rig.main_loop.dispatch(WAIT)?);
    assert!(!rig.manager.borrow().is_alerted());
    assert_eq!(rig.alert_panel.borrow().hides, 1);
    assert_eq!(rig.alert_panel.borrow().commits, 1);
    assert_eq!(rig.battery_panel.borrow().commits, 1);
    Ok(())
}

#[test]
fn test_hide_takes_panels_down() -> Result<()> {
    let mut rig = rig(false)?;
    rig.manager.borrow_mut().show();
    rig.main_loop.wakeup_handle().wakeup();
    rig.main_loop.dispatch(WAIT)?;

    rig.manager.borrow_mut().hide();
    rig.time.set(json!({"hour": 9, "minute": 30}));
    rig.main_loop.wakeup_handle().wakeup();
    assert!(rig.main_loop.dispatch(WAIT)?);
    assert_eq!(rig.battery_panel.borrow().hides, 1);
    assert_eq!(rig.clock_panel.borrow().hides, 1);
    assert_eq!(rig.clock_panel.borrow().commits, 1);
    // Still published while hidden.
    assert_eq!(
        rig.manager.borrow().sources().script().value("time"),
        Some(&json!({"hour": 9, "minute": 30}))
    );
    Ok(())
}
