//! Battery and AC state read from the sysfs power supply class.

use super::{Source, SourceFlags};
use crate::error::SystemError;
use crate::main_loop::{IoHandler, WakeupHandle};
use crate::timer::TimerFd;
use serde::Serialize;
use serde_json::Value;
use std::os::fd::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zenway_core::config::PowerConfig;
use zenway_core::utils::fs::read_file_to_string;

const FIRST_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PowerState {
    pub capacity: u8,
    pub is_charging: bool,
    pub is_plugged_in: bool,
    pub is_alerted: bool,
}

/// Polls `<root>/<battery>/{capacity,status}` and `<root>/<ac>/online`.
///
/// The source raises an alert when the battery drops below the configured threshold
/// while discharging with AC unplugged.
pub struct PowerSource {
    flags: SourceFlags,
    timer: TimerFd,
    capacity_path: PathBuf,
    status_path: PathBuf,
    online_path: PathBuf,
    alert_threshold: u8,
    state: Mutex<PowerState>,
    /// Set once a capacity has been read; a machine without battery never alerts.
    battery_seen: AtomicBool,
    wakeup: WakeupHandle,
}

impl PowerSource {
    /// Creates the source, arms its timer and reads the initial state.
    pub fn new(config: &PowerConfig, wakeup: WakeupHandle) -> Result<Arc<Self>, SystemError> {
        let timer = TimerFd::new()?;
        timer.set_interval(FIRST_POLL, config.poll_interval())?;
        let battery = config.sysfs_root.join(&config.battery);
        let source = Arc::new(Self {
            flags: SourceFlags::new(),
            timer,
            capacity_path: battery.join("capacity"),
            status_path: battery.join("status"),
            online_path: config.sysfs_root.join(&config.ac).join("online"),
            alert_threshold: config.alert_threshold,
            state: Mutex::new(PowerState::default()),
            battery_seen: AtomicBool::new(false),
            wakeup,
        });
        source.read_state();
        Ok(source)
    }

    pub fn current(&self) -> PowerState {
        *self.lock_state()
    }

    /// Re-reads sysfs. Returns whether the state changed.
    ///
    /// Attributes that cannot be read or parsed keep their previous value.
    pub fn read_state(&self) -> bool {
        let mut current = self.lock_state();
        let mut state = *current;

        if let Some(capacity) = self.read_attribute(&self.capacity_path, "capacity") {
            match capacity.parse::<u8>() {
                Ok(capacity) => {
                    state.capacity = capacity.min(100);
                    self.battery_seen.store(true, Ordering::Relaxed);
                }
                Err(e) => tracing::warn!("Invalid battery capacity '{}': {}", capacity, e),
            }
        }
        if let Some(status) = self.read_attribute(&self.status_path, "status") {
            state.is_charging = status == "Charging";
        }
        if let Some(online) = self.read_attribute(&self.online_path, "AC") {
            match online.parse::<u8>() {
                Ok(online) => state.is_plugged_in = online != 0,
                Err(e) => tracing::warn!("Invalid AC online value '{}': {}", online, e),
            }
        }
        state.is_alerted = self.battery_seen.load(Ordering::Relaxed)
            && state.capacity < self.alert_threshold
            && !state.is_charging
            && !state.is_plugged_in;

        if state == *current {
            return false;
        }
        tracing::info!(
            "Power status changed, alert {}, capacity {}, charging {}, plugged in {}",
            state.is_alerted,
            state.capacity,
            state.is_charging,
            state.is_plugged_in
        );
        let entering_alert = state.is_alerted && !current.is_alerted;
        *current = state;
        drop(current);

        self.flags.mark_changed();
        if entering_alert {
            tracing::info!("Power source is triggering alert");
            self.wakeup.alert_and_wakeup();
        }
        true
    }

    fn read_attribute(&self, path: &std::path::Path, kind: &str) -> Option<String> {
        match read_file_to_string(path) {
            Ok(content) => Some(content.trim().to_string()),
            Err(e) => {
                tracing::warn!("Power source failed to read {}: {}", kind, e);
                None
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PowerState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl AsRawFd for PowerSource {
    fn as_raw_fd(&self) -> RawFd {
        self.timer.as_raw_fd()
    }
}

impl IoHandler for PowerSource {
    fn on_read(&self) -> bool {
        match self.timer.read_expirations() {
            Ok(Some(_)) => {
                tracing::debug!("Polling power status");
                self.read_state();
                !self.is_published()
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Power timer read failed: {}", e);
                false
            }
        }
    }
}

impl Source for PowerSource {
    fn flags(&self) -> &SourceFlags {
        &self.flags
    }

    fn state(&self) -> Value {
        serde_json::to_value(self.current()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_loop::{MainLoop, NotificationHandler};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        config: PowerConfig,
    }

    impl Fixture {
        fn new(capacity: &str, status: &str, online: &str) -> Self {
            let dir = TempDir::new().unwrap();
            fs::create_dir_all(dir.path().join("BAT0")).unwrap();
            fs::create_dir_all(dir.path().join("AC")).unwrap();
            let fixture = Self {
                config: PowerConfig {
                    sysfs_root: dir.path().to_path_buf(),
                    ..PowerConfig::default()
                },
                dir,
            };
            fixture.write(capacity, status, online);
            fixture
        }

        fn write(&self, capacity: &str, status: &str, online: &str) {
            let root = self.dir.path();
            fs::write(root.join("BAT0/capacity"), format!("{}\n", capacity)).unwrap();
            fs::write(root.join("BAT0/status"), format!("{}\n", status)).unwrap();
            fs::write(root.join("AC/online"), format!("{}\n", online)).unwrap();
        }
    }

    #[derive(Default)]
    struct Alerts(usize);

    impl NotificationHandler for Alerts {
        fn on_changed(&mut self) {}
        fn on_alerted(&mut self) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_reads_initial_state() {
        let fixture = Fixture::new("80", "Discharging", "0");
        let main_loop = MainLoop::new().unwrap();
        let source = PowerSource::new(&fixture.config, main_loop.wakeup_handle()).unwrap();
        assert_eq!(
            source.current(),
            PowerState {
                capacity: 80,
                is_charging: false,
                is_plugged_in: false,
                is_alerted: false,
            }
        );
        assert!(source.flags().is_dirty());
    }

    #[test]
    fn test_change_dirties_and_unchanged_does_not() {
        let fixture = Fixture::new("80", "Charging", "1");
        let main_loop = MainLoop::new().unwrap();
        let source = PowerSource::new(&fixture.config, main_loop.wakeup_handle()).unwrap();
        source.set_drawn();
        source.flags().set_published();

        assert!(!source.read_state());
        assert!(!source.flags().is_dirty());

        fixture.write("81", "Charging", "1");
        assert!(source.read_state());
        assert!(!source.is_drawn());
        assert!(!source.is_published());
    }

    #[test]
    fn test_low_battery_raises_alert_once() {
        let fixture = Fixture::new("50", "Discharging", "0");
        let mut main_loop = MainLoop::new().unwrap();
        let alerts = Rc::new(RefCell::new(Alerts::default()));
        main_loop.register_notification_handler(alerts.clone());
        let source = PowerSource::new(&fixture.config, main_loop.wakeup_handle()).unwrap();

        fixture.write("20", "Discharging", "0");
        assert!(source.read_state());
        assert!(source.current().is_alerted);
        fixture.write("19", "Discharging", "0");
        assert!(source.read_state());

        main_loop.dispatch(Some(Duration::from_millis(50))).unwrap();
        assert_eq!(alerts.borrow().0, 1);
    }

    #[test]
    fn test_missing_battery_never_alerts() {
        let dir = TempDir::new().unwrap();
        let config = PowerConfig {
            sysfs_root: dir.path().to_path_buf(),
            ..PowerConfig::default()
        };
        let main_loop = MainLoop::new().unwrap();
        let source = PowerSource::new(&config, main_loop.wakeup_handle()).unwrap();
        assert_eq!(source.current(), PowerState::default());
    }

    #[test]
    fn test_no_alert_while_plugged_in() {
        let fixture = Fixture::new("10", "Discharging", "1");
        let main_loop = MainLoop::new().unwrap();
        let source = PowerSource::new(&fixture.config, main_loop.wakeup_handle()).unwrap();
        assert!(!source.current().is_alerted);
    }

    #[test]
    fn test_read_failure_retains_state() {
        let fixture = Fixture::new("70", "Discharging", "0");
        let main_loop = MainLoop::new().unwrap();
        let source = PowerSource::new(&fixture.config, main_loop.wakeup_handle()).unwrap();
        source.set_drawn();
        source.flags().set_published();

        fs::remove_file(fixture.dir.path().join("BAT0/capacity")).unwrap();
        fs::write(fixture.dir.path().join("AC/online"), "garbage").unwrap();
        assert!(!source.read_state());
        assert_eq!(source.current().capacity, 70);
        assert!(!source.flags().is_dirty());
    }

    #[test]
    fn test_publishes_json_state() {
        let fixture = Fixture::new("42", "Charging", "1");
        let main_loop = MainLoop::new().unwrap();
        let source = PowerSource::new(&fixture.config, main_loop.wakeup_handle()).unwrap();
        assert_eq!(
            source.state(),
            serde_json::json!({
                "capacity": 42,
                "is_charging": true,
                "is_plugged_in": true,
                "is_alerted": false,
            })
        );
    }
}
