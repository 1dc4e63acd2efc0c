//! Network interface link state from `/sys/class/net/*/operstate`, with the IPv4
//! address of each interface from `getifaddrs`.

use super::{Source, SourceFlags};
use crate::error::SystemError;
use crate::main_loop::{IoHandler, WakeupHandle};
use crate::timer::TimerFd;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddrV4;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zenway_core::config::NetworkConfig;
use zenway_core::utils::fs::read_file_to_string;

const FIRST_POLL: Duration = Duration::from_secs(1);
const LOOPBACK: &str = "lo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInterface {
    pub name: String,
    pub is_up: bool,
    /// Set when the link went down or vanished after having been up; cleared when it
    /// comes back.
    pub is_alerted: bool,
    /// IPv4 address, empty when the interface has none.
    pub address: String,
}

pub struct NetworkSource {
    flags: SourceFlags,
    timer: TimerFd,
    sysfs_root: PathBuf,
    interfaces: Mutex<Vec<NetworkInterface>>,
    wakeup: WakeupHandle,
}

impl NetworkSource {
    pub fn new(config: &NetworkConfig, wakeup: WakeupHandle) -> Result<Arc<Self>, SystemError> {
        let timer = TimerFd::new()?;
        timer.set_interval(FIRST_POLL, config.poll_interval())?;
        let source = Arc::new(Self {
            flags: SourceFlags::new(),
            timer,
            sysfs_root: config.sysfs_root.clone(),
            interfaces: Mutex::new(Vec::new()),
            wakeup,
        });
        source.read_state();
        Ok(source)
    }

    pub fn current(&self) -> Vec<NetworkInterface> {
        self.interfaces.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Re-reads every interface. Returns whether anything changed.
    pub fn read_state(&self) -> bool {
        let names = match list_interfaces(&self.sysfs_root) {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!("Failed to list network interfaces in {:?}: {}", self.sysfs_root, e);
                return false;
            }
        };

        let addresses = interface_addresses();
        let mut current = self.interfaces.lock().unwrap_or_else(|p| p.into_inner());
        let mut raise_alert = false;
        let mut interfaces = Vec::with_capacity(names.len());
        for name in names {
            let previous = current.iter().find(|i| i.name == name);
            let path = self.sysfs_root.join(&name).join("operstate");
            let is_up = match read_file_to_string(&path) {
                Ok(operstate) => operstate.trim() == "up",
                Err(e) => {
                    tracing::warn!("Failed to read state of {}: {}", name, e);
                    match previous {
                        Some(previous) => {
                            interfaces.push(previous.clone());
                            continue;
                        }
                        None => continue,
                    }
                }
            };
            let was_up = previous.map(|p| p.is_up).unwrap_or(false);
            let was_alerted = previous.map(|p| p.is_alerted).unwrap_or(false);
            let is_alerted = !is_up && (was_alerted || was_up);
            if is_alerted && !was_alerted {
                tracing::info!("Network interface {} went down", name);
                raise_alert = true;
            }
            let address = addresses.get(&name).cloned().unwrap_or_default();
            interfaces.push(NetworkInterface {
                name,
                is_up,
                is_alerted,
                address,
            });
        }

        // Interfaces that were up and vanished stay listed as down until they return.
        for previous in current.iter() {
            if !(previous.is_up || previous.is_alerted) || interfaces.iter().any(|i| i.name == previous.name) {
                continue;
            }
            if !previous.is_alerted {
                tracing::info!("Network interface {} disappeared", previous.name);
                raise_alert = true;
            }
            interfaces.push(NetworkInterface {
                is_up: false,
                is_alerted: true,
                ..previous.clone()
            });
        }
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));

        if interfaces == *current {
            return false;
        }
        tracing::info!("Network status changed: {:?}", interfaces);
        *current = interfaces;
        drop(current);
        self.flags.mark_changed();
        if raise_alert {
            self.wakeup.alert_and_wakeup();
        }
        true
    }
}

fn list_interfaces(root: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name != LOOPBACK {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// First IPv4 address of every interface that has one.
fn interface_addresses() -> HashMap<String, String> {
    let mut addresses = HashMap::new();
    let entries = match nix::ifaddrs::getifaddrs() {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to query interface addresses: {}", e);
            return addresses;
        }
    };
    for entry in entries {
        let Some(ipv4) = entry.address.as_ref().and_then(|a| a.as_sockaddr_in()) else {
            continue;
        };
        addresses
            .entry(entry.interface_name)
            .or_insert_with(|| SocketAddrV4::from(*ipv4).ip().to_string());
    }
    addresses
}

impl AsRawFd for NetworkSource {
    fn as_raw_fd(&self) -> RawFd {
        self.timer.as_raw_fd()
    }
}

impl IoHandler for NetworkSource {
    fn on_read(&self) -> bool {
        match self.timer.read_expirations() {
            Ok(Some(_)) => {
                tracing::debug!("Polling network status");
                self.read_state();
                !self.is_published()
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Network timer read failed: {}", e);
                false
            }
        }
    }
}

impl Source for NetworkSource {
    fn flags(&self) -> &SourceFlags {
        &self.flags
    }

    fn state(&self) -> Value {
        serde_json::to_value(self.current()).unwrap_or_default()
    }
}
