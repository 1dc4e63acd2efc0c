//! The reactor that drives every redraw.
//!
//! [`MainLoop`] multiplexes readable file descriptors with a `polling::Poller` in
//! level-triggered mode. Each registered fd belongs to an [`IoHandler`] whose
//! [`IoHandler::on_read`] reports whether something changed. Cross-thread producers
//! never touch the loop directly: they hold a [`WakeupHandle`] that bumps an eventfd
//! counter, which is always the first poll entry.
//!
//! One call to [`MainLoop::dispatch`] is one iteration:
//!
//! 1. wait for readiness;
//! 2. visit ready entries in registration order, draining the wakeup channel and
//!    calling `on_read()` for everything else, OR-ing the results;
//! 3. notify the [`NotificationHandler`] at most once: `on_alerted()` if an alert was
//!    raised since the last iteration, otherwise `on_changed()` if the batch was
//!    dirty.
//!
//! Any number of wakeups and dirty handlers between two polls therefore collapse into
//! a single notification.

use crate::error::SystemError;
use polling::{Event, Events, PollMode, Poller};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Something that owns a readable file descriptor registered with the loop.
pub trait IoHandler {
    /// Called on the reactor thread when the fd is readable.
    ///
    /// Returns `true` when the read changed state that may need a redraw. Failures are
    /// handled here and reported as `false`.
    fn on_read(&self) -> bool;
}

/// The single consumer of per-iteration change notifications.
pub trait NotificationHandler {
    fn on_changed(&mut self);
    fn on_alerted(&mut self);
}

struct WakeupChannel {
    eventfd: Mutex<File>,
    fd: RawFd,
    alerted: AtomicBool,
    stop: AtomicBool,
}

impl WakeupChannel {
    fn new() -> io::Result<Self> {
        let raw = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `raw` is a freshly created descriptor that nothing else owns.
        let file = File::from(unsafe { OwnedFd::from_raw_fd(raw) });
        Ok(Self {
            eventfd: Mutex::new(file),
            fd: raw,
            alerted: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        })
    }

    fn signal(&self) {
        let mut eventfd = self.eventfd.lock().unwrap_or_else(|p| p.into_inner());
        match eventfd.write(&1u64.to_ne_bytes()) {
            Ok(_) => {}
            // The counter is saturated, so a wakeup is already pending.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => tracing::error!("Failed to write wakeup event: {}", e),
        }
    }

    fn drain(&self) {
        let mut eventfd = self.eventfd.lock().unwrap_or_else(|p| p.into_inner());
        let mut counter = [0u8; 8];
        loop {
            match eventfd.read(&mut counter) {
                Ok(_) => tracing::trace!("Popped {} internal events", u64::from_ne_bytes(counter)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!("Failed to drain wakeup events: {}", e);
                    break;
                }
            }
        }
    }
}

/// Thread-safe entry point into a [`MainLoop`].
///
/// Cloned into timers, callback threads and signal handlers. These three methods
/// are the only operations other threads may perform on the reactor.
#[derive(Clone)]
pub struct WakeupHandle {
    channel: Arc<WakeupChannel>,
}

impl WakeupHandle {
    /// Requests one more iteration that is considered dirty. Never blocks.
    pub fn wakeup(&self) {
        self.channel.signal();
    }

    /// Raises the alert flag, then wakes the loop up.
    pub fn alert_and_wakeup(&self) {
        self.channel.alerted.store(true, Ordering::Release);
        self.channel.signal();
    }

    /// Makes [`MainLoop::run`] return after the iteration in progress.
    pub fn stop(&self) {
        self.channel.stop.store(true, Ordering::Release);
        self.channel.signal();
    }

    pub fn is_stopped(&self) -> bool {
        self.channel.stop.load(Ordering::Acquire)
    }
}

impl fmt::Debug for WakeupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeupHandle")
            .field("fd", &self.channel.fd)
            .field("alerted", &self.channel.alerted.load(Ordering::Relaxed))
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

struct PollEntry {
    fd: RawFd,
    name: String,
}

/// Single-threaded reactor. See the module documentation.
pub struct MainLoop {
    poller: Poller,
    events: Events,
    wakeup: Arc<WakeupChannel>,
    entries: Vec<PollEntry>,
    handlers: HashMap<RawFd, Arc<dyn IoHandler>>,
    notification_handler: Option<Rc<RefCell<dyn NotificationHandler>>>,
}

impl MainLoop {
    /// Creates the poller and the wakeup channel.
    pub fn new() -> Result<Self, SystemError> {
        let poller = Poller::new()?;
        let wakeup = Arc::new(WakeupChannel::new()?);
        // SAFETY: the eventfd is owned by `wakeup`, which outlives the registration
        // (it is deleted from the poller in `Drop`).
        unsafe { poller.add_with_mode(wakeup.fd, Event::readable(key(wakeup.fd)), PollMode::Level) }
            .map_err(|source| SystemError::Registration {
                name: "wakeup".to_string(),
                source,
            })?;
        tracing::debug!("Main loop created, wakeup channel on fd {}", wakeup.fd);

        Ok(Self {
            poller,
            events: Events::new(),
            entries: vec![PollEntry {
                fd: wakeup.fd,
                name: "wakeup".to_string(),
            }],
            wakeup,
            handlers: HashMap::new(),
            notification_handler: None,
        })
    }

    /// Registers `handler` for read readiness on `fd`.
    ///
    /// The handler must keep `fd` open for as long as it stays registered. Registering
    /// an fd that is already registered is logged and ignored.
    pub fn register_io_handler(
        &mut self,
        fd: RawFd,
        name: &str,
        handler: Arc<dyn IoHandler>,
    ) -> Result<(), SystemError> {
        if self.entries.iter().any(|entry| entry.fd == fd) {
            tracing::error!("Fd {} is already registered, ignoring {}", fd, name);
            return Ok(());
        }
        // SAFETY: the handler owns `fd` and is kept alive in `self.handlers` until the
        // fd is deleted from the poller.
        unsafe { self.poller.add_with_mode(fd, Event::readable(key(fd)), PollMode::Level) }
            .map_err(|source| SystemError::Registration {
                name: name.to_string(),
                source,
            })?;
        self.handlers.insert(fd, handler);
        self.entries.push(PollEntry {
            fd,
            name: name.to_string(),
        });
        tracing::debug!("Registering {} in main loop for fd {}", name, fd);
        Ok(())
    }

    /// Removes `fd` from the poll set and returns its handler.
    pub fn unregister_io_handler(&mut self, fd: RawFd) -> Option<Arc<dyn IoHandler>> {
        let handler = self.handlers.remove(&fd)?;
        if let Some(position) = self.entries.iter().position(|entry| entry.fd == fd) {
            let entry = self.entries.remove(position);
            tracing::debug!("Unregistering {} from main loop (fd {})", entry.name, fd);
        }
        // SAFETY: `fd` is still open, its handler is alive until we return it.
        if let Err(e) = self.poller.delete(unsafe { BorrowedFd::borrow_raw(fd) }) {
            tracing::warn!("Failed to remove fd {} from poller: {}", fd, e);
        }
        Some(handler)
    }

    /// Installs the notification handler. Only one is supported.
    pub fn register_notification_handler(&mut self, handler: Rc<RefCell<dyn NotificationHandler>>) {
        if self.notification_handler.is_some() {
            tracing::error!("A notification handler is already registered, ignoring");
            return;
        }
        self.notification_handler = Some(handler);
    }

    pub fn wakeup_handle(&self) -> WakeupHandle {
        WakeupHandle {
            channel: Arc::clone(&self.wakeup),
        }
    }

    /// Number of registered handlers, not counting the wakeup channel.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Runs one iteration, waiting at most `timeout` (`None` waits forever).
    ///
    /// Returns whether the notification handler was invoked. An interrupted wait is an
    /// empty iteration.
    pub fn dispatch(&mut self, timeout: Option<Duration>) -> Result<bool, SystemError> {
        self.events.clear();
        match self.poller.wait(&mut self.events, timeout) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                tracing::trace!("Poll interrupted");
                return Ok(false);
            }
            Err(e) => return Err(SystemError::Io(e)),
        }

        let ready: HashSet<usize> = self.events.iter().map(|event| event.key).collect();
        if ready.is_empty() {
            tracing::trace!("Timeout in main loop");
            return Ok(false);
        }
        tracing::trace!("{} events in main loop", ready.len());

        let mut any_dirty = false;
        for entry in &self.entries {
            if !ready.contains(&key(entry.fd)) {
                continue;
            }
            if entry.fd == self.wakeup.fd {
                self.wakeup.drain();
                any_dirty = true;
            } else if let Some(handler) = self.handlers.get(&entry.fd) {
                tracing::trace!("Invoking io handler {} for fd {}", entry.name, entry.fd);
                any_dirty = handler.on_read() || any_dirty;
            }
        }

        // The alert stays pending until a handler can take it.
        let Some(handler) = &self.notification_handler else {
            return Ok(false);
        };
        if self.wakeup.alerted.swap(false, Ordering::AcqRel) {
            handler.borrow_mut().on_alerted();
            Ok(true)
        } else if any_dirty {
            handler.borrow_mut().on_changed();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Dispatches until [`WakeupHandle::stop`] is called. A poll error is fatal.
    pub fn run(&mut self) -> Result<(), SystemError> {
        tracing::info!("Entering main loop with {} handlers", self.handlers.len());
        while !self.wakeup.stop.load(Ordering::Acquire) {
            if let Err(e) = self.dispatch(None) {
                tracing::error!("Poll error in main loop: {}", e);
                return Err(e);
            }
        }
        tracing::info!("Main loop stopped");
        Ok(())
    }
}

impl Drop for MainLoop {
    fn drop(&mut self) {
        for entry in &self.entries {
            // SAFETY: every entry's fd is kept open by the channel or its handler, both
            // still alive here.
            let _ = self.poller.delete(unsafe { BorrowedFd::borrow_raw(entry.fd) });
        }
    }
}

fn key(fd: RawFd) -> usize {
    fd as usize
}

impl AsRawFd for WakeupHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.channel.fd
    }
}
