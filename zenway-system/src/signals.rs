//! POSIX signals as a main loop handler.
//!
//! `SIGUSR1` shows the panels, `SIGUSR2` hides them, `SIGINT` and `SIGTERM` stop the
//! loop. The async-signal-safe part only flips a per-signal flag and writes a byte to
//! a self-pipe; the pipe's read end is what the main loop polls.

use crate::error::SystemError;
use crate::main_loop::{IoHandler, WakeupHandle};
use crate::manager::ManagerControl;
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::SigId;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const HANDLED: [libc::c_int; 4] = [SIGUSR1, SIGUSR2, SIGINT, SIGTERM];

pub struct SignalSource {
    pipe: UnixStream,
    show: Arc<AtomicBool>,
    hide: Arc<AtomicBool>,
    terminate: Arc<AtomicBool>,
    ids: Vec<SigId>,
    control: ManagerControl,
    wakeup: WakeupHandle,
}

impl SignalSource {
    /// Installs the signal handlers. They are removed again when the source is dropped.
    pub fn new(control: ManagerControl, wakeup: WakeupHandle) -> Result<Arc<Self>, SystemError> {
        let (read, write) = UnixStream::pair()?;
        read.set_nonblocking(true)?;
        write.set_nonblocking(true)?;

        let show = Arc::new(AtomicBool::new(false));
        let hide = Arc::new(AtomicBool::new(false));
        let terminate = Arc::new(AtomicBool::new(false));

        let mut ids = Vec::with_capacity(HANDLED.len() * 2);
        for signal in HANDLED {
            let flag = match signal {
                SIGUSR1 => &show,
                SIGUSR2 => &hide,
                _ => &terminate,
            };
            // The flag is set before the pipe is written, so a wakeup always finds it.
            ids.push(signal_hook::flag::register(signal, Arc::clone(flag))?);
            ids.push(signal_hook::low_level::pipe::register(signal, write.try_clone()?)?);
        }
        tracing::debug!("Signal handlers installed on fd {}", read.as_raw_fd());

        Ok(Arc::new(Self {
            pipe: read,
            show,
            hide,
            terminate,
            ids,
            control,
            wakeup,
        }))
    }

    fn drain(&self) {
        let mut buf = [0u8; 32];
        loop {
            match (&self.pipe).read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Failed to drain signal pipe: {}", e);
                    break;
                }
            }
        }
    }
}

impl IoHandler for SignalSource {
    fn on_read(&self) -> bool {
        self.drain();
        if self.terminate.swap(false, Ordering::AcqRel) {
            tracing::info!("Termination signal received, stopping");
            self.wakeup.stop();
            return false;
        }

        let show = self.show.swap(false, Ordering::AcqRel);
        let hide = self.hide.swap(false, Ordering::AcqRel);
        match (show, hide) {
            // Both arrived in the same batch; their order is lost, a hide is safer.
            (_, true) => {
                tracing::info!("SIGUSR2 received, hiding panels");
                self.control.request_hide();
                true
            }
            (true, false) => {
                tracing::info!("SIGUSR1 received, showing panels");
                self.control.request_show();
                true
            }
            (false, false) => false,
        }
    }
}

impl AsRawFd for SignalSource {
    fn as_raw_fd(&self) -> RawFd {
        self.pipe.as_raw_fd()
    }
}

impl Drop for SignalSource {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}
