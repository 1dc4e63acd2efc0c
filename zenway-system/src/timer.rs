//! A `timerfd` that sources register with the main loop.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// Monotonic, non-blocking timer file descriptor.
///
/// The fd becomes readable when the timer expires; [`TimerFd::read_expirations`]
/// consumes the expirations.
#[derive(Debug)]
pub struct TimerFd {
    file: File,
}

impl TimerFd {
    pub fn new() -> io::Result<Self> {
        let raw = unsafe {
            libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_NONBLOCK | libc::TFD_CLOEXEC)
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `raw` is a freshly created descriptor that nothing else owns.
        let file = File::from(unsafe { OwnedFd::from_raw_fd(raw) });
        Ok(Self { file })
    }

    /// Arms the timer: first expiry after `initial`, then every `interval`.
    ///
    /// A zero `initial` would disarm the timer and is bumped to one nanosecond. A zero
    /// `interval` makes the timer fire once.
    pub fn set_interval(&self, initial: Duration, interval: Duration) -> io::Result<()> {
        let initial = if initial.is_zero() {
            Duration::from_nanos(1)
        } else {
            initial
        };
        let spec = libc::itimerspec {
            it_interval: to_timespec(interval),
            it_value: to_timespec(initial),
        };
        let result = unsafe {
            libc::timerfd_settime(self.file.as_raw_fd(), 0, &spec, std::ptr::null_mut())
        };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Returns the number of expirations since the last read, or `None` if the timer
    /// has not expired.
    pub fn read_expirations(&self) -> io::Result<Option<u64>> {
        let mut buf = [0u8; 8];
        match (&self.file).read(&mut buf) {
            Ok(8) => Ok(Some(u64::from_ne_bytes(buf))),
            Ok(n) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short timerfd read of {} bytes", n),
            )),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl AsRawFd for TimerFd {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

fn to_timespec(duration: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    }
}
