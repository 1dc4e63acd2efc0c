//! Wall clock sources: `time` ticks every minute, `date` follows along.

use super::{Source, SourceFlags};
use crate::error::SystemError;
use crate::main_loop::IoHandler;
use crate::timer::TimerFd;
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use serde::Serialize;
use serde_json::Value;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

/// Broken down local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub year: i32,
    /// 1..=12
    pub month: u8,
    pub day: u8,
    /// 0 is Sunday.
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl<Tz: TimeZone> From<&DateTime<Tz>> for LocalTime {
    fn from(at: &DateTime<Tz>) -> Self {
        Self {
            year: at.year(),
            month: at.month() as u8,
            day: at.day() as u8,
            weekday: at.weekday().num_days_from_sunday() as u8,
            hour: at.hour() as u8,
            minute: at.minute() as u8,
            // chrono reports a leap second as 59 with an oversized fraction.
            second: if at.nanosecond() >= 1_000_000_000 { 60 } else { at.second() as u8 },
        }
    }
}

impl LocalTime {
    pub fn now() -> Self {
        Self::from(&Local::now())
    }

    /// Time left until the next full minute. Leap seconds count as the last second.
    pub fn until_next_minute(&self) -> Duration {
        let elapsed = u64::from(self.second.min(59));
        Duration::from_secs(60 - elapsed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeState {
    pub hour: u8,
    pub minute: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateState {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub weekday: u8,
}

impl From<&LocalTime> for TimeState {
    fn from(local: &LocalTime) -> Self {
        Self {
            hour: local.hour,
            minute: local.minute,
        }
    }
}

impl From<&LocalTime> for DateState {
    fn from(local: &LocalTime) -> Self {
        Self {
            year: local.year,
            month: local.month,
            day: local.day,
            weekday: local.weekday,
        }
    }
}

/// The calendar date. Has no timer of its own; [`TimeSource`] evaluates it on every
/// tick.
#[derive(Debug, Default)]
pub struct DateSource {
    flags: SourceFlags,
    state: Mutex<DateState>,
}

impl DateSource {
    pub fn new(now: &LocalTime) -> Arc<Self> {
        Arc::new(Self {
            flags: SourceFlags::new(),
            state: Mutex::new(DateState::from(now)),
        })
    }

    pub fn current(&self) -> DateState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Updates the date. Returns whether the calendar day changed.
    pub fn evaluate(&self, now: &LocalTime) -> bool {
        let date = DateState::from(now);
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if *state == date {
            return false;
        }
        tracing::info!("Date changed to {}-{:02}-{:02}", date.year, date.month, date.day);
        *state = date;
        self.flags.mark_changed();
        true
    }
}

impl Source for DateSource {
    fn flags(&self) -> &SourceFlags {
        &self.flags
    }

    fn state(&self) -> Value {
        serde_json::to_value(self.current()).unwrap_or_default()
    }
}

/// Hours and minutes, refreshed on a timer aligned to minute boundaries.
pub struct TimeSource {
    flags: SourceFlags,
    timer: TimerFd,
    state: Mutex<TimeState>,
    date: Arc<DateSource>,
}

impl TimeSource {
    pub fn new(date: Arc<DateSource>) -> Result<Arc<Self>, SystemError> {
        let now = LocalTime::now();
        let timer = TimerFd::new()?;
        let initial = now.until_next_minute();
        tracing::debug!("Setting initial clock timer to {:?}", initial);
        timer.set_interval(initial, MINUTE)?;
        date.evaluate(&now);
        Ok(Arc::new(Self {
            flags: SourceFlags::new(),
            timer,
            state: Mutex::new(TimeState::from(&now)),
            date,
        }))
    }

    pub fn current(&self) -> TimeState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Applies one tick at `now`. Returns whether time or date changed.
    pub fn tick(&self, now: &LocalTime) -> bool {
        let time = TimeState::from(now);
        let time_changed = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            let changed = *state != time;
            *state = time;
            changed
        };
        if time_changed {
            self.flags.mark_changed();
        }
        let date_changed = self.date.evaluate(now);
        time_changed || date_changed
    }
}

impl AsRawFd for TimeSource {
    fn as_raw_fd(&self) -> RawFd {
        self.timer.as_raw_fd()
    }
}

impl IoHandler for TimeSource {
    fn on_read(&self) -> bool {
        match self.timer.read_expirations() {
            Ok(Some(_)) => self.tick(&LocalTime::now()),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Clock timer read failed: {}", e);
                false
            }
        }
    }
}

impl Source for TimeSource {
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
    use pretty_assertions::assert_eq;

    fn at(day: u8, hour: u8, minute: u8) -> LocalTime {
        LocalTime {
            year: 2024,
            month: 3,
            day,
            weekday: day % 7,
            hour,
            minute,
            second: 0,
        }
    }

    #[test]
    fn test_until_next_minute() {
        let mut local = at(1, 12, 0);
        assert_eq!(local.until_next_minute(), Duration::from_secs(60));
        local.second = 45;
        assert_eq!(local.until_next_minute(), Duration::from_secs(15));
        local.second = 60;
        assert_eq!(local.until_next_minute(), Duration::from_secs(1));
    }

    #[test]
    fn test_local_time_now_is_sane() {
        let now = LocalTime::now();
        assert!((1..=12).contains(&now.month));
        assert!(now.hour < 24 && now.minute < 60);
    }

    #[test]
    fn test_local_time_from_datetime_counts_weekdays_from_sunday() {
        let offset = chrono::FixedOffset::east_opt(2 * 3600).unwrap();
        let sunday = offset.with_ymd_and_hms(2024, 3, 3, 23, 59, 30).unwrap();
        assert_eq!(
            LocalTime::from(&sunday),
            LocalTime {
                year: 2024,
                month: 3,
                day: 3,
                weekday: 0,
                hour: 23,
                minute: 59,
                second: 30,
            }
        );
        let saturday = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(LocalTime::from(&saturday).weekday, 6);
        assert_eq!(LocalTime::from(&saturday).until_next_minute(), Duration::from_secs(60));
    }

    #[test]
    fn test_tick_changes_time_but_not_date() {
        let date = DateSource::new(&at(1, 12, 0));
        let time = TimeSource::new(date.clone()).unwrap();
        date.set_drawn();
        date.flags().set_published();
        // Start from a known time regardless of the real clock.
        time.tick(&at(1, 12, 0));
        date.evaluate(&at(1, 12, 0));
        date.set_drawn();
        date.flags().set_published();
        time.set_drawn();
        time.flags().set_published();

        assert!(time.tick(&at(1, 12, 1)));
        assert_eq!(time.current(), TimeState { hour: 12, minute: 1 });
        assert!(!time.is_drawn());
        assert!(date.is_drawn());
    }

    #[test]
    fn test_midnight_changes_date() {
        let date = DateSource::new(&at(1, 23, 59));
        date.set_drawn();
        date.flags().set_published();
        assert!(!date.evaluate(&at(1, 23, 59)));
        assert!(date.evaluate(&at(2, 0, 0)));
        assert_eq!(date.current().day, 2);
        assert!(!date.is_drawn());
        assert_eq!(
            date.state(),
            serde_json::json!({"year": 2024, "month": 3, "day": 2, "weekday": 2})
        );
    }
}
