//! Audio sink state pushed from a vendor callback thread.
//!
//! The audio server client runs its own thread. It talks to the overlay through an
//! [`AudioUpdater`], which stores the new state in the source and wakes the main loop
//! up. Everything else happens on the reactor thread.
//!
//! The `zenway` binary ships no audio server client, so it never registers this
//! source. An embedder that links one registers the source as `"audio"` and hands the
//! updater to the client thread.

use super::{Source, SourceFlags};
use crate::main_loop::WakeupHandle;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioState {
    pub muted: bool,
    /// Average volume over all channels, in percent.
    pub volume: f32,
    /// "speaker", "headphones", "tv" or "unknown".
    pub port: String,
}

#[derive(Debug, Default)]
pub struct AudioSource {
    flags: SourceFlags,
    state: Mutex<AudioState>,
}

impl AudioSource {
    /// Creates the source and the updater to hand to the callback thread.
    pub fn new(wakeup: WakeupHandle) -> (Arc<Self>, AudioUpdater) {
        let source = Arc::new(Self::default());
        let updater = AudioUpdater {
            source: Arc::clone(&source),
            wakeup,
        };
        (source, updater)
    }

    pub fn current(&self) -> AudioState {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Source for AudioSource {
    fn flags(&self) -> &SourceFlags {
        &self.flags
    }

    fn state(&self) -> Value {
        serde_json::to_value(self.current()).unwrap_or_default()
    }
}

/// The only handle a callback thread gets: it can change the audio state and nothing
/// else.
#[derive(Debug, Clone)]
pub struct AudioUpdater {
    source: Arc<AudioSource>,
    wakeup: WakeupHandle,
}

impl AudioUpdater {
    /// Stores `state` and wakes the loop up if it differs from the current one.
    pub fn update(&self, state: AudioState) -> bool {
        {
            let mut current = self.source.state.lock().unwrap_or_else(|p| p.into_inner());
            if *current == state {
                return false;
            }
            tracing::info!(
                "Audio sink changed, mute:{}, volume:{}, port:{}",
                state.muted,
                state.volume,
                state.port
            );
            *current = state;
        }
        self.source.flags.mark_changed();
        self.wakeup.wakeup();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_loop::{MainLoop, NotificationHandler};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct Changes(usize);

    impl NotificationHandler for Changes {
        fn on_changed(&mut self) {
            self.0 += 1;
        }
        fn on_alerted(&mut self) {}
    }

    #[test]
    fn test_update_from_thread_wakes_loop() {
        let mut main_loop = MainLoop::new().unwrap();
        let changes = Rc::new(RefCell::new(Changes::default()));
        main_loop.register_notification_handler(changes.clone());
        let (source, updater) = AudioSource::new(main_loop.wakeup_handle());
        source.set_drawn();
        source.flags().set_published();

        let worker = std::thread::spawn(move || {
            updater.update(AudioState {
                muted: true,
                volume: 40.0,
                port: "headphones".to_string(),
            })
        });
        assert!(worker.join().unwrap());

        assert!(main_loop.dispatch(Some(Duration::from_secs(1))).unwrap());
        assert_eq!(changes.borrow().0, 1);
        assert!(source.current().muted);
        assert!(source.flags().is_dirty());
    }

    #[test]
    fn test_same_state_is_ignored() {
        let main_loop = MainLoop::new().unwrap();
        let (source, updater) = AudioSource::new(main_loop.wakeup_handle());
        let state = AudioState {
            muted: false,
            volume: 75.0,
            port: "speaker".to_string(),
        };
        assert!(updater.update(state.clone()));
        source.set_drawn();
        source.flags().set_published();
        assert!(!updater.update(state));
        assert!(!source.flags().is_dirty());
    }
}
