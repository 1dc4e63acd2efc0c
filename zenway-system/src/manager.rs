//! The orchestrator: turns change notifications into render passes.
//!
//! [`Manager`] is the main loop's single [`NotificationHandler`]. It has two states,
//! hidden and visible, plus an orthogonal alert flag:
//!
//! | state            | on change                                   |
//! |------------------|---------------------------------------------|
//! | visible          | draw panels, and the alert popup if alerted |
//! | hidden, alerted  | draw the alert popup only                   |
//! | hidden           | nothing besides publishing                  |
//!
//! Visibility changes requested through [`Manager::show`], [`Manager::hide`] or a
//! [`ManagerControl`] are applied on the next change notification.

use crate::main_loop::NotificationHandler;
use crate::output::Renderer;
use crate::sources::Sources;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const NO_REQUEST: u8 = 0;
const SHOW_REQUEST: u8 = 1;
const HIDE_REQUEST: u8 = 2;

/// Thread-safe visibility requests for a [`Manager`], used by control channels such
/// as the signal handler. The latest request wins.
#[derive(Debug, Clone, Default)]
pub struct ManagerControl {
    request: Arc<AtomicU8>,
}

impl ManagerControl {
    pub fn request_show(&self) {
        self.request.store(SHOW_REQUEST, Ordering::Release);
    }

    pub fn request_hide(&self) {
        self.request.store(HIDE_REQUEST, Ordering::Release);
    }

    fn take(&self) -> u8 {
        self.request.swap(NO_REQUEST, Ordering::AcqRel)
    }
}

pub struct Manager {
    sources: Sources,
    renderer: Box<dyn Renderer>,
    control: ManagerControl,
    visible: bool,
    visibility_changed: bool,
    alerted: bool,
}

impl Manager {
    /// Creates a hidden manager.
    pub fn new(sources: Sources, renderer: Box<dyn Renderer>) -> Self {
        Self {
            sources,
            renderer,
            control: ManagerControl::default(),
            visible: false,
            visibility_changed: false,
            alerted: false,
        }
    }

    pub fn control(&self) -> ManagerControl {
        self.control.clone()
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut Sources {
        &mut self.sources
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_alerted(&self) -> bool {
        self.alerted
    }

    /// Also acknowledges a pending alert: the panels carry the alerting state from
    /// now on.
    pub fn show(&mut self) {
        tracing::info!("Showing panels");
        self.dismiss_alert();
        self.visible = true;
        self.visibility_changed = true;
        self.sources.force_redraw();
    }

    pub fn hide(&mut self) {
        tracing::info!("Hiding panels");
        self.visible = false;
        self.visibility_changed = true;
    }

    /// Acknowledges the alert and takes the popup down.
    pub fn dismiss_alert(&mut self) {
        if self.alerted {
            tracing::info!("Alert dismissed");
            self.alerted = false;
            self.renderer.hide_alert();
        }
    }

    fn apply_requests(&mut self) {
        match self.control.take() {
            SHOW_REQUEST => self.show(),
            HIDE_REQUEST => self.hide(),
            _ => {}
        }
    }

    /// Applies a pending visibility transition. Returns `false` when the pass is over.
    fn apply_transition(&mut self) -> bool {
        if !self.visibility_changed {
            return true;
        }
        self.visibility_changed = false;
        if self.visible {
            self.sources.force_redraw();
            true
        } else {
            self.renderer.hide();
            if !self.alerted {
                self.renderer.hide_alert();
            }
            false
        }
    }
}

impl NotificationHandler for Manager {
    fn on_changed(&mut self) {
        self.apply_requests();
        self.sources.publish_all();
        if !self.apply_transition() {
            return;
        }

        let result = if self.visible {
            tracing::debug!("Processing batch of dirty sources");
            let panels = self.renderer.draw(&self.sources);
            if self.alerted {
                panels.and(self.renderer.draw_alert(&self.sources))
            } else {
                panels
            }
        } else if self.alerted {
            tracing::debug!("Drawing alert while hidden");
            self.renderer.draw_alert(&self.sources)
        } else {
            return;
        };

        match result {
            Ok(()) => self.sources.set_all_drawn(),
            Err(e) => tracing::warn!("Render pass failed, retrying on next change: {}", e),
        }
    }

    fn on_alerted(&mut self) {
        tracing::info!("Alert raised");
        self.alerted = true;
        self.on_changed();
    }
}
