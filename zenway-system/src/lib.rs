//! # zenway System Layer (`zenway-system`)
//!
//! The event-driven part of the overlay: a single-threaded [`MainLoop`] reactor,
//! the data [`Sources`] it polls, the [`Manager`] that turns batched change
//! notifications into render passes, and the per-output panel pipeline in
//! [`output`].
//!
//! Other threads interact with the reactor only through a [`WakeupHandle`].

pub mod error;
pub mod main_loop;
pub mod manager;
pub mod output;
pub mod signals;
pub mod sources;
pub mod timer;

pub use error::{RenderError, SystemError};
pub use main_loop::{IoHandler, MainLoop, NotificationHandler, WakeupHandle};
pub use manager::{Manager, ManagerControl};
pub use output::{Outputs, Panel, PanelSurface, Painter, Renderer};
pub use signals::SignalSource;
pub use sources::{Source, SourceFlags, Sources};
