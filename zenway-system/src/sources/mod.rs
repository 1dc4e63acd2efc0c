//! Sources of live state and the registry that tracks what needs redrawing.
//!
//! Each [`Source`] carries two acknowledgment flags in a [`SourceFlags`]:
//!
//! - **drawn**: cleared when the state changes, set after a successful render pass;
//! - **published**: cleared when the state changes, set once the state has been
//!   written into the [`ScriptSink`] panels read from.
//!
//! A source is dirty while either flag is clear. Nothing but the matching
//! acknowledgment sets a flag again, so a change can never be forgotten before it has
//! been drawn and published.
//!
//! [`Sources`] is the name keyed registry the manager queries through
//! [`Sources::needs_redraw`] and acknowledges through [`Sources::set_all_drawn`] and
//! [`Sources::publish_all`].

pub mod audio;
pub mod clock;
pub mod network;
pub mod power;

pub use audio::{AudioSource, AudioState, AudioUpdater};
pub use clock::{DateSource, TimeSource};
pub use network::{NetworkInterface, NetworkSource};
pub use power::{PowerSource, PowerState};

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Drawn/published bookkeeping embedded in every source. A new source starts dirty.
#[derive(Debug, Default)]
pub struct SourceFlags {
    drawn: AtomicBool,
    published: AtomicBool,
}

impl SourceFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_drawn(&self) -> bool {
        self.drawn.load(Ordering::Acquire)
    }

    pub fn set_drawn(&self) {
        self.drawn.store(true, Ordering::Release);
    }

    pub fn clear_drawn(&self) {
        self.drawn.store(false, Ordering::Release);
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }

    pub fn set_published(&self) {
        self.published.store(true, Ordering::Release);
    }

    /// Called by a source whenever its state changed.
    pub fn mark_changed(&self) {
        self.drawn.store(false, Ordering::Release);
        self.published.store(false, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        !self.is_drawn() || !self.is_published()
    }
}

/// Where sources publish their state for the panels' scripts.
pub trait ScriptSink {
    fn publish(&mut self, source: &str, value: Value);
    fn value(&self, source: &str) -> Option<&Value>;
}

/// The in-crate [`ScriptSink`]: one JSON value per source name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StateTable {
    values: BTreeMap<String, Value>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl ScriptSink for StateTable {
    fn publish(&mut self, source: &str, value: Value) {
        self.values.insert(source.to_string(), value);
    }

    fn value(&self, source: &str) -> Option<&Value> {
        self.values.get(source)
    }
}

/// A producer of live state.
///
/// Implementors provide their [`SourceFlags`] and a snapshot of their state; the
/// acknowledgment methods have default implementations on top of the flags. Sources
/// are shared as `Arc<dyn Source>` with background threads, hence `Send + Sync`.
pub trait Source: Send + Sync {
    fn flags(&self) -> &SourceFlags;

    /// The current state as it should appear to scripts.
    fn state(&self) -> Value;

    fn is_drawn(&self) -> bool {
        self.flags().is_drawn()
    }

    fn set_drawn(&self) {
        self.flags().set_drawn()
    }

    fn clear_drawn(&self) {
        self.flags().clear_drawn()
    }

    fn is_published(&self) -> bool {
        self.flags().is_published()
    }

    /// Writes the state into `sink` under `name` and acknowledges it.
    fn publish(&self, name: &str, sink: &mut dyn ScriptSink) {
        // Acknowledge first: a change racing with the snapshot dirties the flag again.
        self.flags().set_published();
        sink.publish(name, self.state());
    }
}

/// Registry of named sources plus the script sink they publish into.
pub struct Sources {
    sources: HashMap<String, Arc<dyn Source>>,
    script: Box<dyn ScriptSink>,
}

impl Default for Sources {
    fn default() -> Self {
        Self::new(Box::new(StateTable::new()))
    }
}

impl Sources {
    pub fn new(script: Box<dyn ScriptSink>) -> Self {
        Self {
            sources: HashMap::new(),
            script,
        }
    }

    /// Registers `source` under `name`. An existing entry is replaced and returned.
    ///
    /// Registration does not trigger a redraw; new sources are dirty and are picked up
    /// by the next dirty iteration.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        source: Arc<dyn Source>,
    ) -> Option<Arc<dyn Source>> {
        let name = name.into();
        tracing::debug!("Registering source {}", name);
        let previous = self.sources.insert(name.clone(), source);
        if previous.is_some() {
            tracing::warn!("Source {} was already registered, replacing it", name);
        }
        previous
    }

    /// Whether any of `names` is registered and not drawn. Unknown names are clean.
    pub fn needs_redraw<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().any(|name| {
            let name = name.as_ref();
            match self.sources.get(name) {
                Some(source) if !source.is_drawn() => {
                    tracing::trace!("Source {} is dirty", name);
                    true
                }
                _ => false,
            }
        })
    }

    pub fn needs_publish(&self) -> bool {
        self.sources.values().any(|source| !source.is_published())
    }

    /// Clears the drawn flag of every source, forcing a full redraw.
    pub fn force_redraw(&self) {
        for source in self.sources.values() {
            source.clear_drawn();
        }
    }

    pub fn set_all_drawn(&self) {
        for source in self.sources.values() {
            source.set_drawn();
        }
    }

    /// Publishes every source that has unpublished changes.
    pub fn publish_all(&mut self) {
        for (name, source) in &self.sources {
            if !source.is_published() {
                tracing::trace!("Publishing source {}", name);
                source.publish(name, self.script.as_mut());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Source>> {
        self.sources.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn script(&self) -> &dyn ScriptSink {
        self.script.as_ref()
    }
}

impl fmt::Debug for Sources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sources").field("names", &self.names()).finish()
    }
}
