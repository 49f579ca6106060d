#![forbid(unsafe_code)]

//! Cross-boundary context handoff between the host page and a panel's
//! embedded document.
//!
//! The two sides never share memory. They agree only on:
//! - the key derivation [`handoff_key`] (`claude-thread-opener-context-<id>`),
//! - the address fragment [`panel_fragment`] (`thread-opener-<id>`) that tells
//!   the embedded document which panel it belongs to, and
//! - a tab-scoped [`EphemeralStore`] both can reach.
//!
//! Delivery is at most once per panel: [`HandoffChannel::consume`] is a
//! destructive read, and the host deletes any unconsumed record when the
//! panel closes.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::HostError;
use crate::panel::PanelId;

const HANDOFF_KEY_PREFIX: &str = "claude-thread-opener-context-";
const FRAGMENT_PREFIX: &str = "thread-opener-";

/// Store key for the panel's Handoff Record.
#[must_use]
pub fn handoff_key(panel: PanelId) -> String {
    format!("{HANDOFF_KEY_PREFIX}{panel}")
}

/// Address fragment (without `#`) carrying the panel identity.
#[must_use]
pub fn panel_fragment(panel: PanelId) -> String {
    format!("{FRAGMENT_PREFIX}{panel}")
}

/// Recover the panel id from an address fragment, with or without the leading `#`.
#[must_use]
pub fn parse_panel_fragment(fragment: &str) -> Option<PanelId> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    let digits = fragment.strip_prefix(FRAGMENT_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().and_then(PanelId::new)
}

/// Embedded document load target. Blank panels (`panel = None`) get no fragment.
#[must_use]
pub fn embedded_url(base_url: &str, mode_flag: &str, panel: Option<PanelId>) -> String {
    let mut url = base_url.to_owned();
    if !mode_flag.is_empty() {
        url.push(if base_url.contains('?') { '&' } else { '?' });
        url.push_str(mode_flag);
    }
    if let Some(panel) = panel {
        url.push('#');
        url.push_str(&panel_fragment(panel));
    }
    url
}

/// Clipboard/input block wrapping a context payload.
#[must_use]
pub fn format_context_block(text: &str) -> String {
    format!("\"\"\"Context from my main thread:\n\"{text}\"\n\"\"\"")
}

/// Tab-scoped key/value store shared by host and embedded documents.
pub trait EphemeralStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), HostError>;
    fn remove(&mut self, key: &str);
}

/// In-memory store for native hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl EphemeralStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HostError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Panel-addressed handoff over an [`EphemeralStore`].
#[derive(Debug, Clone, Default)]
pub struct HandoffChannel<S> {
    store: S,
}

impl<S: EphemeralStore> HandoffChannel<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Write the Handoff Record for `panel`. A failed write is logged and reported
    /// as `false`; the panel still opens, it just receives no context.
    pub fn stage(&mut self, panel: PanelId, text: &str) -> bool {
        match self.store.set(&handoff_key(panel), text) {
            Ok(()) => {
                debug!(panel_id = %panel, bytes = text.len(), "handoff staged");
                true
            }
            Err(err) => {
                warn!(panel_id = %panel, %err, "handoff stage failed");
                false
            }
        }
    }

    /// Read and delete the record for `panel`.
    pub fn consume(&mut self, panel: PanelId) -> Option<String> {
        let key = handoff_key(panel);
        let text = self.store.get(&key)?;
        self.store.remove(&key);
        debug!(panel_id = %panel, "handoff consumed");
        Some(text)
    }

    /// Delete any pending record for `panel` without reading it.
    pub fn discard(&mut self, panel: PanelId) {
        self.store.remove(&handoff_key(panel));
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}
