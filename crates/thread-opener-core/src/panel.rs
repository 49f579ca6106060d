#![forbid(unsafe_code)]

//! Panel records and the registry that owns them.

use core::fmt;
use core::num::NonZeroU64;
use std::collections::BTreeMap;

/// Session-unique panel identity. Assigned monotonically from 1, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PanelId(NonZeroU64);

impl PanelId {
    pub const FIRST: Self = Self(NonZeroU64::MIN);

    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the panel surface is shown or parked in the tab strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    Visible,
    Minimized,
}

/// Embedded document load progress as observed from the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    /// The grace period elapsed without a load signal; the fallback is shown.
    Failed,
}

/// One user-opened side thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub id: PanelId,
    pub visual_state: VisualState,
    /// Display-truncated context used on the minimized tab. Empty for blank panels.
    pub context_snippet: String,
    /// Payload handed to the embedded document. Empty for blank panels.
    pub full_context: String,
    /// Host scroll-container offset when the context was captured.
    pub origin_scroll_top: f64,
    /// Text relocated and highlighted on expand.
    pub origin_selected_text: String,
    /// Load target of the embedded document.
    pub embedded_url: String,
    pub load_state: LoadState,
}

impl Panel {
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.full_context.is_empty()
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        matches!(self.visual_state, VisualState::Visible)
    }
}

/// Collapse whitespace runs and truncate to `limit` chars, ellipsis included.
#[must_use]
pub fn snippet(text: &str, limit: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= limit {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(limit.saturating_sub(3)).collect();
    out.truncate(out.trim_end().len());
    out.push_str("...");
    out
}

/// Id-ordered panel map. Ids are monotonic, so id order is creation order.
#[derive(Debug, Clone)]
pub struct PanelRegistry {
    panels: BTreeMap<PanelId, Panel>,
    next_id: PanelId,
}

impl Default for PanelRegistry {
    fn default() -> Self {
        Self {
            panels: BTreeMap::new(),
            next_id: PanelId::FIRST,
        }
    }
}

impl PanelRegistry {
    /// Reserve the next id. Ids are never handed out twice.
    pub fn allocate(&mut self) -> PanelId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    pub fn insert(&mut self, panel: Panel) {
        self.panels.insert(panel.id, panel);
    }

    pub fn remove(&mut self, id: PanelId) -> Option<Panel> {
        self.panels.remove(&id)
    }

    #[must_use]
    pub fn get(&self, id: PanelId) -> Option<&Panel> {
        self.panels.get(&id)
    }

    pub fn get_mut(&mut self, id: PanelId) -> Option<&mut Panel> {
        self.panels.get_mut(&id)
    }

    #[must_use]
    pub fn ids(&self) -> Vec<PanelId> {
        self.panels.keys().copied().collect()
    }

    /// Panels in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Panel> {
        self.panels.values()
    }
}

#[cfg(test)]
mod tests {
    use super::{PanelId, PanelRegistry, snippet};

    #[test]
    fn ids_are_monotonic_and_start_at_one() {
        let mut registry = PanelRegistry::default();
        let first = registry.allocate();
        let second = registry.allocate();
        assert_eq!(first, PanelId::FIRST);
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 2);
    }

    #[test]
    fn snippet_collapses_whitespace_and_truncates() {
        assert_eq!(snippet("  short\n\ntext ", 100), "short text");
        let long = "word ".repeat(40);
        let cut = snippet(&long, 100);
        assert!(cut.chars().count() <= 100);
        assert!(cut.ends_with("..."));
        assert!(!cut.ends_with(" ..."));
    }

    #[test]
    fn snippet_counts_chars_not_bytes() {
        let text = "é".repeat(100);
        assert_eq!(snippet(&text, 100), text);
    }
}
