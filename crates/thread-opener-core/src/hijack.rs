#![forbid(unsafe_code)]

//! Takeover of the host page's own selection "reply" affordance.
//!
//! The host renders a transient control whenever the user selects text. Each
//! rendered instance is identified by the host with an [`AffordanceId`]; the
//! guard remembers which instances were already taken over so an instance is
//! never hijacked twice, and forgets instances once they leave the document.

use std::collections::BTreeSet;

use crate::geometry::Frame;

/// Host-assigned identity of one rendered affordance instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AffordanceId(pub u64);

impl core::fmt::Display for AffordanceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Most recent qualifying selection: text, scroll position, and where it was on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSnapshot {
    pub text: String,
    pub scroll_top: f64,
    pub rect: Option<Frame>,
}

impl SelectionSnapshot {
    /// Whether the trimmed text is long enough to seed a panel.
    #[must_use]
    pub fn qualifies(&self, min_chars: usize) -> bool {
        let trimmed = self.text.trim();
        !trimmed.is_empty() && trimmed.chars().count() >= min_chars
    }
}

/// Why a sighted affordance was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HijackSkip {
    AlreadyHijacked,
    NoQualifyingSelection,
    PanelVisible,
}

/// Single-shot guard flags, one per affordance instance.
#[derive(Debug, Clone, Default)]
pub struct HijackGuard {
    hijacked: BTreeSet<AffordanceId>,
}

impl HijackGuard {
    /// Drop flags for instances no longer rendered.
    pub fn retain_present(&mut self, present: &[AffordanceId]) {
        self.hijacked.retain(|id| present.contains(id));
    }

    #[must_use]
    pub fn is_hijacked(&self, id: AffordanceId) -> bool {
        self.hijacked.contains(&id)
    }

    /// Set the flag. Returns `false` if it was already set.
    pub fn mark(&mut self, id: AffordanceId) -> bool {
        self.hijacked.insert(id)
    }
}
