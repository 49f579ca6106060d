#![forbid(unsafe_code)]

//! Which half of the content script a frame runs.

use thread_opener_core::PanelId;
use thread_opener_core::handoff::parse_panel_fragment;

/// Role of the frame the script was injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRole {
    /// Top-level chat page: owns panels.
    Host,
    /// A panel's embedded document, addressed by its fragment.
    Embedded(PanelId),
    /// Any other frame. The script stays out of it.
    Inert,
}

impl FrameRole {
    #[must_use]
    pub fn detect(is_top_level: bool, fragment: &str) -> Self {
        if is_top_level {
            return Self::Host;
        }
        parse_panel_fragment(fragment).map_or(Self::Inert, Self::Embedded)
    }
}
