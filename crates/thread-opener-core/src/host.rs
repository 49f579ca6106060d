#![forbid(unsafe_code)]

//! Host seam for the top-level page.
//!
//! The [`PanelHost`] trait is everything the Panel Manager needs from the page:
//! a monotonic clock, the scroll container, the active selection, the panel
//! surfaces it renders, the clipboard, the host's reply affordance, and text
//! access for relocation. The web crate implements it over the DOM; the
//! [`crate::testing::MemoryHost`] implements it in memory.

use core::time::Duration;

use crate::error::HostError;
use crate::hijack::{AffordanceId, SelectionSnapshot};
use crate::panel::{LoadState, PanelId};
use crate::relocate::TextTree;

/// Where and how to render a new panel surface.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSurface {
    pub id: PanelId,
    /// Distance from the viewport top (px).
    pub top: f64,
    /// Distance from the viewport right edge (px).
    pub right: f64,
    pub width: f64,
    pub height: f64,
    /// Header label.
    pub label: String,
    pub blank: bool,
}

/// One entry of the minimized-tab strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabView {
    pub id: PanelId,
    pub label: String,
}

/// Highlight marker lifecycle on a relocated block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightPhase {
    Marked,
    Fading,
    /// Marker fully removed.
    Cleared,
}

/// Outcome of requesting a clipboard write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardWrite {
    Written,
    /// The host settles the write later and reports it through
    /// [`crate::manager::PanelManager::on_clipboard_settled`].
    Pending,
}

/// Host page capabilities used by [`crate::manager::PanelManager`].
pub trait PanelHost: TextTree {
    /// Monotonic clock.
    fn now(&self) -> Duration;
    fn viewport_height(&self) -> f64;

    fn scroll_top(&self) -> f64;
    /// Smooth-scroll the host scroll container.
    fn scroll_to(&mut self, top: f64);

    /// Current selection, if any.
    fn selection(&self) -> Option<SelectionSnapshot>;
    fn clear_selection(&mut self);

    fn mount_panel(&mut self, surface: &PanelSurface);
    fn set_panel_visible(&mut self, id: PanelId, visible: bool);
    fn set_load_state(&mut self, id: PanelId, state: LoadState);
    fn navigate_embedded(&mut self, id: PanelId, url: &str);
    fn unmount_panel(&mut self, id: PanelId);
    fn render_tab_strip(&mut self, tabs: &[TabView]);
    fn set_copy_hint(&mut self, id: PanelId, flashing: bool);
    /// Open `url` in a separate browsing context.
    fn open_external(&mut self, url: &str);

    /// Write `text` for `panel`'s copy affordance.
    fn write_clipboard(&mut self, panel: PanelId, text: &str)
    -> Result<ClipboardWrite, HostError>;

    /// Reply affordance instances currently rendered by the host page.
    fn reply_affordances(&mut self) -> Vec<AffordanceId>;
    /// Replace the affordance's visible control and route its clicks to
    /// [`crate::manager::PanelManager::activate_hijack`], suppressing the
    /// host's own handler.
    fn install_hijack(&mut self, affordance: AffordanceId);

    fn set_highlight(&mut self, block: &Self::Node, phase: HighlightPhase);
    fn scroll_block_into_view(&mut self, block: &Self::Node);
}
