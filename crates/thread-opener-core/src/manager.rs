#![forbid(unsafe_code)]

//! Panel Manager: owner of the panel registry and every piece of mutable
//! coordination state (tab strip, hijack guard flags, selection snapshot,
//! pending timers and polls, active highlight).
//!
//! All entry points are synchronous and run to completion on the host's UI
//! thread. After any entry point the host should re-arm its wake-up with
//! [`PanelManager::next_wakeup`] and connect or disconnect its mutation
//! observer according to [`PanelManager::observer_count`].
//!
//! Operations addressed to an unknown panel id are no-ops: a queued callback
//! racing a close is expected, not an error.

use core::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::config::ThreadOpenerConfig;
use crate::handoff::{EphemeralStore, HandoffChannel, embedded_url, format_context_block};
use crate::hijack::{AffordanceId, HijackGuard, HijackSkip, SelectionSnapshot};
use crate::error::HostError;
use crate::host::{ClipboardWrite, HighlightPhase, PanelHost, PanelSurface, TabView};
use crate::keys::{KeyInput, ShortcutAction, classify};
use crate::panel::{LoadState, Panel, PanelId, PanelRegistry, VisualState, snippet};
use crate::poll::{BoundedPoll, PollExit, PollStart};
use crate::relocate::{RelocateConfig, locate_blocks, relocation_scroll_target, search_keys};
use crate::timers::TimerQueue;

/// Inert navigation target used to stop an embedded document.
pub const INERT_URL: &str = "about:blank";
/// Tab label for panels opened without context.
pub const BLANK_PANEL_LABEL: &str = "New thread";

#[derive(Debug, Clone, PartialEq)]
enum Deferred {
    Relocate { text: String },
    HighlightFade { generation: u64 },
    HighlightClear { generation: u64 },
    LoadGrace { panel: PanelId },
    CopyHintReset { panel: PanelId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Watch {
    ReplyAffordance,
}

#[derive(Debug, Clone)]
struct ActiveHighlight<N> {
    generation: u64,
    blocks: Vec<N>,
}

/// Owner of all open panels and their coordination state.
pub struct PanelManager<H: PanelHost, S: EphemeralStore> {
    config: ThreadOpenerConfig,
    host: H,
    handoff: HandoffChannel<S>,
    registry: PanelRegistry,
    timers: TimerQueue<Deferred>,
    watches: BoundedPoll<Watch>,
    guard: HijackGuard,
    snapshot: Option<SelectionSnapshot>,
    highlight: Option<ActiveHighlight<H::Node>>,
    highlight_generation: u64,
}

impl<H: PanelHost, S: EphemeralStore> PanelManager<H, S> {
    pub fn new(host: H, store: S, config: ThreadOpenerConfig) -> Self {
        Self {
            config,
            host,
            handoff: HandoffChannel::new(store),
            registry: PanelRegistry::default(),
            timers: TimerQueue::new(),
            watches: BoundedPoll::new(),
            guard: HijackGuard::default(),
            snapshot: None,
            highlight: None,
            highlight_generation: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub const fn config(&self) -> &ThreadOpenerConfig {
        &self.config
    }

    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub const fn handoff(&self) -> &HandoffChannel<S> {
        &self.handoff
    }

    #[must_use]
    pub fn panel(&self, id: PanelId) -> Option<&Panel> {
        self.registry.get(id)
    }

    /// Open panels in creation order.
    pub fn panels(&self) -> impl Iterator<Item = &Panel> {
        self.registry.iter()
    }

    #[must_use]
    pub fn panel_ids(&self) -> Vec<PanelId> {
        self.registry.ids()
    }

    #[must_use]
    pub fn has_visible_panel(&self) -> bool {
        self.registry.iter().any(Panel::is_visible)
    }

    #[must_use]
    pub const fn selection_snapshot(&self) -> Option<&SelectionSnapshot> {
        self.snapshot.as_ref()
    }

    /// Minimized panels in creation order, derived from the registry.
    #[must_use]
    pub fn tab_strip(&self) -> Vec<TabView> {
        self.registry
            .iter()
            .filter(|panel| panel.visual_state == VisualState::Minimized)
            .map(|panel| TabView {
                id: panel.id,
                label: if panel.is_blank() {
                    BLANK_PANEL_LABEL.to_owned()
                } else {
                    panel.context_snippet.clone()
                },
            })
            .collect()
    }

    /// Live mutation subscriptions; the host observer should be connected iff non-zero.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.watches.observer_count()
    }

    /// Earliest moment [`Self::tick`] has work to do.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Duration> {
        match (self.timers.next_deadline(), self.watches.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Open a panel seeded with `context` (empty for a blank panel).
    pub fn open_panel(&mut self, context: &str) -> PanelId {
        let origin_scroll_top = self.host.scroll_top();
        self.open_with_origin(context, origin_scroll_top)
    }

    fn open_with_origin(&mut self, context: &str, origin_scroll_top: f64) -> PanelId {
        let id = self.registry.allocate();
        let blank = context.trim().is_empty();
        let full_context = if blank { String::new() } else { context.to_owned() };
        let url = embedded_url(
            &self.config.base_url,
            &self.config.mode_flag,
            (!blank).then_some(id),
        );
        let panel = Panel {
            id,
            visual_state: VisualState::Visible,
            context_snippet: snippet(&full_context, self.config.snippet_chars),
            origin_selected_text: full_context.clone(),
            full_context,
            origin_scroll_top,
            embedded_url: url.clone(),
            load_state: LoadState::Loading,
        };

        let width = f64::from(self.config.panel_width);
        let height = f64::from(self.config.panel_height);
        let margin = f64::from(self.config.panel_margin);
        let surface = PanelSurface {
            id,
            top: ((self.host.viewport_height() - height) / 2.0).max(margin),
            right: margin,
            width,
            height,
            label: if blank {
                BLANK_PANEL_LABEL.to_owned()
            } else {
                panel.context_snippet.clone()
            },
            blank,
        };

        self.registry.insert(panel);
        self.host.mount_panel(&surface);
        self.host.clear_selection();

        if !blank {
            self.handoff.stage(id, context);
            self.copy_context(id, context);
        }
        self.host.navigate_embedded(id, &url);
        let grace_deadline = self.host.now().saturating_add(self.config.load_grace());
        self.timers
            .schedule(grace_deadline, Deferred::LoadGrace { panel: id });
        self.refresh_tab_strip();
        debug!(panel_id = %id, blank, "panel opened");
        id
    }

    /// Hide a panel into the tab strip. Returns `false` for unknown ids.
    pub fn minimize_panel(&mut self, id: PanelId) -> bool {
        let Some(panel) = self.registry.get_mut(id) else {
            trace!(panel_id = %id, "minimize ignored: unknown panel");
            return false;
        };
        if panel.visual_state == VisualState::Minimized {
            return true;
        }
        panel.visual_state = VisualState::Minimized;
        self.host.set_panel_visible(id, false);
        self.refresh_tab_strip();
        debug!(panel_id = %id, "panel minimized");
        true
    }

    /// Show a minimized panel and relocate its originating text.
    pub fn expand_panel(&mut self, id: PanelId) -> bool {
        let Some(panel) = self.registry.get_mut(id) else {
            trace!(panel_id = %id, "expand ignored: unknown panel");
            return false;
        };
        if panel.visual_state == VisualState::Visible {
            return true;
        }
        panel.visual_state = VisualState::Visible;
        let origin_scroll_top = panel.origin_scroll_top;
        let text = panel.origin_selected_text.clone();
        self.host.set_panel_visible(id, true);
        self.refresh_tab_strip();
        debug!(panel_id = %id, "panel expanded");
        self.begin_relocation(origin_scroll_top, text);
        true
    }

    /// Tear down a panel, its embedded document, and any unconsumed handoff.
    pub fn close_panel(&mut self, id: PanelId) -> bool {
        let Some(panel) = self.registry.remove(id) else {
            trace!(panel_id = %id, "close ignored: unknown panel");
            return false;
        };
        self.host.navigate_embedded(id, INERT_URL);
        self.handoff.discard(id);
        self.host.unmount_panel(id);
        self.refresh_tab_strip();
        debug!(panel_id = %id, was_blank = panel.is_blank(), "panel closed");
        true
    }

    /// Close every open panel. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        self.registry
            .ids()
            .into_iter()
            .filter(|&id| self.close_panel(id))
            .count()
    }

    /// Give up on the embedded document and open the destination separately.
    pub fn open_in_new_context(&mut self, id: PanelId) -> bool {
        if self.registry.get(id).is_none() {
            return false;
        }
        let url = self.config.base_url.clone();
        self.host.open_external(&url);
        self.close_panel(id)
    }

    /// Copy a panel's context to the clipboard again. No-op for blank panels.
    pub fn recopy_context(&mut self, id: PanelId) -> bool {
        let Some(panel) = self.registry.get(id) else {
            return false;
        };
        if panel.is_blank() {
            return false;
        }
        let text = panel.full_context.clone();
        self.copy_context(id, &text);
        true
    }

    /// The embedded document reported a completed load.
    pub fn on_embedded_loaded(&mut self, id: PanelId) -> bool {
        let Some(panel) = self.registry.get_mut(id) else {
            return false;
        };
        if panel.load_state == LoadState::Ready {
            return true;
        }
        panel.load_state = LoadState::Ready;
        self.host.set_load_state(id, LoadState::Ready);
        debug!(panel_id = %id, "embedded document loaded");
        true
    }

    /// A clipboard write the host reported as pending has settled.
    pub fn on_clipboard_settled(&mut self, id: PanelId, result: Result<(), HostError>) {
        match result {
            Ok(()) if self.registry.get(id).is_some() => self.flash_copy_hint(id),
            Ok(()) => trace!(panel_id = %id, "clipboard settled after close"),
            Err(err) => warn!(panel_id = %id, %err, "clipboard write swallowed"),
        }
    }

    fn copy_context(&mut self, id: PanelId, text: &str) {
        match self.host.write_clipboard(id, &format_context_block(text)) {
            Ok(ClipboardWrite::Written) => self.flash_copy_hint(id),
            Ok(ClipboardWrite::Pending) => trace!(panel_id = %id, "clipboard write pending"),
            Err(err) => warn!(panel_id = %id, %err, "clipboard write swallowed"),
        }
    }

    fn flash_copy_hint(&mut self, id: PanelId) {
        self.host.set_copy_hint(id, true);
        let deadline = self.host.now().saturating_add(self.config.copy_hint());
        self.timers
            .schedule(deadline, Deferred::CopyHintReset { panel: id });
    }

    fn refresh_tab_strip(&mut self) {
        let tabs = self.tab_strip();
        self.host.render_tab_strip(&tabs);
    }

    // -----------------------------------------------------------------------
    // Triggers
    // -----------------------------------------------------------------------

    /// Dispatch a key press. Returns `true` when the event was consumed.
    pub fn handle_key(&mut self, input: &KeyInput) -> bool {
        match classify(input) {
            None => false,
            Some(ShortcutAction::OpenFromSelection) => {
                let min_chars = self.config.min_selection_chars;
                let Some(selection) = self.host.selection().filter(|s| s.qualifies(min_chars))
                else {
                    return false;
                };
                let text = selection.text.trim().to_owned();
                let scroll_top = selection.scroll_top;
                self.snapshot = Some(selection);
                self.open_with_origin(&text, scroll_top);
                true
            }
            Some(ShortcutAction::OpenBlank) => {
                self.open_panel("");
                true
            }
            Some(ShortcutAction::MinimizeLatest) => {
                let latest = self
                    .registry
                    .iter()
                    .filter(|panel| panel.is_visible())
                    .map(|panel| panel.id)
                    .last();
                latest.is_some_and(|id| self.minimize_panel(id))
            }
        }
    }

    /// A selection gesture ended; watch for the host's reply affordance.
    ///
    /// The selection snapshot is refreshed even when a watch is already
    /// pending, which is when this returns `false`.
    pub fn on_selection_gesture(&mut self) -> bool {
        self.capture_selection();
        if self.watches.any_pending(|watch| *watch == Watch::ReplyAffordance) {
            return false;
        }
        let now = self.host.now();
        let timeout = self.config.hijack_timeout();
        let mut watches = std::mem::take(&mut self.watches);
        let start = watches.await_condition(Watch::ReplyAffordance, now, timeout, |_| {
            self.attempt_hijack()
        });
        self.watches = watches;
        if let PollStart::Subscribed(poll_id) = start {
            trace!(%poll_id, "watching for reply affordance");
        }
        true
    }

    /// Re-run pending watches after a batch of document mutations.
    pub fn on_mutations(&mut self) {
        let now = self.host.now();
        let mut watches = std::mem::take(&mut self.watches);
        let exits = watches.on_mutations(now, |_, watch| match watch {
            Watch::ReplyAffordance => self.attempt_hijack(),
        });
        self.watches = watches;
        log_watch_exits(&exits);
    }

    /// One look at the host document. `true` ends the watch.
    fn attempt_hijack(&mut self) -> bool {
        self.capture_selection();
        let present = self.host.reply_affordances();
        self.guard.retain_present(&present);
        let Some(&candidate) = present.iter().find(|&&id| !self.guard.is_hijacked(id)) else {
            return false;
        };

        match self.hijack_blocker(candidate) {
            Some(reason) => {
                debug!(affordance = %candidate, ?reason, "reply affordance left alone");
            }
            None => {
                self.guard.mark(candidate);
                self.host.install_hijack(candidate);
                debug!(affordance = %candidate, "reply affordance hijacked");
            }
        }
        true
    }

    /// Overwrite the snapshot with the live selection when it qualifies.
    fn capture_selection(&mut self) {
        let min_chars = self.config.min_selection_chars;
        if let Some(selection) = self.host.selection().filter(|s| s.qualifies(min_chars)) {
            self.snapshot = Some(selection);
        }
    }

    fn hijack_blocker(&self, candidate: AffordanceId) -> Option<HijackSkip> {
        if self.guard.is_hijacked(candidate) {
            return Some(HijackSkip::AlreadyHijacked);
        }
        let qualifying = self
            .snapshot
            .as_ref()
            .is_some_and(|s| s.qualifies(self.config.min_selection_chars));
        if !qualifying {
            return Some(HijackSkip::NoQualifyingSelection);
        }
        if self.has_visible_panel() {
            return Some(HijackSkip::PanelVisible);
        }
        None
    }

    /// Click on a hijacked affordance: open a panel from the snapshot.
    pub fn activate_hijack(&mut self, affordance: AffordanceId) -> Option<PanelId> {
        if !self.guard.is_hijacked(affordance) {
            return None;
        }
        let snapshot = self
            .snapshot
            .clone()
            .filter(|s| s.qualifies(self.config.min_selection_chars))?;
        let text = snapshot.text.trim().to_owned();
        Some(self.open_with_origin(&text, snapshot.scroll_top))
    }

    // -----------------------------------------------------------------------
    // Deferred work
    // -----------------------------------------------------------------------

    /// Fire due timers and expire watches whose deadline passed.
    pub fn tick(&mut self) {
        let now = self.host.now();
        let exits = self.watches.expire(now);
        log_watch_exits(&exits);
        for task in self.timers.take_due(now) {
            self.fire(task);
        }
    }

    fn fire(&mut self, task: Deferred) {
        match task {
            Deferred::Relocate { text } => self.run_relocation(&text),
            Deferred::HighlightFade { generation } => {
                if let Some(active) = self.highlight.as_ref().filter(|a| a.generation == generation)
                {
                    for block in &active.blocks {
                        self.host.set_highlight(block, HighlightPhase::Fading);
                    }
                }
            }
            Deferred::HighlightClear { generation } => {
                if self
                    .highlight
                    .as_ref()
                    .is_some_and(|active| active.generation == generation)
                {
                    self.clear_highlight();
                }
            }
            Deferred::LoadGrace { panel } => {
                let Some(record) = self.registry.get_mut(panel) else {
                    return;
                };
                if record.load_state == LoadState::Loading {
                    record.load_state = LoadState::Failed;
                    self.host.set_load_state(panel, LoadState::Failed);
                    warn!(panel_id = %panel, "embedded document did not load; showing fallback");
                }
            }
            Deferred::CopyHintReset { panel } => {
                if self.registry.get(panel).is_some() {
                    self.host.set_copy_hint(panel, false);
                }
            }
        }
    }

    fn begin_relocation(&mut self, origin_scroll_top: f64, text: String) {
        let target = relocation_scroll_target(origin_scroll_top, self.host.viewport_height());
        self.host.scroll_to(target);
        if search_keys(&text, self.relocate_config()).is_empty() {
            return;
        }
        let deadline = self.host.now().saturating_add(self.config.scroll_settle());
        self.timers.schedule(deadline, Deferred::Relocate { text });
    }

    fn run_relocation(&mut self, text: &str) {
        self.clear_highlight();
        let blocks = locate_blocks(&self.host, text, self.relocate_config());
        let Some(first) = blocks.first() else {
            info!("relocation found no matching blocks");
            return;
        };
        for block in &blocks {
            self.host.set_highlight(block, HighlightPhase::Marked);
        }
        self.host.scroll_block_into_view(first);

        self.highlight_generation += 1;
        let generation = self.highlight_generation;
        let now = self.host.now();
        let fade_at = now.saturating_add(self.config.highlight_hold());
        let clear_at = fade_at.saturating_add(self.config.highlight_fade());
        self.timers
            .schedule(fade_at, Deferred::HighlightFade { generation });
        self.timers
            .schedule(clear_at, Deferred::HighlightClear { generation });
        self.highlight = Some(ActiveHighlight { generation, blocks });
    }

    fn clear_highlight(&mut self) {
        if let Some(active) = self.highlight.take() {
            for block in &active.blocks {
                self.host.set_highlight(block, HighlightPhase::Cleared);
            }
        }
    }

    fn relocate_config(&self) -> RelocateConfig {
        RelocateConfig {
            min_fragment_chars: self.config.min_fragment_chars,
            search_key_chars: self.config.search_key_chars,
        }
    }
}

fn log_watch_exits(exits: &[PollExit<Watch>]) {
    for exit in exits {
        if let PollExit::TimedOut { id, task } = exit {
            info!(poll_id = %id, ?task, "watch abandoned: host element not found");
        }
    }
}
