#![forbid(unsafe_code)]

//! Embedded-document side of the handoff: pull the staged context and place it
//! in the page's chat input once that input exists.
//!
//! Runs inside the panel's embedded document. The panel id comes from the
//! address fragment; the record is consumed immediately (so a reload never
//! sees it again) and the input region is then awaited with a bounded poll.

use core::time::Duration;

use tracing::{debug, info};

use crate::handoff::{EphemeralStore, HandoffChannel, format_context_block, parse_panel_fragment};
use crate::panel::PanelId;
use crate::poll::{BoundedPoll, PollExit, PollStart};

/// Input-region selectors, most specific first.
pub const INPUT_SELECTORS: &[&str] = &[
    "div.ProseMirror[contenteditable=\"true\"]",
    "[data-testid=\"chat-input\"] [contenteditable=\"true\"]",
    "fieldset [contenteditable=\"true\"]",
    "div[contenteditable=\"true\"]",
    "textarea",
];

/// Embedded document capabilities needed to fill the chat input.
pub trait ComposerHost {
    type Input;

    fn now(&self) -> Duration;
    fn query_input(&self, selector: &str) -> Option<Self::Input>;
    /// Replace the input's content with `text`, notify the page's framework of
    /// the change, and leave the caret at the end.
    fn fill_input(&mut self, input: &Self::Input, text: &str);
}

/// Progress of one embedded document's autofill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutofillState {
    /// Not started yet.
    Idle,
    /// The fragment does not address a panel.
    Unaddressed,
    /// Addressed, but no record was waiting (blank panel, reload, or already consumed).
    NoContext,
    /// Context consumed; waiting for the input region.
    Waiting,
    Filled,
    /// The input region never appeared before the deadline.
    Abandoned,
}

/// First input matching [`INPUT_SELECTORS`] in priority order.
pub fn locate_input<C: ComposerHost>(host: &C) -> Option<C::Input> {
    INPUT_SELECTORS
        .iter()
        .find_map(|selector| host.query_input(selector))
}

fn try_fill<C: ComposerHost>(host: &mut C, payload: &str) -> bool {
    match locate_input(host) {
        Some(input) => {
            host.fill_input(&input, payload);
            true
        }
        None => false,
    }
}

/// One embedded document's consume-then-fill sequence.
pub struct AutofillSession<C: ComposerHost, S: EphemeralStore> {
    host: C,
    handoff: HandoffChannel<S>,
    polls: BoundedPoll<String>,
    timeout: Duration,
    panel: Option<PanelId>,
    state: AutofillState,
}

impl<C: ComposerHost, S: EphemeralStore> AutofillSession<C, S> {
    pub fn new(host: C, store: S, timeout: Duration) -> Self {
        Self {
            host,
            handoff: HandoffChannel::new(store),
            polls: BoundedPoll::new(),
            timeout,
            panel: None,
            state: AutofillState::Idle,
        }
    }

    /// Run once on load with the document's address fragment.
    pub fn start(&mut self, fragment: &str) -> AutofillState {
        if self.state != AutofillState::Idle {
            return self.state;
        }
        let Some(panel) = parse_panel_fragment(fragment) else {
            self.state = AutofillState::Unaddressed;
            return self.state;
        };
        self.panel = Some(panel);
        let Some(context) = self.handoff.consume(panel) else {
            debug!(panel_id = %panel, "no handoff record waiting");
            self.state = AutofillState::NoContext;
            return self.state;
        };
        let payload = format_context_block(&context);
        let now = self.host.now();
        let host = &mut self.host;
        let start = self
            .polls
            .await_condition(payload, now, self.timeout, |payload| try_fill(&mut *host, payload));
        self.state = match start {
            PollStart::Satisfied => AutofillState::Filled,
            PollStart::Subscribed(_) => AutofillState::Waiting,
        };
        debug!(panel_id = %panel, state = ?self.state, "autofill started");
        self.state
    }

    /// Retry after a batch of document mutations.
    pub fn on_mutations(&mut self) -> AutofillState {
        let now = self.host.now();
        let host = &mut self.host;
        let exits = self
            .polls
            .on_mutations(now, |_, payload| try_fill(&mut *host, payload));
        self.apply_exits(&exits);
        self.state
    }

    /// Expire the wait once its deadline passed.
    pub fn tick(&mut self) -> AutofillState {
        let exits = self.polls.expire(self.host.now());
        self.apply_exits(&exits);
        self.state
    }

    fn apply_exits(&mut self, exits: &[PollExit<String>]) {
        for exit in exits {
            self.state = match exit {
                PollExit::Satisfied { .. } => AutofillState::Filled,
                PollExit::TimedOut { .. } => {
                    info!(panel_id = ?self.panel, "chat input never appeared; autofill abandoned");
                    AutofillState::Abandoned
                }
            };
        }
    }

    #[must_use]
    pub const fn state(&self) -> AutofillState {
        self.state
    }

    #[must_use]
    pub const fn panel(&self) -> Option<PanelId> {
        self.panel
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.polls.observer_count()
    }

    #[must_use]
    pub fn next_wakeup(&self) -> Option<Duration> {
        self.polls.next_deadline()
    }

    #[must_use]
    pub const fn host(&self) -> &C {
        &self.host
    }

    #[must_use]
    pub const fn handoff(&self) -> &HandoffChannel<S> {
        &self.handoff
    }
}
