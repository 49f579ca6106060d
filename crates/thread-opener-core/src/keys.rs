#![forbid(unsafe_code)]

//! Keyboard shortcut classification.

/// The fields of a DOM `KeyboardEvent` the shortcuts look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInput {
    /// DOM `key` value (`"t"`, `"T"`, `"\\"`, `"Escape"`).
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyInput {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    #[must_use]
    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    #[must_use]
    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    const fn modifier(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Panel action bound to a shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    /// Modifier+Shift+T: open a panel from the current selection.
    OpenFromSelection,
    /// Modifier+\: open a blank panel.
    OpenBlank,
    /// Escape: minimize the most recently opened visible panel.
    MinimizeLatest,
}

/// Map a key press to a shortcut. Cmd and Ctrl are interchangeable.
#[must_use]
pub fn classify(input: &KeyInput) -> Option<ShortcutAction> {
    if input.key == "Escape" && !input.modifier() && !input.shift {
        return Some(ShortcutAction::MinimizeLatest);
    }
    if !input.modifier() {
        return None;
    }
    if input.shift && input.key.eq_ignore_ascii_case("t") {
        return Some(ShortcutAction::OpenFromSelection);
    }
    if !input.shift && input.key == "\\" {
        return Some(ShortcutAction::OpenBlank);
    }
    None
}
