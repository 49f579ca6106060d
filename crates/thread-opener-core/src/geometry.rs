#![forbid(unsafe_code)]

//! Drag and resize gestures for floating panel surfaces.
//!
//! One gesture is active at a time. A gesture records the pointer and frame at
//! pointer-down; every move is applied relative to that origin, so nothing
//! accumulates between gestures. Targets are opaque keys (`K`), which lets the
//! same controller serve every panel.

use tracing::trace;

/// Pointer position in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Element frame in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Which handle the pointer went down on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Drag,
    Resize,
}

/// Resize clamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryConfig {
    pub min_width: f64,
    pub min_height: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            min_width: 320.0,
            min_height: 400.0,
        }
    }
}

/// Why a pointer-down did not start a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureIgnoredReason {
    /// The press landed on an action button inside the drag handle.
    ActionButton,
    GestureInProgress,
}

/// Style change to apply to the target element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryUpdate<K> {
    Moved { target: K, left: f64, top: f64 },
    Resized { target: K, width: f64, height: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveGesture<K> {
    target: K,
    kind: GestureKind,
    start: Point,
    frame: Frame,
}

/// Pointer-driven drag/resize controller.
#[derive(Debug, Clone)]
pub struct GeometryController<K> {
    config: GeometryConfig,
    active: Option<ActiveGesture<K>>,
}

impl<K: Copy + PartialEq + core::fmt::Debug> GeometryController<K> {
    #[must_use]
    pub const fn new(config: GeometryConfig) -> Self {
        Self {
            config,
            active: None,
        }
    }

    /// Begin a gesture on `target`.
    pub fn pointer_down(
        &mut self,
        target: K,
        kind: GestureKind,
        pointer: Point,
        frame: Frame,
        on_action_button: bool,
    ) -> Result<(), GestureIgnoredReason> {
        if on_action_button && kind == GestureKind::Drag {
            return Err(GestureIgnoredReason::ActionButton);
        }
        if self.active.is_some() {
            return Err(GestureIgnoredReason::GestureInProgress);
        }
        trace!(?target, ?kind, "gesture started");
        self.active = Some(ActiveGesture {
            target,
            kind,
            start: pointer,
            frame,
        });
        Ok(())
    }

    /// Apply pointer movement to the active gesture.
    pub fn pointer_move(&self, pointer: Point) -> Option<GeometryUpdate<K>> {
        let active = self.active?;
        let dx = pointer.x - active.start.x;
        let dy = pointer.y - active.start.y;
        let update = match active.kind {
            GestureKind::Drag => GeometryUpdate::Moved {
                target: active.target,
                left: active.frame.left + dx,
                top: active.frame.top + dy,
            },
            GestureKind::Resize => GeometryUpdate::Resized {
                target: active.target,
                width: (active.frame.width + dx).max(self.config.min_width),
                height: (active.frame.height + dy).max(self.config.min_height),
            },
        };
        Some(update)
    }

    /// End the active gesture, returning its target and kind.
    pub fn pointer_up(&mut self) -> Option<(K, GestureKind)> {
        self.active.take().map(|active| (active.target, active.kind))
    }

    /// Abort a gesture whose target went away.
    pub fn cancel_for(&mut self, target: K) {
        if self.active.is_some_and(|active| active.target == target) {
            self.active = None;
        }
    }

    #[must_use]
    pub fn active_target(&self) -> Option<K> {
        self.active.map(|active| active.target)
    }
}

impl<K: Copy + PartialEq + core::fmt::Debug> Default for GeometryController<K> {
    fn default() -> Self {
        Self::new(GeometryConfig::default())
    }
}
