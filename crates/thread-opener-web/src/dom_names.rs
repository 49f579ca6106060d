#![forbid(unsafe_code)]

//! DOM vocabulary shared by the surfaces the content script renders and the
//! delegated event handlers that read them back.
//!
//! Every rendered surface carries [`SURFACE_ATTR`] so relocation can skip it.
//! Actions and drag/resize handles are plain data attributes resolved with
//! `closest()`, which keeps all listeners on `window`/`document`.

use thread_opener_core::PanelId;
use thread_opener_core::geometry::GestureKind;
use thread_opener_core::hijack::AffordanceId;

pub const SURFACE_ATTR: &str = "data-thread-opener-surface";
/// Panel id on panel roots and minimized tabs.
pub const PANEL_ID_ATTR: &str = "data-thread-opener-panel-id";
pub const ACTION_ATTR: &str = "data-thread-opener-action";
pub const HANDLE_ATTR: &str = "data-thread-opener-handle";
/// Marks a panel's embedded frame.
pub const FRAME_ATTR: &str = "data-thread-opener-frame";
/// Identity stamped on each sighted host reply affordance.
pub const AFFORDANCE_ATTR: &str = "data-thread-opener-affordance";
/// Present once an affordance has been taken over.
pub const HIJACK_ATTR: &str = "data-thread-opener-hijack";
pub const LOAD_STATE_ATTR: &str = "data-thread-opener-load";

pub const PANEL_CLASS: &str = "thread-opener-panel";
pub const HEADER_CLASS: &str = "thread-opener-header";
pub const BODY_CLASS: &str = "thread-opener-body";
pub const LOADING_CLASS: &str = "thread-opener-loading";
pub const ERROR_CLASS: &str = "thread-opener-error";
pub const RESIZE_CLASS: &str = "thread-opener-resize";
pub const BUTTON_CLASS: &str = "thread-opener-btn";
pub const TAB_CLASS: &str = "thread-opener-tab";
pub const VISIBLE_CLASS: &str = "visible";
pub const DRAGGING_CLASS: &str = "dragging";
pub const RESIZING_CLASS: &str = "resizing";
pub const FLASH_CLASS: &str = "flash";
pub const HIGHLIGHT_CLASS: &str = "thread-opener-highlight";
pub const HIGHLIGHT_FADING_CLASS: &str = "thread-opener-highlight-fading";

pub const TAB_STRIP_ID: &str = "thread-opener-tabs";

/// Attribute changes that can reveal a host control without inserting it.
pub const OBSERVED_ATTRIBUTES: &[&str] = &["class", "style", "hidden"];

/// Host scroll container candidates, most specific first. Falls back to the
/// document's scrolling element.
pub const SCROLL_CONTAINER_SELECTORS: &[&str] = &[
    "[data-autoscroll-container=\"true\"]",
    "main [class*=\"overflow-y-auto\"]",
    "main [class*=\"overflow-y-scroll\"]",
];

/// Visible label of the host page's selection reply control.
pub const REPLY_LABEL: &str = "Reply";
/// Label shown on a hijacked affordance.
pub const HIJACKED_LABEL: &str = "Open thread";

/// Click targets inside rendered surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAction {
    Minimize,
    Close,
    Copy,
    OpenExternal,
    Expand,
}

impl SurfaceAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minimize => "minimize",
            Self::Close => "close",
            Self::Copy => "copy",
            Self::OpenExternal => "open-external",
            Self::Expand => "expand",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        [
            Self::Minimize,
            Self::Close,
            Self::Copy,
            Self::OpenExternal,
            Self::Expand,
        ]
        .into_iter()
        .find(|action| action.as_str() == value)
    }
}

#[must_use]
pub const fn handle_value(kind: GestureKind) -> &'static str {
    match kind {
        GestureKind::Drag => "drag",
        GestureKind::Resize => "resize",
    }
}

#[must_use]
pub fn parse_handle(value: &str) -> Option<GestureKind> {
    match value {
        "drag" => Some(GestureKind::Drag),
        "resize" => Some(GestureKind::Resize),
        _ => None,
    }
}

#[must_use]
pub fn parse_panel_id(value: &str) -> Option<PanelId> {
    value.trim().parse::<u64>().ok().and_then(PanelId::new)
}

#[must_use]
pub fn parse_affordance_id(value: &str) -> Option<AffordanceId> {
    value.trim().parse::<u64>().ok().map(AffordanceId)
}

/// Attribute-presence selector, e.g. `[data-thread-opener-surface]`.
#[must_use]
pub fn has_attr(attr: &str) -> String {
    format!("[{attr}]")
}

/// Attribute-equals selector, e.g. `[data-thread-opener-frame="3"]`.
#[must_use]
pub fn attr_equals(attr: &str, value: impl core::fmt::Display) -> String {
    format!("[{attr}=\"{value}\"]")
}

/// Selector for a panel's root element.
#[must_use]
pub fn panel_root_selector(id: PanelId) -> String {
    format!(".{PANEL_CLASS}{}", attr_equals(PANEL_ID_ATTR, id))
}

/// Whether a host control's visible text is the reply label.
#[must_use]
pub fn is_reply_label(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(REPLY_LABEL)
}

/// A block's `class` value once our highlight classes are stripped, or `None`
/// when nothing else remains and the attribute should go.
#[must_use]
pub fn class_without_highlight(class: &str) -> Option<String> {
    let kept: Vec<&str> = class
        .split_ascii_whitespace()
        .filter(|name| *name != HIGHLIGHT_CLASS && *name != HIGHLIGHT_FADING_CLASS)
        .collect();
    (!kept.is_empty()).then(|| kept.join(" "))
}

#[must_use]
pub fn px(value: f64) -> String {
    format!("{}px", value.round())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{
        OBSERVED_ATTRIBUTES, SurfaceAction, class_without_highlight, handle_value, is_reply_label,
        panel_root_selector, parse_affordance_id, parse_handle, parse_panel_id, px,
    };
    use thread_opener_core::PanelId;
    use thread_opener_core::geometry::GestureKind;
    use thread_opener_core::hijack::AffordanceId;

    #[test]
    fn actions_round_trip_through_attribute_values() {
        for action in [
            SurfaceAction::Minimize,
            SurfaceAction::Close,
            SurfaceAction::Copy,
            SurfaceAction::OpenExternal,
            SurfaceAction::Expand,
        ] {
            assert_eq!(SurfaceAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(SurfaceAction::parse("delete"), None);
        assert_eq!(parse_handle(handle_value(GestureKind::Resize)), Some(GestureKind::Resize));
        assert_eq!(parse_handle("rotate"), None);
    }

    #[test]
    fn id_attributes_reject_garbage() {
        assert_eq!(parse_panel_id(" 12 "), PanelId::new(12));
        assert_eq!(parse_panel_id("0"), None);
        assert_eq!(parse_panel_id("abc"), None);
        assert_eq!(parse_affordance_id("4"), Some(AffordanceId(4)));
    }

    #[test]
    fn reply_label_matching_ignores_case_and_padding() {
        assert!(is_reply_label("  Reply "));
        assert!(is_reply_label("reply"));
        assert!(!is_reply_label("Reply all"));
        assert!(!is_reply_label(""));
    }

    #[test]
    fn observed_attributes_exclude_our_own_markers() {
        assert_eq!(OBSERVED_ATTRIBUTES, &["class", "style", "hidden"]);
        assert!(
            OBSERVED_ATTRIBUTES
                .iter()
                .all(|name| !name.starts_with("data-thread-opener"))
        );
    }

    #[test]
    fn clearing_highlight_leaves_no_empty_class_attribute() {
        assert_eq!(
            class_without_highlight("thread-opener-highlight thread-opener-highlight-fading"),
            None
        );
        assert_eq!(class_without_highlight(""), None);
        assert_eq!(
            class_without_highlight("prose  thread-opener-highlight my-2"),
            Some("prose my-2".to_owned())
        );
    }

    #[test]
    fn panel_selector_targets_root_class() {
        let id = PanelId::new(3).expect("non-zero");
        assert_eq!(
            panel_root_selector(id),
            ".thread-opener-panel[data-thread-opener-panel-id=\"3\"]"
        );
        assert_eq!(px(480.4), "480px");
    }
}
