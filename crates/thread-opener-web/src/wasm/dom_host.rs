#![forbid(unsafe_code)]

//! [`PanelHost`] over the live chat page.
//!
//! Rendering failures are logged and swallowed: a panel that failed to paint
//! must not take the manager's bookkeeping down with it.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

use thread_opener_core::geometry::{Frame, GeometryUpdate, GestureKind};
use thread_opener_core::hijack::{AffordanceId, SelectionSnapshot};
use thread_opener_core::host::{ClipboardWrite, HighlightPhase, PanelHost, PanelSurface, TabView};
use thread_opener_core::relocate::{BlockKind, TextTree};
use thread_opener_core::{HostError, LoadState, PanelId};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Document, Element, HtmlElement, HtmlIFrameElement, Node, ScrollBehavior,
    ScrollIntoViewOptions, ScrollLogicalPosition, ScrollToOptions, Window,
};
use web_time::Instant;

use crate::dom_names::{
    ACTION_ATTR, AFFORDANCE_ATTR, BODY_CLASS, BUTTON_CLASS, DRAGGING_CLASS, ERROR_CLASS,
    FLASH_CLASS, FRAME_ATTR, HANDLE_ATTR, HEADER_CLASS, HIGHLIGHT_CLASS, HIGHLIGHT_FADING_CLASS,
    HIJACK_ATTR, HIJACKED_LABEL, LOAD_STATE_ATTR, LOADING_CLASS, PANEL_CLASS, PANEL_ID_ATTR,
    RESIZE_CLASS, RESIZING_CLASS, SCROLL_CONTAINER_SELECTORS, SURFACE_ATTR, SurfaceAction,
    TAB_CLASS, TAB_STRIP_ID, VISIBLE_CLASS, attr_equals, class_without_highlight, handle_value,
    has_attr, is_reply_label, panel_root_selector, parse_affordance_id, px,
};

const STYLE_ID: &str = "thread-opener-style";
const SHOW_TEXT: u32 = 0x4;

const STYLESHEET: &str = r#"
.thread-opener-panel{position:fixed;z-index:2147483000;display:none;flex-direction:column;
  background:#fff;border:1px solid rgba(0,0,0,.15);border-radius:10px;
  box-shadow:0 12px 40px rgba(0,0,0,.25);overflow:hidden}
.thread-opener-panel.visible{display:flex}
.thread-opener-panel.dragging,.thread-opener-panel.resizing{user-select:none}
.thread-opener-panel.dragging iframe,.thread-opener-panel.resizing iframe{pointer-events:none}
.thread-opener-header{display:flex;align-items:center;gap:8px;padding:6px 10px;cursor:move;
  background:#f4f3ee;border-bottom:1px solid rgba(0,0,0,.08);font:13px system-ui,sans-serif}
.thread-opener-title{flex:1;overflow:hidden;white-space:nowrap;text-overflow:ellipsis}
.thread-opener-btn{cursor:pointer;border:0;background:transparent;padding:2px 6px;border-radius:4px}
.thread-opener-btn:hover{background:rgba(0,0,0,.08)}
.thread-opener-btn.flash{background:#c6f6d5}
.thread-opener-body{position:relative;flex:1}
.thread-opener-body iframe{width:100%;height:100%;border:0}
.thread-opener-loading,.thread-opener-error{position:absolute;inset:0;display:none;
  align-items:center;justify-content:center;flex-direction:column;gap:8px;font:13px system-ui,sans-serif}
[data-thread-opener-load="loading"] .thread-opener-loading{display:flex}
[data-thread-opener-load="loading"] iframe{visibility:hidden}
[data-thread-opener-load="failed"] .thread-opener-error{display:flex}
[data-thread-opener-load="failed"] iframe{visibility:hidden}
.thread-opener-resize{position:absolute;left:0;bottom:0;width:14px;height:14px;cursor:nesw-resize}
#thread-opener-tabs{position:fixed;right:20px;bottom:20px;z-index:2147483000;display:flex;gap:6px;
  font:12px system-ui,sans-serif}
#thread-opener-tabs:empty{display:none}
.thread-opener-tab{display:flex;align-items:center;gap:4px;max-width:180px;padding:4px 8px;cursor:pointer;
  background:#fff;border:1px solid rgba(0,0,0,.15);border-radius:14px}
.thread-opener-tab span{overflow:hidden;white-space:nowrap;text-overflow:ellipsis}
.thread-opener-highlight{background-color:rgba(255,214,10,.35);transition:background-color .8s ease}
.thread-opener-highlight.thread-opener-highlight-fading{background-color:transparent}
"#;

fn load_state_value(state: LoadState) -> &'static str {
    match state {
        LoadState::Loading => "loading",
        LoadState::Ready => "ready",
        LoadState::Failed => "failed",
    }
}

type ClipboardOutcome = (PanelId, Result<(), HostError>);

/// The chat page, seen through the manager's host seam.
pub(crate) struct DomHost {
    window: Window,
    document: Document,
    epoch: Instant,
    next_affordance: u64,
    settled_clipboard: Rc<RefCell<Vec<ClipboardOutcome>>>,
    clipboard_waker: Option<js_sys::Function>,
}

impl DomHost {
    pub(crate) fn new(window: Window, document: Document) -> Self {
        let host = Self {
            window,
            document,
            epoch: Instant::now(),
            next_affordance: 1,
            settled_clipboard: Rc::default(),
            clipboard_waker: None,
        };
        if let Err(err) = host.ensure_stylesheet() {
            warn!(error = ?err, "failed to inject panel styles");
        }
        host
    }

    fn ensure_stylesheet(&self) -> Result<(), JsValue> {
        if self.document.get_element_by_id(STYLE_ID).is_some() {
            return Ok(());
        }
        let style = self.document.create_element("style")?;
        style.set_id(STYLE_ID);
        style.set_text_content(Some(STYLESHEET));
        let parent: Node = match self.document.body() {
            Some(body) => body.into(),
            None => self
                .document
                .document_element()
                .ok_or_else(|| JsValue::from_str("document has no root element"))?
                .into(),
        };
        parent.append_child(&style)?;
        Ok(())
    }

    fn query(&self, selector: &str) -> Option<Element> {
        self.document.query_selector(selector).ok().flatten()
    }

    fn html(&self, tag: &str, class: &str) -> Result<HtmlElement, JsValue> {
        let element = self
            .document
            .create_element(tag)?
            .dyn_into::<HtmlElement>()
            .map_err(JsValue::from)?;
        if !class.is_empty() {
            element.set_class_name(class);
        }
        Ok(element)
    }

    fn action_button(
        &self,
        action: SurfaceAction,
        glyph: &str,
        title: &str,
    ) -> Result<HtmlElement, JsValue> {
        let button = self.html("button", BUTTON_CLASS)?;
        button.set_attribute("type", "button")?;
        button.set_attribute(ACTION_ATTR, action.as_str())?;
        button.set_title(title);
        button.set_text_content(Some(glyph));
        Ok(button)
    }

    fn panel_root(&self, id: PanelId) -> Option<HtmlElement> {
        self.query(&panel_root_selector(id))?
            .dyn_into::<HtmlElement>()
            .ok()
    }

    fn panel_frame_element(&self, id: PanelId) -> Option<HtmlIFrameElement> {
        self.query(&attr_equals(FRAME_ATTR, id))?
            .dyn_into::<HtmlIFrameElement>()
            .ok()
    }

    fn scroll_container(&self) -> Option<Element> {
        SCROLL_CONTAINER_SELECTORS
            .iter()
            .find_map(|selector| self.query(selector))
            .or_else(|| self.document.scrolling_element())
    }

    fn build_panel(&self, surface: &PanelSurface) -> Result<HtmlElement, JsValue> {
        let id = surface.id.to_string();
        let root = self.html("div", &format!("{PANEL_CLASS} {VISIBLE_CLASS}"))?;
        root.set_attribute(SURFACE_ATTR, "")?;
        root.set_attribute(PANEL_ID_ATTR, &id)?;
        root.set_attribute(LOAD_STATE_ATTR, load_state_value(LoadState::Loading))?;
        let style = root.style();
        style.set_property("top", &px(surface.top))?;
        style.set_property("right", &px(surface.right))?;
        style.set_property("width", &px(surface.width))?;
        style.set_property("height", &px(surface.height))?;

        let header = self.html("div", HEADER_CLASS)?;
        header.set_attribute(HANDLE_ATTR, handle_value(GestureKind::Drag))?;
        let title = self.html("span", "thread-opener-title")?;
        title.set_text_content(Some(&surface.label));
        title.set_title(&surface.label);
        header.append_child(&title)?;
        if !surface.blank {
            header.append_child(&self.action_button(
                SurfaceAction::Copy,
                "Copy",
                "Copy the selected context again",
            )?)?;
        }
        header.append_child(&self.action_button(SurfaceAction::Minimize, "\u{2212}", "Minimize")?)?;
        header.append_child(&self.action_button(SurfaceAction::Close, "\u{00d7}", "Close")?)?;
        root.append_child(&header)?;

        let body = self.html("div", BODY_CLASS)?;
        let loading = self.html("div", LOADING_CLASS)?;
        loading.set_text_content(Some("Loading thread\u{2026}"));
        body.append_child(&loading)?;

        let error = self.html("div", ERROR_CLASS)?;
        let message = self.html("span", "")?;
        message.set_text_content(Some("This thread could not be shown inside the panel."));
        error.append_child(&message)?;
        error.append_child(&self.action_button(
            SurfaceAction::OpenExternal,
            "Open in new tab",
            "Open this thread in a new tab",
        )?)?;
        body.append_child(&error)?;

        let frame = self
            .document
            .create_element("iframe")?
            .dyn_into::<HtmlIFrameElement>()
            .map_err(JsValue::from)?;
        frame.set_attribute(FRAME_ATTR, &id)?;
        frame.set_attribute("allow", "clipboard-read; clipboard-write")?;
        body.append_child(&frame)?;
        root.append_child(&body)?;

        let resize = self.html("div", RESIZE_CLASS)?;
        resize.set_attribute(HANDLE_ATTR, handle_value(GestureKind::Resize))?;
        root.append_child(&resize)?;
        Ok(root)
    }

    fn tab_strip(&self) -> Result<HtmlElement, JsValue> {
        if let Some(existing) = self.document.get_element_by_id(TAB_STRIP_ID) {
            return existing.dyn_into::<HtmlElement>().map_err(JsValue::from);
        }
        let strip = self.html("div", "")?;
        strip.set_id(TAB_STRIP_ID);
        strip.set_attribute(SURFACE_ATTR, "")?;
        self.document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?
            .append_child(&strip)?;
        Ok(strip)
    }

    fn build_tab(&self, tab: &TabView) -> Result<HtmlElement, JsValue> {
        let element = self.html("div", TAB_CLASS)?;
        element.set_attribute(PANEL_ID_ATTR, &tab.id.to_string())?;
        element.set_attribute(ACTION_ATTR, SurfaceAction::Expand.as_str())?;
        element.set_title(&tab.label);
        let label = self.html("span", "")?;
        label.set_text_content(Some(&tab.label));
        element.append_child(&label)?;
        element.append_child(&self.action_button(SurfaceAction::Close, "\u{00d7}", "Close")?)?;
        Ok(element)
    }

    fn paint_tabs(&self, tabs: &[TabView]) -> Result<(), JsValue> {
        let strip = self.tab_strip()?;
        strip.set_inner_html("");
        for tab in tabs {
            strip.append_child(&self.build_tab(tab)?)?;
        }
        Ok(())
    }

    /// Called once a clipboard write settles so the outcome is drained promptly.
    pub(crate) fn set_clipboard_waker(&mut self, wake: js_sys::Function) {
        self.clipboard_waker = Some(wake);
    }

    /// Clipboard writes that settled since the last call.
    pub(crate) fn take_settled_clipboard(&self) -> Vec<ClipboardOutcome> {
        core::mem::take(&mut *self.settled_clipboard.borrow_mut())
    }

    /// Current on-screen frame of a panel.
    pub(crate) fn panel_frame(&self, id: PanelId) -> Option<Frame> {
        let rect = self.panel_root(id)?.get_bounding_client_rect();
        Some(Frame {
            left: rect.left(),
            top: rect.top(),
            width: rect.width(),
            height: rect.height(),
        })
    }

    pub(crate) fn apply_geometry(&self, update: GeometryUpdate<PanelId>) {
        let result = match update {
            GeometryUpdate::Moved { target, left, top } => self.panel_root(target).map(|root| {
                let style = root.style();
                style.set_property("left", &px(left))?;
                style.set_property("top", &px(top))?;
                style.set_property("right", "auto")
            }),
            GeometryUpdate::Resized {
                target,
                width,
                height,
            } => self.panel_root(target).map(|root| {
                let style = root.style();
                style.set_property("width", &px(width))?;
                style.set_property("height", &px(height))
            }),
        };
        if let Some(Err(err)) = result {
            warn!(error = ?err, "failed to apply panel geometry");
        }
    }

    pub(crate) fn set_gesture_active(&self, id: PanelId, kind: GestureKind, active: bool) {
        let class = match kind {
            GestureKind::Drag => DRAGGING_CLASS,
            GestureKind::Resize => RESIZING_CLASS,
        };
        if let Some(root) = self.panel_root(id) {
            let _ = root.class_list().toggle_with_force(class, active);
        }
    }
}

impl TextTree for DomHost {
    type Node = Node;

    fn text_nodes(&self) -> Vec<Node> {
        let Some(body) = self.document.body() else {
            return Vec::new();
        };
        let Ok(walker) = self
            .document
            .create_tree_walker_with_what_to_show(&body, SHOW_TEXT)
        else {
            return Vec::new();
        };
        let mut nodes = Vec::new();
        while let Ok(Some(node)) = walker.next_node() {
            nodes.push(node);
        }
        nodes
    }

    fn node_text(&self, node: &Node) -> String {
        node.text_content().unwrap_or_default()
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn block_kind(&self, node: &Node) -> Option<BlockKind> {
        node.dyn_ref::<Element>()
            .and_then(|element| BlockKind::from_tag(&element.tag_name()))
    }

    fn in_extension_surface(&self, node: &Node) -> bool {
        let element = match node.dyn_ref::<Element>() {
            Some(element) => Some(element.clone()),
            None => node.parent_element(),
        };
        element
            .and_then(|element| element.closest(&has_attr(SURFACE_ATTR)).ok().flatten())
            .is_some()
    }
}

impl PanelHost for DomHost {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn viewport_height(&self) -> f64 {
        self.window
            .inner_height()
            .ok()
            .and_then(|height| height.as_f64())
            .unwrap_or(0.0)
    }

    fn scroll_top(&self) -> f64 {
        self.scroll_container()
            .map_or(0.0, |container| f64::from(container.scroll_top()))
    }

    fn scroll_to(&mut self, top: f64) {
        let Some(container) = self.scroll_container() else {
            return;
        };
        let options = ScrollToOptions::new();
        options.set_top(top);
        options.set_behavior(ScrollBehavior::Smooth);
        container.scroll_to_with_scroll_to_options(&options);
    }

    fn selection(&self) -> Option<SelectionSnapshot> {
        let selection = self.window.get_selection().ok().flatten()?;
        let text = String::from(selection.to_string());
        if text.trim().is_empty() {
            return None;
        }
        let rect = if selection.range_count() > 0 {
            selection.get_range_at(0).ok().map(|range| {
                let rect = range.get_bounding_client_rect();
                Frame {
                    left: rect.left(),
                    top: rect.top(),
                    width: rect.width(),
                    height: rect.height(),
                }
            })
        } else {
            None
        };
        Some(SelectionSnapshot {
            text,
            scroll_top: self.scroll_top(),
            rect,
        })
    }

    fn clear_selection(&mut self) {
        if let Ok(Some(selection)) = self.window.get_selection() {
            let _ = selection.remove_all_ranges();
        }
    }

    fn mount_panel(&mut self, surface: &PanelSurface) {
        let mounted = self.build_panel(surface).and_then(|root| {
            self.document
                .body()
                .ok_or_else(|| JsValue::from_str("document has no body"))?
                .append_child(&root)
        });
        if let Err(err) = mounted {
            warn!(panel_id = %surface.id, error = ?err, "failed to mount panel");
        }
    }

    fn set_panel_visible(&mut self, id: PanelId, visible: bool) {
        if let Some(root) = self.panel_root(id) {
            let _ = root.class_list().toggle_with_force(VISIBLE_CLASS, visible);
        }
    }

    fn set_load_state(&mut self, id: PanelId, state: LoadState) {
        if let Some(root) = self.panel_root(id) {
            let _ = root.set_attribute(LOAD_STATE_ATTR, load_state_value(state));
        }
    }

    fn navigate_embedded(&mut self, id: PanelId, url: &str) {
        match self.panel_frame_element(id) {
            Some(frame) => frame.set_src(url),
            None => debug!(panel_id = %id, "no embedded frame to navigate"),
        }
    }

    fn unmount_panel(&mut self, id: PanelId) {
        if let Some(root) = self.panel_root(id) {
            root.remove();
        }
    }

    fn render_tab_strip(&mut self, tabs: &[TabView]) {
        if let Err(err) = self.paint_tabs(tabs) {
            warn!(error = ?err, "failed to render tab strip");
        }
    }

    fn set_copy_hint(&mut self, id: PanelId, flashing: bool) {
        let selector = format!(
            "{} {}",
            panel_root_selector(id),
            attr_equals(ACTION_ATTR, SurfaceAction::Copy.as_str())
        );
        if let Some(button) = self.query(&selector) {
            let _ = button.class_list().toggle_with_force(FLASH_CLASS, flashing);
        }
    }

    fn open_external(&mut self, url: &str) {
        if let Err(err) = self.window.open_with_url_and_target(url, "_blank") {
            warn!(error = ?err, "failed to open thread in a new tab");
        }
    }

    fn write_clipboard(
        &mut self,
        panel: PanelId,
        text: &str,
    ) -> Result<ClipboardWrite, HostError> {
        let promise = self.window.navigator().clipboard().write_text(text);
        let settled = Rc::clone(&self.settled_clipboard);
        let waker = self.clipboard_waker.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let result = JsFuture::from(promise)
                .await
                .map(|_| ())
                .map_err(|err| HostError::ClipboardRejected(format!("{err:?}")));
            settled.borrow_mut().push((panel, result));
            if let Some(wake) = waker
                && let Err(err) = wake.call0(&JsValue::NULL)
            {
                warn!(error = ?err, "failed to deliver clipboard outcome");
            }
        });
        Ok(ClipboardWrite::Pending)
    }

    fn reply_affordances(&mut self) -> Vec<AffordanceId> {
        let Ok(buttons) = self.document.query_selector_all("button") else {
            return Vec::new();
        };
        let mut present = Vec::new();
        for index in 0..buttons.length() {
            let Some(button) = buttons
                .item(index)
                .and_then(|node| node.dyn_into::<Element>().ok())
            else {
                continue;
            };
            let stamped = button
                .get_attribute(AFFORDANCE_ATTR)
                .and_then(|value| parse_affordance_id(&value));
            if button.has_attribute(HIJACK_ATTR) {
                present.extend(stamped);
                continue;
            }
            let in_surface = button
                .closest(&has_attr(SURFACE_ATTR))
                .ok()
                .flatten()
                .is_some();
            if in_surface || !is_reply_label(&button.text_content().unwrap_or_default()) {
                continue;
            }
            let id = match stamped {
                Some(id) => id,
                None => {
                    let id = AffordanceId(self.next_affordance);
                    self.next_affordance += 1;
                    let _ = button.set_attribute(AFFORDANCE_ATTR, &id.to_string());
                    id
                }
            };
            present.push(id);
        }
        present
    }

    fn install_hijack(&mut self, affordance: AffordanceId) {
        let Some(button) = self
            .query(&attr_equals(AFFORDANCE_ATTR, affordance))
            .and_then(|element| element.dyn_into::<HtmlElement>().ok())
        else {
            debug!(%affordance, "affordance left before takeover");
            return;
        };
        let _ = button.set_attribute(HIJACK_ATTR, "");
        let _ = button.set_attribute(SURFACE_ATTR, "");
        button.set_title("Open the selection in a side thread");
        button.set_text_content(Some(HIJACKED_LABEL));
    }

    fn set_highlight(&mut self, block: &Node, phase: HighlightPhase) {
        let Some(element) = block.dyn_ref::<Element>() else {
            return;
        };
        let classes = element.class_list();
        let _ = match phase {
            HighlightPhase::Marked => classes
                .remove_1(HIGHLIGHT_FADING_CLASS)
                .and_then(|()| classes.add_1(HIGHLIGHT_CLASS)),
            HighlightPhase::Fading => classes.add_1(HIGHLIGHT_FADING_CLASS),
            HighlightPhase::Cleared => {
                let class = element.get_attribute("class").unwrap_or_default();
                match class_without_highlight(&class) {
                    Some(kept) => element.set_attribute("class", &kept),
                    None => element.remove_attribute("class"),
                }
            }
        };
    }

    fn scroll_block_into_view(&mut self, block: &Node) {
        let Some(element) = block.dyn_ref::<Element>() else {
            return;
        };
        let options = ScrollIntoViewOptions::new();
        options.set_behavior(ScrollBehavior::Smooth);
        options.set_block(ScrollLogicalPosition::Center);
        element.scroll_into_view_with_scroll_into_view_options(&options);
    }
}
