#![forbid(unsafe_code)]

//! In-memory host: a small element/text tree plus a recording [`PanelHost`].
//!
//! Everything the manager asks of the page is recorded in public fields so a
//! native harness can assert on surfaces, tab strips, clipboard writes, and
//! highlight phases without a browser.

use core::time::Duration;
use std::collections::BTreeMap;

use crate::error::HostError;
use crate::hijack::{AffordanceId, SelectionSnapshot};
use crate::host::{ClipboardWrite, HighlightPhase, PanelHost, PanelSurface, TabView};
use crate::panel::{LoadState, PanelId};
use crate::relocate::{BlockKind, TextTree};

/// Index of a node in a [`MemoryDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Element { tag: String },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeRecord {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    surface: bool,
}

/// Arena-backed document tree rooted at a `body` element.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<NodeRecord>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self {
            nodes: vec![NodeRecord {
                data: NodeData::Element {
                    tag: "body".to_owned(),
                },
                parent: None,
                children: Vec::new(),
                surface: false,
            }],
        }
    }
}

impl MemoryDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeRecord {
            data,
            parent: Some(parent),
            children: Vec::new(),
            surface: false,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append an element under `parent`.
    pub fn element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.push(
            parent,
            NodeData::Element {
                tag: tag.to_owned(),
            },
        )
    }

    /// Append a text node under `parent`.
    pub fn text(&mut self, parent: NodeId, content: &str) -> NodeId {
        self.push(parent, NodeData::Text(content.to_owned()))
    }

    /// Append `<tag>content</tag>` under `parent`, returning the element.
    pub fn block(&mut self, parent: NodeId, tag: &str, content: &str) -> NodeId {
        let element = self.element(parent, tag);
        self.text(element, content);
        element
    }

    /// Flag `node` as an extension-owned surface.
    pub fn mark_surface(&mut self, node: NodeId) {
        self.nodes[node.0].surface = true;
    }

    /// Unlink `node` from its parent (host re-render removing content).
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut Vec<NodeId>) {
        let record = &self.nodes[node.0];
        if matches!(record.data, NodeData::Text(_)) {
            out.push(node);
        }
        for child in &record.children {
            self.collect_text(*child, out);
        }
    }
}

impl TextTree for MemoryDocument {
    type Node = NodeId;

    fn text_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_text(self.root(), &mut out);
        out
    }

    fn node_text(&self, node: &NodeId) -> String {
        match &self.nodes[node.0].data {
            NodeData::Text(text) => text.clone(),
            NodeData::Element { .. } => String::new(),
        }
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn block_kind(&self, node: &NodeId) -> Option<BlockKind> {
        match &self.nodes[node.0].data {
            NodeData::Element { tag } => BlockKind::from_tag(tag),
            NodeData::Text(_) => None,
        }
    }

    fn in_extension_surface(&self, node: &NodeId) -> bool {
        let mut current = Some(*node);
        while let Some(id) = current {
            if self.nodes[id.0].surface {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }
}

/// A mounted panel surface as the memory host sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct MountedSurface {
    pub surface: PanelSurface,
    pub visible: bool,
    pub load_state: LoadState,
    pub copy_hint: bool,
}

/// Recording [`PanelHost`] over a [`MemoryDocument`].
#[derive(Debug, Clone)]
pub struct MemoryHost {
    pub document: MemoryDocument,
    pub now: Duration,
    pub viewport_height: f64,
    pub scroll_top: f64,
    /// Every `scroll_to` target, in order.
    pub scroll_requests: Vec<f64>,
    pub selection: Option<SelectionSnapshot>,
    pub selection_clears: usize,
    pub mounted: BTreeMap<PanelId, MountedSurface>,
    /// Every embedded navigation, in order.
    pub navigations: Vec<(PanelId, String)>,
    pub tab_strip: Vec<TabView>,
    pub clipboard: Vec<String>,
    /// When set, clipboard writes are rejected.
    pub reject_clipboard: bool,
    /// When set, clipboard writes settle later; see `pending_clipboard`.
    pub defer_clipboard: bool,
    pub pending_clipboard: Vec<(PanelId, String)>,
    pub external_opens: Vec<String>,
    /// Affordance instances the "page" currently renders.
    pub affordances: Vec<AffordanceId>,
    pub hijack_installs: Vec<AffordanceId>,
    /// Every highlight phase change, in order.
    pub highlight_log: Vec<(NodeId, HighlightPhase)>,
    pub scrolled_into_view: Vec<NodeId>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self {
            document: MemoryDocument::new(),
            now: Duration::ZERO,
            viewport_height: 900.0,
            scroll_top: 0.0,
            scroll_requests: Vec::new(),
            selection: None,
            selection_clears: 0,
            mounted: BTreeMap::new(),
            navigations: Vec::new(),
            tab_strip: Vec::new(),
            clipboard: Vec::new(),
            reject_clipboard: false,
            defer_clipboard: false,
            pending_clipboard: Vec::new(),
            external_opens: Vec::new(),
            affordances: Vec::new(),
            hijack_installs: Vec::new(),
            highlight_log: Vec::new(),
            scrolled_into_view: Vec::new(),
        }
    }
}

impl MemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(document: MemoryDocument) -> Self {
        Self {
            document,
            ..Self::default()
        }
    }

    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }

    /// Simulate the user selecting `text` at the current scroll position.
    pub fn select(&mut self, text: &str) {
        self.selection = Some(SelectionSnapshot {
            text: text.to_owned(),
            scroll_top: self.scroll_top,
            rect: None,
        });
    }

    /// Current highlight phase of `node`, if it was ever touched.
    #[must_use]
    pub fn highlight_phase(&self, node: NodeId) -> Option<HighlightPhase> {
        self.highlight_log
            .iter()
            .rev()
            .find(|(id, _)| *id == node)
            .map(|(_, phase)| *phase)
    }

    /// Blocks marked, in marking order.
    #[must_use]
    pub fn marked_blocks(&self) -> Vec<NodeId> {
        self.highlight_log
            .iter()
            .filter(|(_, phase)| *phase == HighlightPhase::Marked)
            .map(|(id, _)| *id)
            .collect()
    }
}

impl TextTree for MemoryHost {
    type Node = NodeId;

    fn text_nodes(&self) -> Vec<NodeId> {
        self.document.text_nodes()
    }

    fn node_text(&self, node: &NodeId) -> String {
        self.document.node_text(node)
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.document.parent(node)
    }

    fn block_kind(&self, node: &NodeId) -> Option<BlockKind> {
        self.document.block_kind(node)
    }

    fn in_extension_surface(&self, node: &NodeId) -> bool {
        self.document.in_extension_surface(node)
    }
}

impl PanelHost for MemoryHost {
    fn now(&self) -> Duration {
        self.now
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn scroll_to(&mut self, top: f64) {
        self.scroll_top = top;
        self.scroll_requests.push(top);
    }

    fn selection(&self) -> Option<SelectionSnapshot> {
        self.selection.clone()
    }

    fn clear_selection(&mut self) {
        self.selection = None;
        self.selection_clears += 1;
    }

    fn mount_panel(&mut self, surface: &PanelSurface) {
        self.mounted.insert(
            surface.id,
            MountedSurface {
                surface: surface.clone(),
                visible: true,
                load_state: LoadState::Loading,
                copy_hint: false,
            },
        );
    }

    fn set_panel_visible(&mut self, id: PanelId, visible: bool) {
        if let Some(mounted) = self.mounted.get_mut(&id) {
            mounted.visible = visible;
        }
    }

    fn set_load_state(&mut self, id: PanelId, state: LoadState) {
        if let Some(mounted) = self.mounted.get_mut(&id) {
            mounted.load_state = state;
        }
    }

    fn navigate_embedded(&mut self, id: PanelId, url: &str) {
        self.navigations.push((id, url.to_owned()));
    }

    fn unmount_panel(&mut self, id: PanelId) {
        self.mounted.remove(&id);
    }

    fn render_tab_strip(&mut self, tabs: &[TabView]) {
        self.tab_strip = tabs.to_vec();
    }

    fn set_copy_hint(&mut self, id: PanelId, flashing: bool) {
        if let Some(mounted) = self.mounted.get_mut(&id) {
            mounted.copy_hint = flashing;
        }
    }

    fn open_external(&mut self, url: &str) {
        self.external_opens.push(url.to_owned());
    }

    fn write_clipboard(
        &mut self,
        panel: PanelId,
        text: &str,
    ) -> Result<ClipboardWrite, HostError> {
        if self.reject_clipboard {
            return Err(HostError::ClipboardRejected("document is not focused".into()));
        }
        if self.defer_clipboard {
            self.pending_clipboard.push((panel, text.to_owned()));
            return Ok(ClipboardWrite::Pending);
        }
        self.clipboard.push(text.to_owned());
        Ok(ClipboardWrite::Written)
    }

    fn reply_affordances(&mut self) -> Vec<AffordanceId> {
        self.affordances.clone()
    }

    fn install_hijack(&mut self, affordance: AffordanceId) {
        self.hijack_installs.push(affordance);
    }

    fn set_highlight(&mut self, block: &NodeId, phase: HighlightPhase) {
        self.highlight_log.push((*block, phase));
    }

    fn scroll_block_into_view(&mut self, block: &NodeId) {
        self.scrolled_into_view.push(*block);
    }
}
