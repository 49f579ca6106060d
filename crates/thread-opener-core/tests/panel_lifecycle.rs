#![forbid(unsafe_code)]

use core::time::Duration;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use thread_opener_core::handoff::{MemoryStore, handoff_key};
use thread_opener_core::host::TabView;
use thread_opener_core::keys::KeyInput;
use thread_opener_core::manager::{BLANK_PANEL_LABEL, INERT_URL};
use thread_opener_core::testing::MemoryHost;
use thread_opener_core::{
    HostError, LoadState, PanelId, PanelManager, ThreadOpenerConfig, VisualState,
};

type Manager = PanelManager<MemoryHost, MemoryStore>;

const CONTEXT: &str = "The quick brown fox jumps over the lazy dog near the riverbank.";

fn manager() -> Manager {
    PanelManager::new(
        MemoryHost::new(),
        MemoryStore::new(),
        ThreadOpenerConfig::default(),
    )
}

fn id(raw: u64) -> PanelId {
    PanelId::new(raw).expect("non-zero panel id")
}

fn expected_strip(manager: &Manager) -> Vec<TabView> {
    manager
        .panels()
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

fn assert_consistent(manager: &Manager) {
    let rendered: Vec<PanelId> = manager.host().mounted.keys().copied().collect();
    assert_eq!(rendered, manager.panel_ids(), "one surface per registry entry");
    assert_eq!(manager.host().tab_strip, expected_strip(manager));
    assert_eq!(manager.tab_strip(), expected_strip(manager));
    for panel in manager.panels() {
        let mounted = &manager.host().mounted[&panel.id];
        assert_eq!(mounted.visible, panel.is_visible());
    }
}

#[test]
fn open_renders_stages_and_copies() {
    let mut manager = manager();
    manager.host_mut().scroll_top = 1200.0;
    manager.host_mut().select(CONTEXT);

    let first = manager.open_panel(CONTEXT);
    assert_eq!(first, id(1));

    let panel = manager.panel(first).expect("panel registered");
    assert_eq!(panel.visual_state, VisualState::Visible);
    assert_eq!(panel.full_context, CONTEXT);
    assert_eq!(panel.origin_selected_text, CONTEXT);
    assert_eq!(panel.origin_scroll_top, 1200.0);
    assert_eq!(panel.load_state, LoadState::Loading);

    let host = manager.host();
    assert_eq!(host.selection, None, "selection cleared so the host affordance dismisses");
    let surface = &host.mounted[&first].surface;
    assert_eq!(surface.right, 20.0);
    assert_eq!(surface.top, 150.0);
    assert_eq!(
        host.navigations,
        vec![(
            first,
            "https://claude.ai/new?thread-opener=embedded#thread-opener-1".to_owned()
        )]
    );
    assert!(manager.handoff().store().contains_key(&handoff_key(first)));
    assert_eq!(
        host.clipboard,
        vec![format!("\"\"\"Context from my main thread:\n\"{CONTEXT}\"\n\"\"\"")]
    );
    assert!(host.mounted[&first].copy_hint);
    assert_consistent(&manager);
}

#[test]
fn surface_top_never_goes_above_the_margin() {
    let mut manager = manager();
    manager.host_mut().viewport_height = 500.0;
    let panel = manager.open_panel("");
    assert_eq!(manager.host().mounted[&panel].surface.top, 20.0);
}

#[test]
fn blank_panel_writes_no_handoff_and_no_clipboard() {
    let mut manager = manager();
    let blank = manager.open_panel("");
    assert!(manager.handoff().store().is_empty());
    assert!(manager.host().clipboard.is_empty());
    assert_eq!(
        manager.host().navigations,
        vec![(blank, "https://claude.ai/new?thread-opener=embedded".to_owned())]
    );
    assert!(manager.panel(blank).expect("registered").is_blank());
    assert!(!manager.recopy_context(blank));

    manager.minimize_panel(blank);
    assert_eq!(manager.tab_strip()[0].label, BLANK_PANEL_LABEL);
}

#[test]
fn ids_are_never_reused() {
    let mut manager = manager();
    let first = manager.open_panel(CONTEXT);
    manager.close_panel(first);
    let second = manager.open_panel(CONTEXT);
    assert_eq!(second, id(2));
}

#[test]
fn minimize_and_expand_maintain_the_strip() {
    let mut manager = manager();
    let a = manager.open_panel("first context that is long enough to keep");
    let b = manager.open_panel("");
    let c = manager.open_panel("third context that is long enough to keep");

    assert!(manager.minimize_panel(c));
    assert!(manager.minimize_panel(a));
    let strip: Vec<PanelId> = manager.tab_strip().iter().map(|tab| tab.id).collect();
    assert_eq!(strip, vec![a, c], "creation order, not minimize order");
    assert_consistent(&manager);

    assert!(manager.minimize_panel(a), "idempotent");
    assert_consistent(&manager);

    assert!(manager.expand_panel(a));
    assert!(manager.expand_panel(a), "idempotent");
    let strip: Vec<PanelId> = manager.tab_strip().iter().map(|tab| tab.id).collect();
    assert_eq!(strip, vec![c]);
    assert!(manager.panel(b).expect("b open").is_visible());
    assert_consistent(&manager);
}

#[test]
fn close_tears_down_embedded_document_and_handoff() {
    let mut manager = manager();
    let panel = manager.open_panel(CONTEXT);
    assert!(manager.close_panel(panel));

    let host = manager.host();
    assert_eq!(host.navigations.last(), Some(&(panel, INERT_URL.to_owned())));
    assert!(host.mounted.is_empty());
    assert!(!manager.handoff().store().contains_key(&handoff_key(panel)));
    assert!(manager.panel(panel).is_none());
    assert_consistent(&manager);
}

#[test]
fn unknown_and_closed_ids_are_no_ops() {
    let mut manager = manager();
    let open = manager.open_panel(CONTEXT);
    let closed = manager.open_panel(CONTEXT);
    manager.close_panel(closed);
    let before = manager.panel_ids();
    let navigations = manager.host().navigations.len();

    for stale in [closed, id(99)] {
        assert!(!manager.minimize_panel(stale));
        assert!(!manager.expand_panel(stale));
        assert!(!manager.close_panel(stale));
        assert!(!manager.on_embedded_loaded(stale));
        assert!(!manager.open_in_new_context(stale));
        assert!(!manager.recopy_context(stale));
    }
    assert_eq!(manager.panel_ids(), before);
    assert_eq!(manager.panel_ids(), vec![open]);
    assert_eq!(manager.host().navigations.len(), navigations);
}

#[test]
fn close_all_empties_registry_and_store() {
    let mut manager = manager();
    manager.open_panel(CONTEXT);
    let minimized = manager.open_panel(CONTEXT);
    manager.open_panel("");
    manager.minimize_panel(minimized);

    assert_eq!(manager.close_all(), 3);
    assert!(manager.panel_ids().is_empty());
    assert!(manager.handoff().store().is_empty());
    assert!(manager.host().tab_strip.is_empty());
    assert_eq!(manager.close_all(), 0);
    assert_consistent(&manager);
}

#[test]
fn clipboard_rejection_is_swallowed() {
    let mut manager = manager();
    manager.host_mut().reject_clipboard = true;
    let panel = manager.open_panel(CONTEXT);
    assert!(manager.host().clipboard.is_empty());
    assert!(!manager.host().mounted[&panel].copy_hint);
    assert!(manager.handoff().store().contains_key(&handoff_key(panel)));
}

#[test]
fn pending_clipboard_write_flashes_only_once_resolved() {
    let mut manager = manager();
    manager.host_mut().defer_clipboard = true;
    let resolved = manager.open_panel(CONTEXT);
    let rejected = manager.open_panel(CONTEXT);
    assert_eq!(manager.host().pending_clipboard.len(), 2);
    assert!(!manager.host().mounted[&resolved].copy_hint);

    manager.on_clipboard_settled(resolved, Ok(()));
    manager.on_clipboard_settled(
        rejected,
        Err(HostError::ClipboardRejected("permission denied".into())),
    );
    assert!(manager.host().mounted[&resolved].copy_hint);
    assert!(!manager.host().mounted[&rejected].copy_hint);

    manager.host_mut().advance(Duration::from_millis(1_500));
    manager.tick();
    assert!(!manager.host().mounted[&resolved].copy_hint);

    manager.close_panel(resolved);
    manager.on_clipboard_settled(resolved, Ok(()));
    assert_eq!(manager.next_wakeup(), Some(Duration::from_millis(5_000)));
}

#[test]
fn copy_hint_resets_after_flash() {
    let mut manager = manager();
    let panel = manager.open_panel(CONTEXT);
    manager.host_mut().advance(Duration::from_millis(1_499));
    manager.tick();
    assert!(manager.host().mounted[&panel].copy_hint);
    manager.host_mut().advance(Duration::from_millis(1));
    manager.tick();
    assert!(!manager.host().mounted[&panel].copy_hint);

    assert!(manager.recopy_context(panel));
    assert_eq!(manager.host().clipboard.len(), 2);
    assert!(manager.host().mounted[&panel].copy_hint);
}

#[test]
fn load_grace_shows_fallback_only_without_load_signal() {
    let mut manager = manager();
    let loaded = manager.open_panel(CONTEXT);
    let stuck = manager.open_panel(CONTEXT);
    assert!(manager.on_embedded_loaded(loaded));

    manager.host_mut().advance(Duration::from_millis(5_000));
    manager.tick();
    assert_eq!(manager.host().mounted[&loaded].load_state, LoadState::Ready);
    assert_eq!(manager.host().mounted[&stuck].load_state, LoadState::Failed);
    assert_eq!(manager.panel(stuck).map(|p| p.load_state), Some(LoadState::Failed));

    assert!(manager.open_in_new_context(stuck));
    assert_eq!(manager.host().external_opens, vec!["https://claude.ai/new".to_owned()]);
    assert!(manager.panel(stuck).is_none());
}

#[test]
fn grace_timer_for_closed_panel_is_dropped() {
    let mut manager = manager();
    let panel = manager.open_panel(CONTEXT);
    manager.close_panel(panel);
    manager.host_mut().advance(Duration::from_secs(10));
    manager.tick();
    assert!(manager.host().mounted.is_empty());
    assert_eq!(manager.next_wakeup(), None);
}

#[test]
fn keyboard_shortcuts_drive_the_manager() {
    let mut manager = manager();

    manager.host_mut().select("tiny");
    let open_from_selection = KeyInput::new("T").with_ctrl().with_shift();
    assert!(!manager.handle_key(&open_from_selection), "selection too short");
    assert!(manager.panel_ids().is_empty());

    manager.host_mut().scroll_top = 300.0;
    manager.host_mut().select(&format!("  {CONTEXT}  "));
    assert!(manager.handle_key(&open_from_selection));
    let from_selection = id(1);
    let panel = manager.panel(from_selection).expect("opened from selection");
    assert_eq!(panel.full_context, CONTEXT);
    assert_eq!(panel.origin_scroll_top, 300.0);

    assert!(manager.handle_key(&KeyInput::new("\\").with_meta()));
    let blank = id(2);
    assert!(manager.panel(blank).expect("blank panel").is_blank());

    let escape = KeyInput::new("Escape");
    assert!(manager.handle_key(&escape));
    assert_eq!(
        manager.panel(blank).map(|p| p.visual_state),
        Some(VisualState::Minimized),
        "most recently opened visible panel goes first"
    );
    assert!(manager.handle_key(&escape));
    assert!(!manager.handle_key(&escape), "nothing visible left");
    assert!(!manager.handle_key(&KeyInput::new("a")));
}

#[derive(Debug, Clone)]
enum Op {
    Open(bool),
    Minimize(u64),
    Expand(u64),
    Close(u64),
    Loaded(u64),
    CloseAll,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<bool>().prop_map(Op::Open),
        3 => (1u64..12).prop_map(Op::Minimize),
        2 => (1u64..12).prop_map(Op::Expand),
        2 => (1u64..12).prop_map(Op::Close),
        1 => (1u64..12).prop_map(Op::Loaded),
        1 => Just(Op::CloseAll),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn strip_always_matches_minimized_panels(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut manager = manager();
        let mut closed = Vec::new();
        for op in ops {
            match op {
                Op::Open(blank) => {
                    manager.open_panel(if blank { "" } else { CONTEXT });
                }
                Op::Minimize(raw) => {
                    manager.minimize_panel(id(raw));
                }
                Op::Expand(raw) => {
                    manager.expand_panel(id(raw));
                }
                Op::Close(raw) => {
                    if manager.close_panel(id(raw)) {
                        closed.push(id(raw));
                    }
                }
                Op::Loaded(raw) => {
                    manager.on_embedded_loaded(id(raw));
                }
                Op::CloseAll => {
                    closed.extend(manager.panel_ids());
                    manager.close_all();
                }
            }
            manager.host_mut().advance(Duration::from_millis(250));
            manager.tick();
            assert_consistent(&manager);
            for gone in &closed {
                prop_assert!(!manager.handoff().store().contains_key(&handoff_key(*gone)));
            }
        }
    }
}
