#![forbid(unsafe_code)]

use core::time::Duration;

use thread_opener_core::handoff::{MemoryStore, handoff_key};
use thread_opener_core::hijack::AffordanceId;
use thread_opener_core::testing::MemoryHost;
use thread_opener_core::{PanelId, PanelManager, ThreadOpenerConfig};

type Manager = PanelManager<MemoryHost, MemoryStore>;

fn manager() -> Manager {
    PanelManager::new(
        MemoryHost::new(),
        MemoryStore::new(),
        ThreadOpenerConfig::default(),
    )
}

#[test]
fn selection_to_panel_scenario() {
    let mut manager = manager();
    manager.host_mut().scroll_top = 640.0;
    manager.host_mut().select("fifteen chars!!");
    manager.host_mut().affordances = vec![AffordanceId(7)];

    assert!(manager.on_selection_gesture());
    assert_eq!(manager.host().hijack_installs, vec![AffordanceId(7)]);
    assert_eq!(manager.observer_count(), 0, "found on the synchronous attempt");

    let panel = manager
        .activate_hijack(AffordanceId(7))
        .expect("hijacked click opens a panel");
    assert_eq!(panel, PanelId::FIRST);
    assert!(
        manager
            .handoff()
            .store()
            .contains_key(&handoff_key(PanelId::FIRST))
    );
    let (_, url) = &manager.host().navigations[0];
    assert!(url.ends_with("#thread-opener-1"), "unexpected target {url}");
    assert_eq!(
        manager.panel(panel).map(|p| p.origin_scroll_top),
        Some(640.0)
    );
}

#[test]
fn affordance_rendered_later_is_caught_by_mutation_batch() {
    let mut manager = manager();
    manager.host_mut().select("a selection that is long enough");
    assert!(manager.on_selection_gesture());
    assert_eq!(manager.observer_count(), 1);
    assert!(!manager.on_selection_gesture(), "one watch at a time");

    manager.on_mutations();
    assert!(manager.host().hijack_installs.is_empty());

    manager.host_mut().affordances = vec![AffordanceId(1)];
    manager.on_mutations();
    assert_eq!(manager.host().hijack_installs, vec![AffordanceId(1)]);
    assert_eq!(manager.observer_count(), 0);
}

#[test]
fn watch_stops_observing_at_its_deadline() {
    let mut manager = manager();
    manager.host_mut().select("a selection that is long enough");
    manager.on_selection_gesture();
    assert_eq!(manager.next_wakeup(), Some(Duration::from_millis(3_000)));

    manager.host_mut().advance(Duration::from_millis(2_999));
    manager.tick();
    assert_eq!(manager.observer_count(), 1);

    manager.host_mut().advance(Duration::from_millis(1));
    manager.tick();
    assert_eq!(manager.observer_count(), 0);

    manager.host_mut().affordances = vec![AffordanceId(3)];
    manager.on_mutations();
    assert!(manager.host().hijack_installs.is_empty(), "no retry after timeout");
}

#[test]
fn instance_is_never_hijacked_twice() {
    let mut manager = manager();
    manager.host_mut().affordances = vec![AffordanceId(5)];
    manager.host_mut().select("a selection that is long enough");
    manager.on_selection_gesture();
    manager.host_mut().select("another selection long enough");
    manager.on_selection_gesture();
    assert_eq!(manager.host().hijack_installs, vec![AffordanceId(5)]);
    assert_eq!(manager.observer_count(), 1, "still watching for a fresh instance");

    manager.host_mut().affordances = vec![AffordanceId(6)];
    manager.on_mutations();
    assert_eq!(
        manager.host().hijack_installs,
        vec![AffordanceId(5), AffordanceId(6)]
    );
}

#[test]
fn reused_instance_opens_with_latest_selection() {
    let mut manager = manager();
    manager.host_mut().affordances = vec![AffordanceId(5)];
    manager.host_mut().select("first selection long enough");
    manager.on_selection_gesture();

    manager.host_mut().scroll_top = 1_200.0;
    manager.host_mut().select("SECOND selection long enough");
    manager.on_selection_gesture();
    assert_eq!(manager.host().hijack_installs, vec![AffordanceId(5)]);

    let panel = manager
        .activate_hijack(AffordanceId(5))
        .expect("hijacked click opens a panel");
    let opened = manager.panel(panel).expect("panel is registered");
    assert_eq!(opened.full_context, "SECOND selection long enough");
    assert_eq!(opened.origin_scroll_top, 1_200.0);
}

#[test]
fn short_selection_leaves_affordance_alone() {
    let mut manager = manager();
    manager.host_mut().affordances = vec![AffordanceId(2)];
    manager.host_mut().select("too short");
    manager.on_selection_gesture();
    assert!(manager.host().hijack_installs.is_empty());
    assert_eq!(manager.observer_count(), 0);
    assert_eq!(manager.activate_hijack(AffordanceId(2)), None);
}

#[test]
fn visible_panel_suppresses_hijack_until_minimized() {
    let mut manager = manager();
    let open = manager.open_panel("");
    manager.host_mut().affordances = vec![AffordanceId(4)];
    manager.host_mut().select("a selection that is long enough");
    manager.on_selection_gesture();
    assert!(manager.host().hijack_installs.is_empty());

    manager.minimize_panel(open);
    manager.on_selection_gesture();
    assert_eq!(manager.host().hijack_installs, vec![AffordanceId(4)]);
}

#[test]
fn departed_instances_release_their_guard() {
    let mut manager = manager();
    manager.host_mut().affordances = vec![AffordanceId(8)];
    manager.host_mut().select("a selection that is long enough");
    manager.on_selection_gesture();

    manager.host_mut().affordances.clear();
    manager.host_mut().select("a selection that is long enough");
    manager.on_selection_gesture();
    assert_eq!(manager.activate_hijack(AffordanceId(8)), None);
}
