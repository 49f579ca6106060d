#![forbid(unsafe_code)]

use core::time::Duration;

use pretty_assertions::assert_eq;
use thread_opener_core::handoff::MemoryStore;
use thread_opener_core::host::HighlightPhase;
use thread_opener_core::relocate::{RelocateConfig, locate_blocks};
use thread_opener_core::testing::{MemoryDocument, MemoryHost, NodeId};
use thread_opener_core::{PanelManager, ThreadOpenerConfig};

const ONE: &str = "A unique 40+ character paragraph one.";
const TWO: &str = "A unique 40+ character paragraph two.";

fn locate(document: &MemoryDocument, text: &str) -> Vec<NodeId> {
    locate_blocks(document, text, RelocateConfig::default())
}

#[test]
fn fragments_resolve_in_document_order() {
    let mut doc = MemoryDocument::new();
    let root = doc.root();
    let article = doc.element(root, "article");
    doc.block(article, "h2", "Heading that is not part of the selection");
    let first = doc.block(article, "p", ONE);
    let second = doc.block(article, "li", TWO);

    assert_eq!(locate(&doc, &format!("{ONE}\n\n{TWO}")), vec![first, second]);
}

#[test]
fn later_fragment_never_matches_earlier_duplicate() {
    let mut doc = MemoryDocument::new();
    let root = doc.root();
    let early_two = doc.block(root, "p", TWO);
    let one = doc.block(root, "p", ONE);
    let two = doc.block(root, "p", TWO);
    let late_one = doc.block(root, "p", ONE);

    let blocks = locate(&doc, &format!("{ONE}\n\n{TWO}"));
    assert_eq!(blocks, vec![one, two]);
    assert!(!blocks.contains(&early_two));
    assert!(!blocks.contains(&late_one));
}

#[test]
fn short_fragment_alone_highlights_nothing() {
    let mut doc = MemoryDocument::new();
    let root = doc.root();
    doc.block(root, "p", "[1] short cite");
    assert!(locate(&doc, "  [1] short cite  ").is_empty());
}

#[test]
fn text_inside_extension_surfaces_is_skipped() {
    let mut doc = MemoryDocument::new();
    let root = doc.root();
    let tabs = doc.element(root, "div");
    doc.mark_surface(tabs);
    doc.block(tabs, "div", ONE);
    let original = doc.block(root, "p", ONE);
    assert_eq!(locate(&doc, ONE), vec![original]);
}

#[test]
fn inline_text_walks_up_to_nearest_block_once() {
    let mut doc = MemoryDocument::new();
    let root = doc.root();
    let quote = doc.element(root, "blockquote");
    let strong = doc.element(quote, "strong");
    doc.text(strong, ONE);
    doc.text(quote, TWO);

    assert_eq!(locate(&doc, &format!("{ONE}\n\n{TWO}")), vec![quote]);
}

#[test]
fn code_block_of_short_lines_is_located_whole() {
    const CODE: &str = "fn main() {\n    let x = 1;\n    go(x);\n}";
    let mut doc = MemoryDocument::new();
    let root = doc.root();
    doc.block(root, "p", "Run this:");
    let pre = doc.block(root, "pre", CODE);

    assert_eq!(locate(&doc, CODE), vec![pre]);
    assert_eq!(locate(&doc, &format!("Run this:\n\n{CODE}\n")), vec![pre]);
}

#[test]
fn removed_content_matches_nothing() {
    let mut doc = MemoryDocument::new();
    let root = doc.root();
    let gone = doc.block(root, "p", ONE);
    doc.detach(gone);
    assert!(locate(&doc, ONE).is_empty());
}

#[test]
fn expand_scrolls_then_highlights_then_fades_then_clears() {
    let mut doc = MemoryDocument::new();
    let root = doc.root();
    let first = doc.block(root, "p", ONE);
    let second = doc.block(root, "p", TWO);

    let mut host = MemoryHost::with_document(doc);
    host.scroll_top = 1500.0;
    let mut manager =
        PanelManager::new(host, MemoryStore::new(), ThreadOpenerConfig::default());
    let panel = manager.open_panel(&format!("{ONE}\n\n{TWO}"));
    manager.minimize_panel(panel);
    manager.host_mut().scroll_top = 0.0;
    manager.host_mut().advance(Duration::from_secs(10));
    manager.tick();

    assert!(manager.expand_panel(panel));
    assert_eq!(manager.host().scroll_requests, vec![1200.0], "1500 - 900/3");
    assert!(manager.host().highlight_log.is_empty(), "waits for scroll to settle");

    manager.host_mut().advance(Duration::from_millis(500));
    manager.tick();
    assert_eq!(manager.host().marked_blocks(), vec![first, second]);
    assert_eq!(manager.host().scrolled_into_view, vec![first]);

    manager.host_mut().advance(Duration::from_millis(2_000));
    manager.tick();
    assert_eq!(manager.host().highlight_phase(first), Some(HighlightPhase::Fading));

    manager.host_mut().advance(Duration::from_millis(800));
    manager.tick();
    assert_eq!(manager.host().highlight_phase(first), Some(HighlightPhase::Cleared));
    assert_eq!(manager.host().highlight_phase(second), Some(HighlightPhase::Cleared));
    assert_eq!(manager.next_wakeup(), None);
}

#[test]
fn new_relocation_clears_previous_highlight() {
    let mut doc = MemoryDocument::new();
    let root = doc.root();
    let first = doc.block(root, "p", ONE);
    let second = doc.block(root, "p", TWO);

    let mut manager = PanelManager::new(
        MemoryHost::with_document(doc),
        MemoryStore::new(),
        ThreadOpenerConfig::default(),
    );
    let a = manager.open_panel(ONE);
    let b = manager.open_panel(TWO);
    manager.minimize_panel(a);
    manager.minimize_panel(b);

    manager.expand_panel(a);
    manager.host_mut().advance(Duration::from_millis(500));
    manager.tick();
    manager.expand_panel(b);
    manager.host_mut().advance(Duration::from_millis(500));
    manager.tick();

    assert_eq!(manager.host().highlight_phase(first), Some(HighlightPhase::Cleared));
    assert_eq!(manager.host().highlight_phase(second), Some(HighlightPhase::Marked));

    manager.host_mut().advance(Duration::from_millis(1_700));
    manager.tick();
    assert_eq!(
        manager.host().highlight_phase(second),
        Some(HighlightPhase::Marked),
        "fade scheduled by the first relocation does not touch the second"
    );
}

#[test]
fn expand_with_vanished_content_only_scrolls() {
    let mut doc = MemoryDocument::new();
    let root = doc.root();
    let gone = doc.block(root, "p", ONE);

    let mut manager = PanelManager::new(
        MemoryHost::with_document(doc),
        MemoryStore::new(),
        ThreadOpenerConfig::default(),
    );
    let panel = manager.open_panel(ONE);
    manager.minimize_panel(panel);
    manager.host_mut().document.detach(gone);

    manager.expand_panel(panel);
    manager.host_mut().advance(Duration::from_millis(500));
    manager.tick();
    assert_eq!(manager.host().scroll_requests.len(), 1);
    assert!(manager.host().highlight_log.is_empty());
    assert!(manager.host().scrolled_into_view.is_empty());
}
