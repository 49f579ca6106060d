#![forbid(unsafe_code)]

//! Best-effort relocation of previously selected text in a mutated document.
//!
//! The selection is split into fragments at blank lines; each fragment long enough to be
//! distinctive contributes a short search key. Keys are matched with a single
//! forward-only walk over the document's text nodes, so fragments resolve in
//! reading order and a later fragment can never land on an earlier duplicate
//! (a citation label repeated higher up, for example).
//!
//! This is deliberately not exact range serialization: the host re-renders
//! freely between selection and expand, so the walk tolerates drift and may
//! highlight the wrong block when content is ambiguous.

use core::fmt::Debug;

use tracing::debug;

/// Block-level ancestors that can carry a highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    ListItem,
    Heading,
    CodeBlock,
    Quote,
    Container,
}

impl BlockKind {
    /// Classify an element by tag name (case-insensitive).
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag.to_ascii_lowercase().as_str() {
            "p" => Self::Paragraph,
            "li" => Self::ListItem,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Self::Heading,
            "pre" => Self::CodeBlock,
            "blockquote" => Self::Quote,
            "div" => Self::Container,
            _ => return None,
        };
        Some(kind)
    }
}

/// Read access to a document's text content, in document order.
pub trait TextTree {
    type Node: Clone + PartialEq + Debug;

    /// All text nodes in document order.
    fn text_nodes(&self) -> Vec<Self::Node>;
    fn node_text(&self, node: &Self::Node) -> String;
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    /// `Some` when `node` is an element of a block-level kind.
    fn block_kind(&self, node: &Self::Node) -> Option<BlockKind>;
    /// Whether `node` is (or is inside) one of the extension's own surfaces.
    fn in_extension_surface(&self, node: &Self::Node) -> bool;
}

/// Relocation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocateConfig {
    pub min_fragment_chars: usize,
    pub search_key_chars: usize,
}

impl Default for RelocateConfig {
    fn default() -> Self {
        Self {
            min_fragment_chars: 30,
            search_key_chars: 50,
        }
    }
}

/// Search keys derived from `text`, in selection order.
///
/// Runs of blank lines separate fragments; consecutive non-blank lines stay
/// together, so a code block or verse of short lines is one fragment. Each
/// fragment is trimmed, and fragments shorter than `min_fragment_chars` are
/// dropped: short ones (citation markers, list bullets) repeat too often to
/// locate anything.
#[must_use]
pub fn search_keys(text: &str, config: RelocateConfig) -> Vec<String> {
    fragments(text)
        .into_iter()
        .filter(|fragment| fragment.chars().count() >= config.min_fragment_chars)
        .map(|fragment| fragment.chars().take(config.search_key_chars).collect())
        .collect()
}

fn fragments(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some(from) = start.take() {
                out.push(text[from..end].trim());
            }
        } else {
            start.get_or_insert(offset);
            end = offset + line.len();
        }
        offset += line.len();
    }
    if let Some(from) = start {
        out.push(text[from..end].trim());
    }
    out
}

fn nearest_block<T: TextTree>(tree: &T, text_node: &T::Node) -> Option<T::Node> {
    let mut current = tree.parent(text_node);
    while let Some(node) = current {
        if tree.block_kind(&node).is_some() {
            return Some(node);
        }
        current = tree.parent(&node);
    }
    None
}

/// Locate the blocks holding `original_text`, in document order, each at most once.
#[must_use]
pub fn locate_blocks<T: TextTree>(
    tree: &T,
    original_text: &str,
    config: RelocateConfig,
) -> Vec<T::Node> {
    let keys = search_keys(original_text, config);
    if keys.is_empty() {
        return Vec::new();
    }
    let text_nodes = tree.text_nodes();
    let mut cursor = 0;
    let mut blocks: Vec<T::Node> = Vec::new();

    for key in &keys {
        let found = text_nodes[cursor..].iter().enumerate().find_map(|(offset, node)| {
            if !tree.node_text(node).contains(key.as_str()) || tree.in_extension_surface(node) {
                return None;
            }
            let block = nearest_block(tree, node)?;
            Some((cursor + offset, block))
        });
        let Some((index, block)) = found else {
            continue;
        };
        cursor = index;
        if !blocks.contains(&block) {
            blocks.push(block);
        }
    }
    debug!(fragments = keys.len(), matched = blocks.len(), "relocation walk finished");
    blocks
}

/// Scroll offset that puts the captured position roughly a third down the viewport.
#[must_use]
pub fn relocation_scroll_target(origin_scroll_top: f64, viewport_height: f64) -> f64 {
    (origin_scroll_top - viewport_height / 3.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::{BlockKind, RelocateConfig, relocation_scroll_target, search_keys};

    #[test]
    fn tags_classify_to_block_kinds() {
        assert_eq!(BlockKind::from_tag("P"), Some(BlockKind::Paragraph));
        assert_eq!(BlockKind::from_tag("h4"), Some(BlockKind::Heading));
        assert_eq!(BlockKind::from_tag("pre"), Some(BlockKind::CodeBlock));
        assert_eq!(BlockKind::from_tag("blockquote"), Some(BlockKind::Quote));
        assert_eq!(BlockKind::from_tag("span"), None);
    }

    #[test]
    fn short_lines_never_become_keys() {
        let keys = search_keys("[1]\n\nshort line\n   \n", RelocateConfig::default());
        assert!(keys.is_empty());
    }

    #[test]
    fn keys_are_trimmed_prefixes() {
        let long = "x".repeat(80);
        let text = format!("  A unique 40+ character paragraph one.  \n\n{long}");
        let keys = search_keys(&text, RelocateConfig::default());
        assert_eq!(keys[0], "A unique 40+ character paragraph one.");
        assert_eq!(keys[1].chars().count(), 50);
    }

    #[test]
    fn short_lines_without_blank_separator_form_one_fragment() {
        let code = "fn main() {\n    let x = 1;\n    go(x);\n}";
        assert_eq!(search_keys(code, RelocateConfig::default()), vec![code]);

        let verse = "roses are red\nviolets are blue\n\n\n  some code is short\n  so is this  \n";
        assert_eq!(
            search_keys(verse, RelocateConfig::default()),
            vec![
                "roses are red\nviolets are blue",
                "some code is short\n  so is this",
            ]
        );
    }

    #[test]
    fn scroll_target_never_goes_negative() {
        assert_eq!(relocation_scroll_target(900.0, 600.0), 700.0);
        assert_eq!(relocation_scroll_target(100.0, 600.0), 0.0);
    }
}
