use std::sync::LazyLock;

use regex::Regex;

use super::node::{Document, Node, NodeKind};
use crate::config::Thresholds;

static PAGE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)home|about|contact|landing|screen").unwrap());
static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\s*-\s").unwrap());

/// A top-level frame counts as a page when it is big enough or named like one.
pub fn is_page(node: &Node, t: &Thresholds) -> bool {
    if !matches!(
        node.kind,
        NodeKind::Frame(_) | NodeKind::Component(_) | NodeKind::Section
    ) {
        return false;
    }
    let big = node.bounds.width > t.page_min_width && node.bounds.height > t.page_min_height;
    big || PAGE_NAME_RE.is_match(&node.name) || NUMBERED_RE.is_match(node.name.trim())
}

/// Page frames across every canvas, in document order.
pub fn find_pages<'a>(doc: &'a Document, t: &Thresholds) -> Vec<&'a Node> {
    doc.canvases()
        .flat_map(|canvas| canvas.children.iter())
        .filter(|n| n.visible && is_page(n, t))
        .collect()
}
