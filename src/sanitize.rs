//! DOM snapshot sanitization
//!
//! Strips scripts, inline styles, comments and elements belonging to common
//! tracking vendors from rendered HTML before it is stored on the result.

use crate::{ExtractionStep, ScrapeError};
use scraper::{Html, Node};

/// Substrings of `id` / `class` attributes marking tracking widgets.
pub const TRACKING_MARKERS: [&str; 4] = ["analytics", "tracking", "gtm", "facebook"];

fn is_tracking_element(element: &scraper::node::Element) -> bool {
    ["id", "class"].iter().any(|attr| {
        element
            .attr(attr)
            .is_some_and(|value| TRACKING_MARKERS.iter().any(|marker| value.contains(marker)))
    })
}

fn should_strip(node: &Node) -> bool {
    match node {
        Node::Comment(_) => true,
        Node::Element(element) => {
            matches!(element.name(), "script" | "style") || is_tracking_element(element)
        }
        _ => false,
    }
}

/// Returns the sanitized document, or an error when the input does not
/// produce a document at all.
pub fn sanitize_dom(html: &str) -> Result<String, ScrapeError> {
    let mut document = Html::parse_document(html);

    let doomed: Vec<_> = document
        .tree
        .nodes()
        .filter(|node| should_strip(node.value()))
        .map(|node| node.id())
        .collect();

    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    if !document.tree.root().has_children() {
        return Err(ScrapeError::step(ExtractionStep::Dom, "document has no root element"));
    }

    Ok(document.html())
}

/// Sanitizes `html`, keeping the raw markup if sanitization fails.
pub fn sanitize_or_raw(html: String) -> (String, Option<ScrapeError>) {
    match sanitize_dom(&html) {
        Ok(clean) => (clean, None),
        Err(e) => (html, Some(e)),
    }
}
