//! Instant-tier layout normalization for writing pages.

use crate::document::Document;
use crate::records::Source;
use crate::shapes::Bounds;

/// Writing-page geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutRules {
    pub min_page_height: f64,
    pub line_height: f64,
}

impl Default for LayoutRules {
    fn default() -> Self {
        Self {
            min_page_height: 750.0,
            line_height: 150.0,
        }
    }
}

/// Page bounds of every real shape on the current page
pub fn content_bounds(doc: &Document) -> Option<Bounds> {
    Bounds::union_all(doc.current_page_shapes().map(|s| s.page_bounds()))
}

/// Grow the current page so there is room below the last stroke. The page
/// never shrinks. Returns the new height when it changed.
pub fn normalize_layout(doc: &mut Document, rules: &LayoutRules) -> Option<f64> {
    let content_bottom = content_bounds(doc).map_or(0.0, |b| b.max_y);
    let target = rules
        .min_page_height
        .max(content_bottom + 2.0 * rules.line_height);
    let page_id = doc.current_page_id();
    let current = doc.page(page_id)?.height;
    if target <= current {
        return None;
    }
    doc.run(Source::Programmatic, |tx| {
        tx.update_page(page_id, |page| page.height = target);
    });
    Some(target)
}
