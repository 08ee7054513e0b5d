//! Link-group hit areas for the static preview.
//!
//! Rectangles are normalized to the page's content bounds so they can be laid
//! over the preview image at any display size.

use std::collections::BTreeMap;

use inklink_core::{Bounds, DocumentSnapshot, Group, GroupId, Shape};
use serde::Serialize;

/// Rectangle in `[0, 1]` page-relative units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOverlay {
    pub group_id: GroupId,
    pub rect: NormalizedRect,
    pub shape_count: usize,
}

/// Page bounds of all real shapes on the current page, plus each group's
/// member bounds
pub fn group_bounds(
    snapshot: &DocumentSnapshot,
    groups: &BTreeMap<GroupId, Group>,
) -> (Option<Bounds>, Vec<(GroupId, Bounds, usize)>) {
    let Some(page) = snapshot.current_page() else {
        return (None, Vec::new());
    };
    let shapes: Vec<&Shape> = snapshot.shapes_on(page.id).collect();
    let page_bounds = Bounds::union_all(shapes.iter().map(|s| s.page_bounds()));

    let per_group = groups
        .values()
        .filter_map(|group| {
            let members = group.resolve_members(shapes.iter().copied());
            let bounds = Bounds::union_all(
                shapes
                    .iter()
                    .filter(|s| members.contains(&s.id))
                    .map(|s| s.page_bounds()),
            )?;
            Some((group.id.clone(), bounds, members.len()))
        })
        .collect();

    (page_bounds, per_group)
}

/// Normalized overlay rectangles; empty when the page bounds are degenerate
pub fn group_overlays(
    snapshot: &DocumentSnapshot,
    groups: &BTreeMap<GroupId, Group>,
) -> Vec<GroupOverlay> {
    let (Some(page), per_group) = group_bounds(snapshot, groups) else {
        return Vec::new();
    };
    if page.width() <= 0.0 || page.height() <= 0.0 {
        return Vec::new();
    }
    per_group
        .into_iter()
        .map(|(group_id, bounds, shape_count)| GroupOverlay {
            group_id,
            rect: NormalizedRect {
                x: (bounds.min_x - page.min_x) / page.width(),
                y: (bounds.min_y - page.min_y) / page.height(),
                width: bounds.width() / page.width(),
                height: bounds.height() / page.height(),
            },
            shape_count,
        })
        .collect()
}
