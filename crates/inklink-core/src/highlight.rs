//! Highlight overlay: shadow clones that echo a group's shapes in a
//! highlight color, and the selection watcher that ends a highlight.
//!
//! Overlay writes are programmatic batches, so they never look like user
//! activity to the persistence pipeline or to the watcher itself.

use std::collections::BTreeSet;

use tracing::debug;

use crate::document::{ChangeListener, Document};
use crate::groups::GroupId;
use crate::records::{ListenFilter, Record, Source};
use crate::shapes::{PageId, ShadowShape, ShapeColor, ShapeId};

/// Mirror `shape_ids` with shadows in `color` and select sources plus
/// clones. Returns the shadow ids.
pub fn activate(doc: &mut Document, shape_ids: &[ShapeId], color: ShapeColor) -> Vec<ShapeId> {
    let clones = doc.run(Source::Programmatic, |tx| {
        let mut sources = Vec::new();
        let mut clones = Vec::new();
        let mut existing = Vec::new();
        for source_id in shape_ids {
            let Some(source) = tx.shape(*source_id) else {
                continue;
            };
            if let Some(clone_id) = source.highlight_clone() {
                // Already mirrored; keep it and its clone selected
                sources.push(*source_id);
                existing.push(clone_id);
                continue;
            }
            let shadow = ShadowShape::mirror(source, color);
            let clone_id = shadow.id;
            tx.put(Record::Shadow(shadow));
            tx.update_shape(*source_id, |s| s.meta.highlight_clone = Some(clone_id));
            sources.push(*source_id);
            clones.push(clone_id);
        }
        tx.set_selection(
            sources
                .into_iter()
                .chain(existing)
                .chain(clones.iter().copied()),
        );
        clones
    });
    debug!(count = clones.len(), %color, "Highlight on");
    clones
}

/// Delete every shadow and clear the clone reference on its source.
/// Returns how many shadows were removed.
pub fn deactivate(doc: &mut Document) -> usize {
    doc.run(Source::Programmatic, |tx| {
        let pairs: Vec<(ShapeId, ShapeId)> =
            tx.shadows().map(|s| (s.id, s.source_id)).collect();
        for (clone_id, source_id) in &pairs {
            tx.delete_shape(*clone_id);
            tx.update_shape(*source_id, |s| s.meta.highlight_clone = None);
        }
        pairs.len()
    })
}

/// One-shot watcher that ends a highlight when the selection stops covering
/// every source shape
pub struct SelectionWatcher {
    listener: Option<ChangeListener>,
    page_id: PageId,
    source_ids: BTreeSet<ShapeId>,
    selection: Vec<ShapeId>,
    was_all_selected: bool,
    fired: bool,
    on_divergence: Option<Box<dyn FnOnce()>>,
}

/// Watch user selection changes against `source_ids`
pub fn watch_selection(
    doc: &mut Document,
    source_ids: &[ShapeId],
    on_divergence: impl FnOnce() + 'static,
) -> SelectionWatcher {
    SelectionWatcher {
        listener: Some(doc.listen(ListenFilter::user())),
        page_id: doc.current_page_id(),
        source_ids: source_ids.iter().copied().collect(),
        selection: doc.selected_shape_ids(),
        was_all_selected: true,
        fired: false,
        on_divergence: Some(Box::new(on_divergence)),
    }
}

impl SelectionWatcher {
    /// Process pending user changes. Returns `true` if the watcher fired
    /// during this call.
    pub fn pump(&mut self, doc: &mut Document) -> bool {
        let Some(listener) = &self.listener else {
            return false;
        };
        let entries = listener.drain();
        let last = entries.len().saturating_sub(1);
        for (index, entry) in entries.iter().enumerate() {
            if self.fired {
                break;
            }
            // The newest batch is checked against the live selection, which
            // also reflects programmatic selection writes
            if index == last {
                self.selection = doc.page_selection(self.page_id);
            } else if let Some(selected) = entry.changes.selection_after(self.page_id) {
                self.selection = selected.to_vec();
            }
            let all_selected = self.source_ids.iter().all(|id| self.selection.contains(id));
            if self.was_all_selected && !all_selected {
                self.fired = true;
                if let Some(callback) = self.on_divergence.take() {
                    callback();
                }
                deactivate(doc);
                debug!("Selection diverged, highlight off");
                return true;
            }
            self.was_all_selected = all_selected;
        }
        false
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Stop listening
    pub fn dispose(&mut self) {
        self.listener = None;
        self.on_divergence = None;
    }
}

/// Group-panel highlight behavior: one highlighted group at a time, with the
/// pre-highlight selection restored when the same group is toggled off
#[derive(Default)]
pub struct HighlightSession {
    highlighted: Option<GroupId>,
    previous_selection: Vec<ShapeId>,
    watcher: Option<SelectionWatcher>,
}

impl HighlightSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn highlighted(&self) -> Option<&GroupId> {
        self.highlighted.as_ref()
    }

    /// Forward pending changes to the watcher; forgets the highlight if it
    /// fired
    pub fn pump(&mut self, doc: &mut Document) {
        let fired = self.watcher.as_mut().is_some_and(|w| w.pump(doc));
        if fired {
            self.highlighted = None;
            self.previous_selection.clear();
            self.watcher = None;
        }
    }

    /// Highlight `group_id`, or turn it off if it is already highlighted
    pub fn toggle(&mut self, doc: &mut Document, group_id: &GroupId) {
        self.pump(doc);
        self.stop(doc);

        if self.highlighted.as_ref() == Some(group_id) {
            self.highlighted = None;
            if self.previous_selection.is_empty() {
                doc.select_none();
            } else {
                let previous = std::mem::take(&mut self.previous_selection);
                doc.select(&previous);
            }
            return;
        }

        // Switching between groups keeps the selection from before the first
        if self.highlighted.is_none() {
            self.previous_selection = doc.selected_shape_ids();
        }
        self.highlighted = Some(group_id.clone());

        let members = doc.groups().shapes_for_group(group_id);
        if members.is_empty() {
            return;
        }
        let color = doc
            .groups()
            .group(group_id)
            .map(|g| g.color)
            .unwrap_or(ShapeColor::Red);
        activate(doc, &members, color);
        self.watcher = Some(watch_selection(doc, &members, || {}));
    }

    /// Deactivate the overlay and forget the highlighted group
    pub fn clear(&mut self, doc: &mut Document) {
        self.stop(doc);
        self.highlighted = None;
        self.previous_selection.clear();
    }

    fn stop(&mut self, doc: &mut Document) {
        deactivate(doc);
        if let Some(mut watcher) = self.watcher.take() {
            watcher.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Point, Shape, ShapeKind};

    fn stroke(doc: &mut Document) -> ShapeId {
        let shape = Shape::new(
            doc.current_page_id(),
            ShapeKind::Draw {
                points: vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)],
                is_complete: true,
            },
        )
        .at(10.0, 20.0)
        .with_rotation(0.5);
        doc.create_shape(shape).unwrap()
    }

    #[test]
    fn activate_mirrors_sources_and_selects_union() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let clones = activate(&mut doc, &[s1], ShapeColor::Violet);
        assert_eq!(clones.len(), 1);

        let shadow = doc.shadow(clones[0]).unwrap();
        let source = doc.shape(s1).unwrap();
        assert_eq!(shadow.source_id, s1);
        assert_eq!(shadow.color, ShapeColor::Violet);
        assert_eq!((shadow.x, shadow.y, shadow.rotation), (10.0, 20.0, 0.5));
        assert_eq!(shadow.kind, source.kind);
        assert_eq!(source.highlight_clone(), Some(clones[0]));
        assert_eq!(doc.selected_shape_ids(), vec![s1, clones[0]]);
    }

    #[test]
    fn deactivate_is_idempotent() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        assert_eq!(deactivate(&mut doc), 0);
        activate(&mut doc, &[s1], ShapeColor::Red);
        assert_eq!(deactivate(&mut doc), 1);
        assert_eq!(deactivate(&mut doc), 0);
        assert!(!doc.has_shadows());
        assert_eq!(doc.shape(s1).unwrap().highlight_clone(), None);
    }

    #[test]
    fn overlay_batches_are_invisible_to_user_listeners() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let user = doc.listen(ListenFilter::user());
        activate(&mut doc, &[s1], ShapeColor::Red);
        deactivate(&mut doc);
        assert!(user.drain().is_empty());
    }

    #[test]
    fn session_toggle_restores_previous_selection() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let s2 = stroke(&mut doc);
        let gid = doc.groups_mut().create_group("G", ShapeColor::Blue, &[s1]);
        doc.select(&[s2]);

        let mut session = HighlightSession::new();
        session.toggle(&mut doc, &gid);
        assert_eq!(session.highlighted(), Some(&gid));
        assert!(doc.has_shadows());

        session.toggle(&mut doc, &gid);
        assert_eq!(session.highlighted(), None);
        assert!(!doc.has_shadows());
        assert_eq!(doc.selected_shape_ids(), vec![s2]);
    }

    #[test]
    fn session_forgets_group_when_selection_diverges() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let gid = doc.groups_mut().create_group("G", ShapeColor::Blue, &[s1]);

        let mut session = HighlightSession::new();
        session.toggle(&mut doc, &gid);
        doc.select_none();
        session.pump(&mut doc);

        assert_eq!(session.highlighted(), None);
        assert!(!doc.has_shadows());
    }
}
