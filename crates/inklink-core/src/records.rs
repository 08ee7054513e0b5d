//! Record types held by the document store and the change entries it emits.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::groups::{Group, GroupId};
use crate::shapes::{PageId, ShadowShape, Shape, ShapeId};

/// Page-level metadata owned by the group store
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(
        default,
        rename = "linkableGroups",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub(crate) linkable_groups: BTreeMap<GroupId, Group>,
}

/// A canvas page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub name: String,
    /// Height of the writing area; grown by layout normalization
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub(crate) meta: PageMeta,
}

impl Page {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PageId::new(),
            name: name.into(),
            height: 0.0,
            meta: PageMeta::default(),
        }
    }

    /// Groups stored on this page (read-only)
    pub fn linkable_groups(&self) -> &BTreeMap<GroupId, Group> {
        &self.meta.linkable_groups
    }
}

/// Last known pointer position
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

/// Per-page camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub page_id: PageId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Editor instance state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instance {
    pub current_page_id: PageId,
}

/// Per-page selection state
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub page_id: PageId,
    pub selected: Vec<ShapeId>,
}

/// Whether a record belongs to the saved document or to the editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    All,
    Document,
    Session,
}

/// Kind of record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
    Page,
    Shape,
    Shadow,
    Pointer,
    Camera,
    Instance,
    PageState,
}

impl RecordKind {
    pub fn scope(self) -> Scope {
        match self {
            RecordKind::Page | RecordKind::Shape | RecordKind::Shadow => Scope::Document,
            RecordKind::Pointer
            | RecordKind::Camera
            | RecordKind::Instance
            | RecordKind::PageState => Scope::Session,
        }
    }

    /// Records that end up in a saved snapshot
    pub fn is_persistent(self) -> bool {
        matches!(self, RecordKind::Page | RecordKind::Shape)
    }
}

/// Typed record key. Real shapes and their shadows share the shape id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordId {
    Page(PageId),
    Shape(ShapeId),
    Pointer,
    Camera(PageId),
    Instance,
    PageState(PageId),
}

/// Any record in the store
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Page(Page),
    Shape(Shape),
    Shadow(ShadowShape),
    Pointer(Pointer),
    Camera(Camera),
    Instance(Instance),
    PageState(PageState),
}

impl Record {
    pub fn id(&self) -> RecordId {
        match self {
            Record::Page(page) => RecordId::Page(page.id),
            Record::Shape(shape) => RecordId::Shape(shape.id),
            Record::Shadow(shadow) => RecordId::Shape(shadow.id),
            Record::Pointer(_) => RecordId::Pointer,
            Record::Camera(camera) => RecordId::Camera(camera.page_id),
            Record::Instance(_) => RecordId::Instance,
            Record::PageState(state) => RecordId::PageState(state.page_id),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Page(_) => RecordKind::Page,
            Record::Shape(_) => RecordKind::Shape,
            Record::Shadow(_) => RecordKind::Shadow,
            Record::Pointer(_) => RecordKind::Pointer,
            Record::Camera(_) => RecordKind::Camera,
            Record::Instance(_) => RecordKind::Instance,
            Record::PageState(_) => RecordKind::PageState,
        }
    }

    pub fn as_shape(&self) -> Option<&Shape> {
        match self {
            Record::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    fn in_scope(&self, scope: Scope) -> bool {
        scope == Scope::All || self.kind().scope() == scope
    }
}

/// Net effect of one committed batch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordsDiff {
    pub added: BTreeMap<RecordId, Record>,
    /// `(before, after)`
    pub updated: BTreeMap<RecordId, (Record, Record)>,
    pub removed: BTreeMap<RecordId, Record>,
}

impl RecordsDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Every record kind touched by this diff
    pub fn kinds(&self) -> BTreeSet<RecordKind> {
        self.added
            .values()
            .chain(self.updated.values().map(|(_, after)| after))
            .chain(self.removed.values())
            .map(Record::kind)
            .collect()
    }

    /// Whether any record that gets saved was touched
    pub fn touches_persistent_records(&self) -> bool {
        self.kinds().into_iter().any(RecordKind::is_persistent)
    }

    /// Selection after this batch for `page_id`, if the batch changed it
    pub fn selection_after(&self, page_id: PageId) -> Option<&[ShapeId]> {
        let key = RecordId::PageState(page_id);
        let record = self
            .updated
            .get(&key)
            .map(|(_, after)| after)
            .or_else(|| self.added.get(&key))?;
        match record {
            Record::PageState(state) => Some(&state.selected),
            _ => None,
        }
    }

    /// Restrict this diff to one scope
    pub fn filtered(&self, scope: Scope) -> RecordsDiff {
        if scope == Scope::All {
            return self.clone();
        }
        RecordsDiff {
            added: self
                .added
                .iter()
                .filter(|(_, r)| r.in_scope(scope))
                .map(|(k, r)| (*k, r.clone()))
                .collect(),
            updated: self
                .updated
                .iter()
                .filter(|(_, (_, after))| after.in_scope(scope))
                .map(|(k, pair)| (*k, pair.clone()))
                .collect(),
            removed: self
                .removed
                .iter()
                .filter(|(_, r)| r.in_scope(scope))
                .map(|(k, r)| (*k, r.clone()))
                .collect(),
        }
    }
}

/// Who caused a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Direct user input
    User,
    /// Silent, programmatic change (layout normalization, highlight overlay)
    Programmatic,
}

/// Which sources a listener wants to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFilter {
    User,
    All,
}

/// Subscription options for [`crate::Document::listen`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenFilter {
    pub source: SourceFilter,
    pub scope: Scope,
}

impl ListenFilter {
    pub fn user() -> Self {
        Self {
            source: SourceFilter::User,
            scope: Scope::All,
        }
    }

    pub fn all() -> Self {
        Self {
            source: SourceFilter::All,
            scope: Scope::All,
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub(crate) fn accepts(&self, source: Source) -> bool {
        match self.source {
            SourceFilter::All => true,
            SourceFilter::User => source == Source::User,
        }
    }
}

/// One committed batch as seen by a listener
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry {
    pub changes: RecordsDiff,
    pub source: Source,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{ShapeKind, Point};

    #[test]
    fn filtered_splits_document_and_session_records() {
        let page = Page::new("Page 1");
        let shape = Shape::new(page.id, ShapeKind::Line { end: Point::new(1.0, 1.0) });
        let mut diff = RecordsDiff::default();
        diff.added.insert(RecordId::Shape(shape.id), Record::Shape(shape));
        diff.updated.insert(
            RecordId::Pointer,
            (
                Record::Pointer(Pointer::default()),
                Record::Pointer(Pointer { x: 1.0, y: 2.0 }),
            ),
        );

        let doc_only = diff.filtered(Scope::Document);
        assert_eq!(doc_only.added.len(), 1);
        assert!(doc_only.updated.is_empty());

        let session_only = diff.filtered(Scope::Session);
        assert!(session_only.added.is_empty());
        assert_eq!(session_only.updated.len(), 1);

        assert!(diff.touches_persistent_records());
        assert!(!session_only.touches_persistent_records());
    }
}
