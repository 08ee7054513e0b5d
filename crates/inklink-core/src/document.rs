//! In-memory canvas document - the record store every component works against.
//!
//! Every edit goes through a batch (`run` / `try_run`). A batch:
//! - records a before-image of every record it touches
//! - is squashed into one `RecordsDiff` on commit
//! - is delivered to listeners as a single `ChangeEntry`, so nobody ever
//!   observes a half-applied operation

use std::collections::BTreeMap;
use std::sync::mpsc;

use anyhow::{Result, anyhow, ensure};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::records::{
    Camera, ChangeEntry, Instance, ListenFilter, Page, PageState, Pointer, Record, RecordId,
    RecordsDiff, Source,
};
use crate::shapes::{PageId, ShadowShape, Shape, ShapeId};

/// Current snapshot layout version
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SNAPSHOT_SCHEMA_VERSION
}

/// Persistent part of a document: pages and real shapes only. Highlight
/// shadows have no representation here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page_id: Option<PageId>,
    pub pages: Vec<Page>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
}

impl DocumentSnapshot {
    /// The page the snapshot was taken on, falling back to the first page
    pub fn current_page(&self) -> Option<&Page> {
        self.current_page_id
            .and_then(|id| self.pages.iter().find(|p| p.id == id))
            .or_else(|| self.pages.first())
    }

    /// Shapes parented to `page_id`
    pub fn shapes_on(&self, page_id: PageId) -> impl Iterator<Item = &Shape> + '_ {
        self.shapes.iter().filter(move |s| s.parent_id == page_id)
    }
}

struct Subscriber {
    filter: ListenFilter,
    tx: mpsc::Sender<ChangeEntry>,
}

/// Handle to a change-stream subscription. Dropping it unsubscribes.
pub struct ChangeListener {
    rx: mpsc::Receiver<ChangeEntry>,
}

impl ChangeListener {
    /// Next pending entry, if any
    pub fn try_next(&self) -> Option<ChangeEntry> {
        self.rx.try_recv().ok()
    }

    /// All pending entries in commit order
    pub fn drain(&self) -> Vec<ChangeEntry> {
        self.rx.try_iter().collect()
    }

    /// Unsubscribe
    pub fn dispose(self) {}
}

impl std::fmt::Debug for ChangeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListener").finish()
    }
}

/// One atomic batch of record writes
pub struct Transaction<'a> {
    records: &'a mut BTreeMap<RecordId, Record>,
    before: BTreeMap<RecordId, Option<Record>>,
    current_page: PageId,
}

impl<'a> Transaction<'a> {
    fn new(records: &'a mut BTreeMap<RecordId, Record>, current_page: PageId) -> Self {
        Self {
            records,
            before: BTreeMap::new(),
            current_page,
        }
    }

    fn touch(&mut self, id: RecordId) {
        let records = &*self.records;
        self.before
            .entry(id)
            .or_insert_with(|| records.get(&id).cloned());
    }

    pub fn current_page_id(&self) -> PageId {
        self.current_page
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    /// Insert or replace a record
    pub fn put(&mut self, record: Record) {
        let id = record.id();
        self.touch(id);
        self.records.insert(id, record);
    }

    /// Remove a record
    pub fn delete(&mut self, id: RecordId) -> Option<Record> {
        if !self.records.contains_key(&id) {
            return None;
        }
        self.touch(id);
        self.records.remove(&id)
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        match self.records.get(&RecordId::Page(id)) {
            Some(Record::Page(page)) => Some(page),
            _ => None,
        }
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        match self.records.get(&RecordId::Shape(id)) {
            Some(Record::Shape(shape)) => Some(shape),
            _ => None,
        }
    }

    pub fn shadow(&self, id: ShapeId) -> Option<&ShadowShape> {
        match self.records.get(&RecordId::Shape(id)) {
            Some(Record::Shadow(shadow)) => Some(shadow),
            _ => None,
        }
    }

    /// Real shapes on `page_id`
    pub fn shapes_on_page(&self, page_id: PageId) -> impl Iterator<Item = &Shape> + '_ {
        self.records
            .values()
            .filter_map(Record::as_shape)
            .filter(move |s| s.parent_id == page_id)
    }

    /// Highlight shadows on `page_id`
    pub fn shadows_on_page(&self, page_id: PageId) -> impl Iterator<Item = &ShadowShape> + '_ {
        self.records.values().filter_map(move |r| match r {
            Record::Shadow(shadow) if shadow.parent_id == page_id => Some(shadow),
            _ => None,
        })
    }

    /// Highlight shadows on every page
    pub fn shadows(&self) -> impl Iterator<Item = &ShadowShape> + '_ {
        self.records.values().filter_map(|r| match r {
            Record::Shadow(shadow) => Some(shadow),
            _ => None,
        })
    }

    /// Mutate a real shape in place; `false` if it does not exist
    pub fn update_shape(&mut self, id: ShapeId, f: impl FnOnce(&mut Shape)) -> bool {
        if self.shape(id).is_none() {
            return false;
        }
        self.touch(RecordId::Shape(id));
        match self.records.get_mut(&RecordId::Shape(id)) {
            Some(Record::Shape(shape)) => {
                f(shape);
                true
            }
            _ => false,
        }
    }

    /// Mutate a page in place; `false` if it does not exist
    pub fn update_page(&mut self, id: PageId, f: impl FnOnce(&mut Page)) -> bool {
        if self.page(id).is_none() {
            return false;
        }
        self.touch(RecordId::Page(id));
        match self.records.get_mut(&RecordId::Page(id)) {
            Some(Record::Page(page)) => {
                f(page);
                true
            }
            _ => false,
        }
    }

    /// Remove a shape or shadow and drop it from its page's selection
    pub fn delete_shape(&mut self, id: ShapeId) -> bool {
        let Some(removed) = self.delete(RecordId::Shape(id)) else {
            return false;
        };
        let page_id = match &removed {
            Record::Shape(shape) => {
                // Erased members leave every group they belonged to
                self.update_page(shape.parent_id, |page| {
                    for group in page.meta.linkable_groups.values_mut() {
                        if let Some(ids) = &mut group.shape_ids {
                            ids.remove(&id);
                        }
                    }
                });
                shape.parent_id
            }
            Record::Shadow(shadow) => shadow.parent_id,
            _ => return true,
        };
        let selected = self.selection_on(page_id);
        if selected.contains(&id) {
            let kept = selected.into_iter().filter(|s| *s != id).collect();
            self.set_selection_on(page_id, kept);
        }
        true
    }

    fn selection_on(&self, page_id: PageId) -> Vec<ShapeId> {
        match self.records.get(&RecordId::PageState(page_id)) {
            Some(Record::PageState(state)) => state.selected.clone(),
            _ => Vec::new(),
        }
    }

    fn set_selection_on(&mut self, page_id: PageId, selected: Vec<ShapeId>) {
        self.put(Record::PageState(PageState { page_id, selected }));
    }

    /// Selection on the current page
    pub fn selected_shape_ids(&self) -> Vec<ShapeId> {
        self.selection_on(self.current_page)
    }

    /// Replace the selection on the current page (duplicates dropped)
    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = ShapeId>) {
        let mut selected: Vec<ShapeId> = Vec::new();
        for id in ids {
            if !selected.contains(&id) {
                selected.push(id);
            }
        }
        if selected != self.selected_shape_ids() {
            self.set_selection_on(self.current_page, selected);
        }
    }

    fn finish(self) -> RecordsDiff {
        let mut diff = RecordsDiff::default();
        for (id, before) in self.before {
            let after = self.records.get(&id).cloned();
            match (before, after) {
                (None, Some(added)) => {
                    diff.added.insert(id, added);
                }
                (Some(removed), None) => {
                    diff.removed.insert(id, removed);
                }
                (Some(old), Some(new)) if old != new => {
                    diff.updated.insert(id, (old, new));
                }
                _ => {}
            }
        }
        diff
    }

    fn rollback(self) {
        for (id, before) in self.before {
            match before {
                Some(record) => {
                    self.records.insert(id, record);
                }
                None => {
                    self.records.remove(&id);
                }
            }
        }
    }
}

/// The canvas document
pub struct Document {
    records: BTreeMap<RecordId, Record>,
    current_page: PageId,
    subscribers: Vec<Subscriber>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("records", &self.records.len())
            .field("current_page", &self.current_page)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Document {
    /// Create a new document with one empty page
    pub fn new() -> Self {
        let page = Page::new("Page 1");
        let current_page = page.id;
        let mut records = BTreeMap::new();
        records.insert(RecordId::Page(page.id), Record::Page(page));
        Self::with_session_records(records, current_page)
    }

    fn with_session_records(mut records: BTreeMap<RecordId, Record>, current_page: PageId) -> Self {
        let page_ids: Vec<PageId> = records
            .values()
            .filter_map(|r| match r {
                Record::Page(page) => Some(page.id),
                _ => None,
            })
            .collect();
        for page_id in page_ids {
            records.insert(
                RecordId::Camera(page_id),
                Record::Camera(Camera {
                    page_id,
                    x: 0.0,
                    y: 0.0,
                    z: 1.0,
                }),
            );
            records.insert(
                RecordId::PageState(page_id),
                Record::PageState(PageState {
                    page_id,
                    selected: Vec::new(),
                }),
            );
        }
        records.insert(RecordId::Pointer, Record::Pointer(Pointer::default()));
        records.insert(
            RecordId::Instance,
            Record::Instance(Instance {
                current_page_id: current_page,
            }),
        );
        Self {
            records,
            current_page,
            subscribers: Vec::new(),
        }
    }

    /// Rebuild a document from a saved snapshot
    pub fn from_snapshot(snapshot: DocumentSnapshot) -> Result<Self> {
        let current_page = snapshot
            .current_page()
            .map(|p| p.id)
            .ok_or_else(|| anyhow!("Snapshot has no pages"))?;

        let mut records = BTreeMap::new();
        for page in snapshot.pages {
            records.insert(RecordId::Page(page.id), Record::Page(page));
        }
        for mut shape in snapshot.shapes {
            ensure!(
                records.contains_key(&RecordId::Page(shape.parent_id)),
                "Shape {} references unknown page {}",
                shape.id,
                shape.parent_id
            );
            shape.meta.highlight_clone = None;
            records.insert(RecordId::Shape(shape.id), Record::Shape(shape));
        }
        Ok(Self::with_session_records(records, current_page))
    }

    /// Capture the persistent state. Shadows and clone back-references are
    /// never part of it.
    pub fn snapshot(&self) -> DocumentSnapshot {
        let pages = self.pages().cloned().collect();
        let shapes = self
            .records
            .values()
            .filter_map(Record::as_shape)
            .map(|shape| {
                let mut shape = shape.clone();
                shape.meta.highlight_clone = None;
                shape
            })
            .collect();
        DocumentSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            current_page_id: Some(self.current_page),
            pages,
            shapes,
        }
    }

    // --- Change stream ---

    /// Subscribe to committed batches matching `filter`
    pub fn listen(&mut self, filter: ListenFilter) -> ChangeListener {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(Subscriber { filter, tx });
        ChangeListener { rx }
    }

    fn emit(&mut self, changes: RecordsDiff, source: Source) {
        if changes.is_empty() {
            return;
        }
        trace!(?source, kinds = ?changes.kinds(), "Committed batch");
        self.subscribers.retain(|sub| {
            if !sub.filter.accepts(source) {
                return true;
            }
            let filtered = changes.filtered(sub.filter.scope);
            if filtered.is_empty() {
                return true;
            }
            // A closed channel means the listener was dropped
            sub.tx
                .send(ChangeEntry {
                    changes: filtered,
                    source,
                })
                .is_ok()
        });
    }

    /// Run one atomic batch
    pub fn run<T>(&mut self, source: Source, f: impl FnOnce(&mut Transaction<'_>) -> T) -> T {
        let mut tx = Transaction::new(&mut self.records, self.current_page);
        let out = f(&mut tx);
        let diff = tx.finish();
        self.emit(diff, source);
        out
    }

    /// Run one atomic batch; on `Err` every write is rolled back and nothing
    /// is emitted
    pub fn try_run<T>(
        &mut self,
        source: Source,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut tx = Transaction::new(&mut self.records, self.current_page);
        match f(&mut tx) {
            Ok(out) => {
                let diff = tx.finish();
                self.emit(diff, source);
                Ok(out)
            }
            Err(e) => {
                debug!("Batch rolled back: {e}");
                tx.rollback();
                Err(e)
            }
        }
    }

    // --- Pages ---

    pub fn current_page_id(&self) -> PageId {
        self.current_page
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        match self.records.get(&RecordId::Page(id)) {
            Some(Record::Page(page)) => Some(page),
            _ => None,
        }
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.page(self.current_page)
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> + '_ {
        self.records.values().filter_map(|r| match r {
            Record::Page(page) => Some(page),
            _ => None,
        })
    }

    /// Add a page (does not switch to it)
    pub fn add_page(&mut self, name: impl Into<String>) -> PageId {
        let page = Page::new(name);
        let page_id = page.id;
        self.run(Source::User, |tx| {
            tx.put(Record::Page(page));
            tx.put(Record::Camera(Camera {
                page_id,
                x: 0.0,
                y: 0.0,
                z: 1.0,
            }));
            tx.put(Record::PageState(PageState {
                page_id,
                selected: Vec::new(),
            }));
        });
        page_id
    }

    /// Switch the current page
    pub fn set_current_page(&mut self, page_id: PageId) -> Result<()> {
        ensure!(self.page(page_id).is_some(), "Unknown page {page_id}");
        self.run(Source::User, |tx| {
            tx.put(Record::Instance(Instance {
                current_page_id: page_id,
            }));
        });
        self.current_page = page_id;
        Ok(())
    }

    // --- Shapes ---

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        match self.records.get(&RecordId::Shape(id)) {
            Some(Record::Shape(shape)) => Some(shape),
            _ => None,
        }
    }

    pub fn shadow(&self, id: ShapeId) -> Option<&ShadowShape> {
        match self.records.get(&RecordId::Shape(id)) {
            Some(Record::Shadow(shadow)) => Some(shadow),
            _ => None,
        }
    }

    /// Real shapes on the current page
    pub fn current_page_shapes(&self) -> impl Iterator<Item = &Shape> + '_ {
        let page_id = self.current_page;
        self.records
            .values()
            .filter_map(Record::as_shape)
            .filter(move |s| s.parent_id == page_id)
    }

    /// Highlight shadows on the current page
    pub fn current_page_shadows(&self) -> impl Iterator<Item = &ShadowShape> + '_ {
        let page_id = self.current_page;
        self.records.values().filter_map(move |r| match r {
            Record::Shadow(shadow) if shadow.parent_id == page_id => Some(shadow),
            _ => None,
        })
    }

    /// Whether any highlight shadow exists anywhere in the document
    pub fn has_shadows(&self) -> bool {
        self.records.values().any(|r| matches!(r, Record::Shadow(_)))
    }

    /// Add a shape as a user edit
    pub fn create_shape(&mut self, shape: Shape) -> Result<ShapeId> {
        ensure!(
            self.page(shape.parent_id).is_some(),
            "Unknown page {}",
            shape.parent_id
        );
        ensure!(
            !self.records.contains_key(&RecordId::Shape(shape.id)),
            "Shape {} already exists",
            shape.id
        );
        let id = shape.id;
        self.run(Source::User, |tx| tx.put(Record::Shape(shape)));
        Ok(id)
    }

    /// Update an existing shape as a user edit
    pub fn update_shape(&mut self, id: ShapeId, f: impl FnOnce(&mut Shape)) -> bool {
        self.run(Source::User, |tx| tx.update_shape(id, f))
    }

    /// Delete shapes as a user edit; returns how many existed
    pub fn delete_shapes(&mut self, ids: &[ShapeId]) -> usize {
        self.run(Source::User, |tx| {
            ids.iter().filter(|id| tx.delete_shape(**id)).count()
        })
    }

    // --- Selection and session state ---

    /// Selection on the current page
    pub fn selected_shape_ids(&self) -> Vec<ShapeId> {
        self.page_selection(self.current_page)
    }

    /// Selection on `page_id`
    pub fn page_selection(&self, page_id: PageId) -> Vec<ShapeId> {
        match self.records.get(&RecordId::PageState(page_id)) {
            Some(Record::PageState(state)) => state.selected.clone(),
            _ => Vec::new(),
        }
    }

    /// Replace the selection as a user action
    pub fn select(&mut self, ids: &[ShapeId]) {
        self.run(Source::User, |tx| tx.set_selection(ids.iter().copied()));
    }

    /// Clear the selection as a user action
    pub fn select_none(&mut self) {
        self.run(Source::User, |tx| tx.set_selection(Vec::new()));
    }

    /// Record a pointer move
    pub fn move_pointer(&mut self, x: f64, y: f64) {
        self.run(Source::User, |tx| tx.put(Record::Pointer(Pointer { x, y })));
    }

    /// Move the camera of the current page
    pub fn set_camera(&mut self, x: f64, y: f64, z: f64, source: Source) {
        let page_id = self.current_page;
        self.run(source, |tx| {
            tx.put(Record::Camera(Camera { page_id, x, y, z }));
        });
    }
}
