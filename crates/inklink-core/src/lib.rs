//! inklink-core: canvas records, the transactional document store, linkable
//! groups and the highlight overlay.

pub mod activity;
pub mod document;
pub mod groups;
pub mod highlight;
pub mod layout;
pub mod records;
pub mod shapes;

pub use activity::{Activity, classify};
pub use document::{ChangeListener, Document, DocumentSnapshot, Transaction};
pub use groups::{
    AddFileOutcome, Group, GroupId, GroupPatch, Groups, GroupsMut, LinkFile, LinkFileId,
    LinkFilePatch, NewLinkFile, UpdateFileOutcome, default_link_name,
};
pub use highlight::{HighlightSession, SelectionWatcher, activate, deactivate, watch_selection};
pub use layout::{LayoutRules, content_bounds, normalize_layout};
pub use records::{
    ChangeEntry, ListenFilter, Page, Record, RecordId, RecordKind, RecordsDiff, Scope, Source,
    SourceFilter,
};
pub use shapes::{Bounds, GeoKind, PageId, Point, ShadowShape, Shape, ShapeColor, ShapeId, ShapeKind};
