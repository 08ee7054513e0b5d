//! Linkable groups - named, colored sets of shapes with linked files.
//!
//! Membership is stored twice: `Group::shape_ids` in the page metadata, and a
//! `linkableGroups` backlink on every member shape. Both sides are only ever
//! written here, inside one batch per operation.

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::document::{Document, Transaction};
use crate::records::Source;
use crate::shapes::{Shape, ShapeColor, ShapeId};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: u128) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// `<prefix>_<base36 millis><5 random base36 chars>`
fn generate_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u128;
    let mut random = Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(5);
    for _ in 0..5 {
        suffix.push(BASE36[(random % 36) as usize] as char);
        random /= 36;
    }
    format!("{prefix}_{}{suffix}", to_base36(millis))
}

/// Group identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn generate() -> Self {
        Self(generate_id("group"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Link file identifier, unique within its group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkFileId(String);

impl LinkFileId {
    pub fn generate() -> Self {
        Self(generate_id("file"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LinkFileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for LinkFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference from a group to an external file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFile {
    pub id: LinkFileId,
    pub name: String,
    pub path: String,
    /// 1-based line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<NonZeroU32>,
}

/// Display name for a link: explicit name, else the last path segment, else
/// "Untitled"
pub fn default_link_name(name: Option<&str>, path: &str) -> String {
    match name.filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => match path.rsplit('/').next() {
            Some(last) if !last.is_empty() => last.to_string(),
            _ => "Untitled".to_string(),
        },
    }
}

/// Input for [`GroupsMut::add_file`]
#[derive(Debug, Clone, Default)]
pub struct NewLinkFile {
    pub name: Option<String>,
    pub path: String,
    pub line: Option<NonZeroU32>,
}

impl NewLinkFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at_line(mut self, line: NonZeroU32) -> Self {
        self.line = Some(line);
        self
    }

    fn into_link_file(self) -> LinkFile {
        LinkFile {
            id: LinkFileId::generate(),
            name: default_link_name(self.name.as_deref(), &self.path),
            path: self.path,
            line: self.line,
        }
    }
}

/// Field-wise patch for [`GroupsMut::update_file`]
#[derive(Debug, Clone, Default)]
pub struct LinkFilePatch {
    pub name: Option<String>,
    pub path: Option<String>,
    /// `Some(None)` clears the line
    pub line: Option<Option<NonZeroU32>>,
}

/// Field-wise patch for [`GroupsMut::update_group`]
#[derive(Debug, Clone, Default)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub color: Option<ShapeColor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddFileOutcome {
    Added(LinkFile),
    /// Same name and path already linked; nothing changed
    Duplicate,
    UnknownGroup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateFileOutcome {
    Updated,
    /// The patched entry would equal another entry; nothing changed
    Duplicate,
    NotFound,
}

/// A linkable group as stored in page metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub color: ShapeColor,
    pub created_at: DateTime<Utc>,
    /// Absent in documents written before membership was stored on the group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_ids: Option<BTreeSet<ShapeId>>,
    #[serde(default, rename = "link_files")]
    pub link_files: Vec<LinkFile>,
}

impl Group {
    /// Whether another entry already has this exact name and path
    pub fn has_duplicate(&self, name: &str, path: &str, excluding: Option<&LinkFileId>) -> bool {
        self.link_files
            .iter()
            .filter(|f| Some(&f.id) != excluding)
            .any(|f| f.name == name && f.path == path)
    }

    pub fn file(&self, file_id: &LinkFileId) -> Option<&LinkFile> {
        self.link_files.iter().find(|f| &f.id == file_id)
    }

    /// Member ids among `shapes`. Uses `shape_ids` when present, otherwise
    /// falls back to the shapes' backlinks.
    pub fn resolve_members<'s>(&self, shapes: impl IntoIterator<Item = &'s Shape>) -> Vec<ShapeId> {
        match &self.shape_ids {
            Some(ids) => {
                let existing: BTreeSet<ShapeId> = shapes.into_iter().map(|s| s.id).collect();
                ids.iter().filter(|id| existing.contains(id)).copied().collect()
            }
            None => shapes
                .into_iter()
                .filter(|s| s.meta.linkable_groups.contains(&self.id))
                .map(|s| s.id)
                .collect(),
        }
    }
}

/// Read access to the groups of a document
pub struct Groups<'a> {
    doc: &'a Document,
}

impl<'a> Groups<'a> {
    pub fn group(&self, group_id: &GroupId) -> Option<&'a Group> {
        self.doc.current_page()?.meta.linkable_groups.get(group_id)
    }

    /// Groups of the current page, ordered by id
    pub fn page_groups(&self) -> impl Iterator<Item = &'a Group> + 'a {
        self.doc
            .current_page()
            .into_iter()
            .flat_map(|page| page.meta.linkable_groups.values())
    }

    /// Every group on every page
    pub fn all_groups(&self) -> impl Iterator<Item = &'a Group> + 'a {
        self.doc
            .pages()
            .flat_map(|page| page.meta.linkable_groups.values())
    }

    /// Union of the backlinks of `shape_ids`
    pub fn groups_for_shapes(&self, shape_ids: &[ShapeId]) -> BTreeSet<GroupId> {
        shape_ids
            .iter()
            .filter_map(|id| self.doc.shape(*id))
            .flat_map(|shape| shape.meta.linkable_groups.iter().cloned())
            .collect()
    }

    /// Existing member shapes of a group; empty for an unknown group
    pub fn shapes_for_group(&self, group_id: &GroupId) -> Vec<ShapeId> {
        match self.group(group_id) {
            Some(group) => group.resolve_members(self.doc.current_page_shapes()),
            None => Vec::new(),
        }
    }

    /// Groups to list for a selection: all page groups when nothing is
    /// selected, otherwise the groups touched by the selection
    pub fn visible_groups(&self, selection: &[ShapeId]) -> Vec<&'a Group> {
        if selection.is_empty() {
            return self.page_groups().collect();
        }
        self.groups_for_shapes(selection)
            .iter()
            .filter_map(|id| self.group(id))
            .collect()
    }
}

/// Write access to the groups of a document. Every method is one user batch.
pub struct GroupsMut<'a> {
    doc: &'a mut Document,
}

fn with_group<R>(
    tx: &mut Transaction<'_>,
    group_id: &GroupId,
    f: impl FnOnce(&mut Group) -> R,
) -> Option<R> {
    let page_id = tx.current_page_id();
    let mut out = None;
    tx.update_page(page_id, |page| {
        if let Some(group) = page.meta.linkable_groups.get_mut(group_id) {
            out = Some(f(group));
        }
    });
    out
}

fn page_has_group(tx: &Transaction<'_>, group_id: &GroupId) -> bool {
    tx.page(tx.current_page_id())
        .is_some_and(|page| page.meta.linkable_groups.contains_key(group_id))
}

/// Real shapes on the current page among `ids`
fn page_members(tx: &Transaction<'_>, ids: &[ShapeId]) -> BTreeSet<ShapeId> {
    let page_id = tx.current_page_id();
    ids.iter()
        .copied()
        .filter(|id| tx.shape(*id).is_some_and(|s| s.parent_id == page_id))
        .collect()
}

impl GroupsMut<'_> {
    /// Create a group and backlink every existing shape in `shape_ids`
    pub fn create_group(
        &mut self,
        name: impl Into<String>,
        color: ShapeColor,
        shape_ids: &[ShapeId],
    ) -> GroupId {
        let id = GroupId::generate();
        let name = name.into();
        self.doc.run(Source::User, |tx| {
            let members = page_members(tx, shape_ids);
            for shape_id in &members {
                tx.update_shape(*shape_id, |shape| {
                    shape.meta.linkable_groups.insert(id.clone());
                });
            }
            let group = Group {
                id: id.clone(),
                name,
                color,
                created_at: Utc::now(),
                shape_ids: Some(members),
                link_files: Vec::new(),
            };
            let page_id = tx.current_page_id();
            tx.update_page(page_id, |page| {
                page.meta.linkable_groups.insert(id.clone(), group);
            });
        });
        debug!(group = %id, "Created group");
        id
    }

    /// Merge name/color; `false` for an unknown group
    pub fn update_group(&mut self, group_id: &GroupId, patch: GroupPatch) -> bool {
        self.doc.run(Source::User, |tx| {
            with_group(tx, group_id, |group| {
                if let Some(name) = patch.name {
                    group.name = name;
                }
                if let Some(color) = patch.color {
                    group.color = color;
                }
            })
            .is_some()
        })
    }

    pub fn add_file(&mut self, group_id: &GroupId, file: NewLinkFile) -> AddFileOutcome {
        let link = file.into_link_file();
        self.doc.run(Source::User, |tx| {
            with_group(tx, group_id, |group| {
                if group.has_duplicate(&link.name, &link.path, None) {
                    return AddFileOutcome::Duplicate;
                }
                group.link_files.push(link.clone());
                AddFileOutcome::Added(link)
            })
            .unwrap_or(AddFileOutcome::UnknownGroup)
        })
    }

    pub fn update_file(
        &mut self,
        group_id: &GroupId,
        file_id: &LinkFileId,
        patch: LinkFilePatch,
    ) -> UpdateFileOutcome {
        self.doc.run(Source::User, |tx| {
            with_group(tx, group_id, |group| {
                let Some(index) = group.link_files.iter().position(|f| &f.id == file_id) else {
                    return UpdateFileOutcome::NotFound;
                };
                let mut merged = group.link_files[index].clone();
                if let Some(name) = patch.name {
                    merged.name = name;
                }
                if let Some(path) = patch.path {
                    merged.path = path;
                }
                if let Some(line) = patch.line {
                    merged.line = line;
                }
                if group.has_duplicate(&merged.name, &merged.path, Some(file_id)) {
                    return UpdateFileOutcome::Duplicate;
                }
                group.link_files[index] = merged;
                UpdateFileOutcome::Updated
            })
            .unwrap_or(UpdateFileOutcome::NotFound)
        })
    }

    /// `false` when the group or file is unknown
    pub fn remove_file(&mut self, group_id: &GroupId, file_id: &LinkFileId) -> bool {
        self.doc.run(Source::User, |tx| {
            with_group(tx, group_id, |group| {
                let before = group.link_files.len();
                group.link_files.retain(|f| &f.id != file_id);
                group.link_files.len() != before
            })
            .unwrap_or(false)
        })
    }

    /// Delete a group and strip it from every shape on the current page
    pub fn remove_group(&mut self, group_id: &GroupId) -> bool {
        let removed = self.doc.run(Source::User, |tx| {
            let page_id = tx.current_page_id();
            let mut existed = false;
            tx.update_page(page_id, |page| {
                existed = page.meta.linkable_groups.remove(group_id).is_some();
            });
            if !existed {
                return false;
            }
            let members: Vec<ShapeId> = tx
                .shapes_on_page(page_id)
                .filter(|s| s.meta.linkable_groups.contains(group_id))
                .map(|s| s.id)
                .collect();
            for shape_id in members {
                tx.update_shape(shape_id, |shape| {
                    shape.meta.linkable_groups.remove(group_id);
                });
            }
            true
        });
        if removed {
            debug!(group = %group_id, "Removed group");
        }
        removed
    }

    /// Add shapes to a group; returns how many were newly attached
    pub fn attach_shapes(&mut self, group_id: &GroupId, shape_ids: &[ShapeId]) -> usize {
        self.doc.run(Source::User, |tx| {
            if !page_has_group(tx, group_id) {
                return 0;
            }
            let page_id = tx.current_page_id();
            // Legacy groups get their member set materialized from backlinks
            let backlinked: BTreeSet<ShapeId> = tx
                .shapes_on_page(page_id)
                .filter(|s| s.meta.linkable_groups.contains(group_id))
                .map(|s| s.id)
                .collect();
            let candidates = page_members(tx, shape_ids);
            let added = with_group(tx, group_id, |group| {
                let members = group.shape_ids.get_or_insert(backlinked);
                candidates
                    .iter()
                    .filter(|id| members.insert(**id))
                    .copied()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
            for shape_id in &candidates {
                tx.update_shape(*shape_id, |shape| {
                    shape.meta.linkable_groups.insert(group_id.clone());
                });
            }
            added.len()
        })
    }

    /// Remove shapes from a group; returns how many were members
    pub fn detach_shapes(&mut self, group_id: &GroupId, shape_ids: &[ShapeId]) -> usize {
        self.doc.run(Source::User, |tx| {
            if !page_has_group(tx, group_id) {
                return 0;
            }
            let mut detached = 0;
            for shape_id in shape_ids {
                let mut was_member = false;
                tx.update_shape(*shape_id, |shape| {
                    was_member = shape.meta.linkable_groups.remove(group_id);
                });
                let listed = with_group(tx, group_id, |group| {
                    group
                        .shape_ids
                        .as_mut()
                        .is_some_and(|members| members.remove(shape_id))
                })
                .unwrap_or(false);
                if was_member || listed {
                    detached += 1;
                }
            }
            detached
        })
    }
}

impl Document {
    /// Group reads
    pub fn groups(&self) -> Groups<'_> {
        Groups { doc: self }
    }

    /// Group writes
    pub fn groups_mut(&mut self) -> GroupsMut<'_> {
        GroupsMut { doc: self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Record, RecordId};
    use crate::shapes::{Point, ShapeKind};

    fn stroke(doc: &mut Document) -> ShapeId {
        let shape = Shape::new(
            doc.current_page_id(),
            ShapeKind::Draw {
                points: vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
                is_complete: true,
            },
        );
        doc.create_shape(shape).unwrap()
    }

    #[test]
    fn generated_ids_have_prefix_and_differ() {
        let a = GroupId::generate();
        let b = GroupId::generate();
        assert!(a.as_str().starts_with("group_"));
        assert!(LinkFileId::generate().as_str().starts_with("file_"));
        assert_ne!(a, b);
    }

    #[test]
    fn default_link_names() {
        assert_eq!(default_link_name(Some("Notes"), "a/b.md"), "Notes");
        assert_eq!(default_link_name(None, "a/b.md"), "b.md");
        assert_eq!(default_link_name(Some(""), "b.md"), "b.md");
        assert_eq!(default_link_name(None, "dir/"), "Untitled");
        assert_eq!(default_link_name(None, ""), "Untitled");
    }

    #[test]
    fn create_group_backlinks_members() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let s2 = stroke(&mut doc);
        let gid = doc
            .groups_mut()
            .create_group("Refs", ShapeColor::Blue, &[s1, s2, ShapeId::new()]);

        let group = doc.groups().group(&gid).cloned().unwrap();
        assert_eq!(group.shape_ids, Some(BTreeSet::from([s1, s2])));
        assert!(doc.shape(s1).unwrap().linkable_groups().contains(&gid));
        assert!(doc.shape(s2).unwrap().linkable_groups().contains(&gid));
    }

    #[test]
    fn duplicate_link_is_rejected_but_other_path_is_accepted() {
        let mut doc = Document::new();
        let gid = doc.groups_mut().create_group("G", ShapeColor::Red, &[]);

        let first = doc.groups_mut().add_file(&gid, NewLinkFile::new("p").named("A"));
        assert!(matches!(first, AddFileOutcome::Added(_)));
        let again = doc.groups_mut().add_file(&gid, NewLinkFile::new("p").named("A"));
        assert_eq!(again, AddFileOutcome::Duplicate);
        let other = doc.groups_mut().add_file(&gid, NewLinkFile::new("q").named("A"));
        assert!(matches!(other, AddFileOutcome::Added(_)));

        assert_eq!(doc.groups().group(&gid).unwrap().link_files.len(), 2);
    }

    #[test]
    fn update_file_excludes_itself_from_duplicate_check() {
        let mut doc = Document::new();
        let gid = doc.groups_mut().create_group("G", ShapeColor::Red, &[]);
        let AddFileOutcome::Added(a) =
            doc.groups_mut().add_file(&gid, NewLinkFile::new("a.md"))
        else {
            panic!("expected add");
        };
        doc.groups_mut().add_file(&gid, NewLinkFile::new("b.md"));

        let same = LinkFilePatch {
            path: Some("a.md".into()),
            line: Some(NonZeroU32::new(4)),
            ..Default::default()
        };
        assert_eq!(
            doc.groups_mut().update_file(&gid, &a.id, same),
            UpdateFileOutcome::Updated
        );

        let clash = LinkFilePatch {
            name: Some("b.md".into()),
            path: Some("b.md".into()),
            ..Default::default()
        };
        assert_eq!(
            doc.groups_mut().update_file(&gid, &a.id, clash),
            UpdateFileOutcome::Duplicate
        );
        let group = doc.groups().group(&gid).unwrap();
        assert_eq!(group.file(&a.id).unwrap().line, NonZeroU32::new(4));
        assert_eq!(group.file(&a.id).unwrap().path, "a.md");
    }

    #[test]
    fn lookup_misses_are_no_ops() {
        let mut doc = Document::new();
        let unknown = GroupId::from("group_missing");
        let mut groups = doc.groups_mut();
        assert!(!groups.update_group(&unknown, GroupPatch::default()));
        assert_eq!(
            groups.add_file(&unknown, NewLinkFile::new("x")),
            AddFileOutcome::UnknownGroup
        );
        assert!(!groups.remove_group(&unknown));
        assert!(!groups.remove_file(&unknown, &LinkFileId::from("file_x")));
        assert!(doc.groups().shapes_for_group(&unknown).is_empty());
    }

    #[test]
    fn update_group_merges_fields() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let gid = doc.groups_mut().create_group("Draft", ShapeColor::Red, &[s1]);
        let listener = doc.listen(crate::records::ListenFilter::user());

        let rename = GroupPatch {
            name: Some("Outline".into()),
            ..Default::default()
        };
        assert!(doc.groups_mut().update_group(&gid, rename));
        let group = doc.groups().group(&gid).cloned().unwrap();
        assert_eq!((group.name.as_str(), group.color), ("Outline", ShapeColor::Red));

        let recolor = GroupPatch {
            color: Some(ShapeColor::Violet),
            ..Default::default()
        };
        assert!(doc.groups_mut().update_group(&gid, recolor));
        let group = doc.groups().group(&gid).cloned().unwrap();
        assert_eq!((group.name.as_str(), group.color), ("Outline", ShapeColor::Violet));

        let both = GroupPatch {
            name: Some("Final".into()),
            color: Some(ShapeColor::Green),
        };
        assert!(doc.groups_mut().update_group(&gid, both));

        // Known group, nothing to merge: fields stay and no batch is emitted
        assert!(doc.groups_mut().update_group(&gid, GroupPatch::default()));

        let entries = listener.drain();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.source == Source::User));
        let page_id = doc.current_page_id();
        assert!(entries.iter().all(|e| {
            e.changes.updated.len() == 1
                && e.changes.updated.contains_key(&RecordId::Page(page_id))
        }));

        let json = serde_json::to_string(&doc.snapshot()).unwrap();
        let restored = Document::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();
        let group = restored.groups().group(&gid).cloned().unwrap();
        assert_eq!(group.name, "Final");
        assert_eq!(group.color, ShapeColor::Green);
        assert_eq!(group.shape_ids, Some(BTreeSet::from([s1])));
    }

    #[test]
    fn remove_group_strips_backlinks() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let gid = doc.groups_mut().create_group("G", ShapeColor::Green, &[s1]);
        let keep = doc.groups_mut().create_group("H", ShapeColor::Green, &[s1]);
        assert!(doc.groups_mut().remove_group(&gid));
        assert!(doc.groups().group(&gid).is_none());
        assert_eq!(
            doc.shape(s1).unwrap().linkable_groups(),
            &BTreeSet::from([keep])
        );
    }

    #[test]
    fn legacy_group_falls_back_to_backlink_scan() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let s2 = stroke(&mut doc);
        let gid = doc.groups_mut().create_group("Old", ShapeColor::Grey, &[s1]);

        // Drop the member set the way older documents stored groups
        let page_id = doc.current_page_id();
        doc.run(Source::User, |tx| {
            tx.update_page(page_id, |page| {
                if let Some(group) = page.meta.linkable_groups.get_mut(&gid) {
                    group.shape_ids = None;
                }
            });
        });
        assert_eq!(doc.groups().shapes_for_group(&gid), vec![s1]);

        assert_eq!(doc.groups_mut().attach_shapes(&gid, &[s2]), 1);
        let group = doc.groups().group(&gid).unwrap();
        assert_eq!(group.shape_ids, Some(BTreeSet::from([s1, s2])));
    }

    #[test]
    fn detach_and_deleted_members() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let s2 = stroke(&mut doc);
        let gid = doc.groups_mut().create_group("G", ShapeColor::Blue, &[s1, s2]);

        assert_eq!(doc.groups_mut().detach_shapes(&gid, &[s2]), 1);
        assert!(doc.shape(s2).unwrap().linkable_groups().is_empty());

        doc.delete_shapes(&[s1]);
        assert!(doc.groups().shapes_for_group(&gid).is_empty());
    }

    #[test]
    fn deleting_members_prunes_group_ids() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let s2 = stroke(&mut doc);
        let gid = doc.groups_mut().create_group("G", ShapeColor::Blue, &[s1, s2]);
        let other = doc.groups_mut().create_group("H", ShapeColor::Red, &[s1]);
        let listener = doc.listen(crate::records::ListenFilter::user());

        assert_eq!(doc.delete_shapes(&[s1]), 1);
        let groups = doc.groups();
        assert_eq!(groups.group(&gid).unwrap().shape_ids, Some(BTreeSet::from([s2])));
        assert_eq!(groups.group(&other).unwrap().shape_ids, Some(BTreeSet::new()));

        // Erase and prune land in the same batch
        let entries = listener.drain();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].changes.removed.contains_key(&RecordId::Shape(s1)));
        assert!(entries[0].changes.updated.contains_key(&RecordId::Page(doc.current_page_id())));

        let json = serde_json::to_string(&doc.snapshot()).unwrap();
        assert!(!json.contains(&s1.0.to_string()));
    }

    #[test]
    fn visible_groups_follow_selection() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let s2 = stroke(&mut doc);
        let g1 = doc.groups_mut().create_group("A", ShapeColor::Blue, &[s1]);
        let g2 = doc.groups_mut().create_group("B", ShapeColor::Blue, &[s2]);

        let all: Vec<_> = doc.groups().visible_groups(&[]).iter().map(|g| g.id.clone()).collect();
        assert_eq!(all.len(), 2);
        let only: Vec<_> = doc.groups().visible_groups(&[s2]).iter().map(|g| g.id.clone()).collect();
        assert_eq!(only, vec![g2]);
        assert!(doc.groups().groups_for_shapes(&[s1, s2]).contains(&g1));
    }

    #[test]
    fn group_edit_is_one_document_batch() {
        let mut doc = Document::new();
        let s1 = stroke(&mut doc);
        let listener = doc.listen(crate::records::ListenFilter::all());
        doc.groups_mut().create_group("G", ShapeColor::Blue, &[s1]);

        let entries = listener.drain();
        assert_eq!(entries.len(), 1);
        let changes = &entries[0].changes;
        assert!(changes.updated.contains_key(&RecordId::Shape(s1)));
        assert!(matches!(
            changes.updated.get(&RecordId::Page(doc.current_page_id())),
            Some((Record::Page(_), Record::Page(_)))
        ));
    }

    #[test]
    fn group_json_uses_link_files_key_and_optional_shape_ids() {
        let json = r#"{
            "id": "group_abc",
            "name": "Legacy",
            "color": "violet",
            "createdAt": "2024-05-01T10:00:00Z",
            "link_files": [{"id": "file_1", "name": "n", "path": "a.md", "line": 3}]
        }"#;
        let group: Group = serde_json::from_str(json).unwrap();
        assert_eq!(group.shape_ids, None);
        assert_eq!(group.link_files[0].line, NonZeroU32::new(3));

        let out = serde_json::to_value(&group).unwrap();
        assert!(out.get("link_files").is_some());
        assert!(out.get("shapeIds").is_none());
    }
}
