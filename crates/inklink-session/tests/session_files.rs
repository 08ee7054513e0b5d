//! Ink files on disk: create, reopen, legacy repair and link navigation.

#![allow(clippy::unwrap_used)]

use std::fs;
use std::num::NonZeroU32;

use inklink_core::{LinkFile, LinkFileId, Point, Shape, ShapeColor, ShapeKind};
use inklink_session::{
    CursorPos, Envelope, FsHost, HostError, InkKind, InkSession, ManualClock, PipelineConfig,
    Settings, Vault, default_file_path, open_link, suggest_paths,
};

fn link(path: &str, line: Option<u32>) -> LinkFile {
    LinkFile {
        id: LinkFileId::generate(),
        name: path.to_string(),
        path: path.to_string(),
        line: line.and_then(NonZeroU32::new),
    }
}

// ─── Sessions ─────────────────────────────────────────────────────────

#[test]
fn test_create_then_reopen_keeps_strokes_and_groups() {
    let dir = tempfile::tempdir().unwrap();
    let path = default_file_path(dir.path(), Settings::default().subfolder(InkKind::Writing), "day one");
    assert!(path.ends_with("Ink/Writing/day one.ink"));

    let mut session =
        InkSession::create(&path, ManualClock::new(), PipelineConfig::default()).unwrap();
    assert!(path.is_file());

    let page = session.doc().current_page_id();
    let shape = Shape::new(
        page,
        ShapeKind::Draw {
            points: vec![Point::new(0.0, 0.0), Point::new(40.0, 20.0)],
            is_complete: true,
        },
    );
    let id = session.doc_mut().create_shape(shape).unwrap();
    let gid = session
        .doc_mut()
        .groups_mut()
        .create_group("Sources", ShapeColor::Green, &[id]);
    session.close().unwrap();

    let reopened = InkSession::open(&path, ManualClock::new(), PipelineConfig::default()).unwrap();
    assert!(!reopened.was_backfilled());
    assert!(reopened.doc().shape(id).is_some());
    assert_eq!(reopened.doc().groups().shapes_for_group(&gid), vec![id]);

    let saved = Envelope::load(&path).unwrap().envelope;
    assert!(saved.link_groups.contains_key(&gid));
    assert!(saved.preview_image.is_some());
}

#[test]
fn test_legacy_file_is_repaired_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.ink");

    let session = InkSession::create(&path, ManualClock::new(), PipelineConfig::default()).unwrap();
    session.close().unwrap();

    // Strip linkGroups the way files from older versions look
    let mut json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    json.as_object_mut().unwrap().remove("linkGroups");
    fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();
    assert!(Envelope::load(&path).unwrap().did_backfill);

    let first = InkSession::open(&path, ManualClock::new(), PipelineConfig::default()).unwrap();
    assert!(first.was_backfilled());
    assert!(fs::read_to_string(&path).unwrap().contains("\"linkGroups\""));

    let second = InkSession::open(&path, ManualClock::new(), PipelineConfig::default()).unwrap();
    assert!(!second.was_backfilled());
}

#[test]
fn test_open_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ink");
    fs::write(&path, "not an envelope").unwrap();
    assert!(InkSession::open(&path, ManualClock::new(), PipelineConfig::default()).is_err());
    assert!(InkSession::open(dir.path().join("absent.ink"), ManualClock::new(), PipelineConfig::default()).is_err());
}

#[test]
fn test_session_tick_saves_after_delay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tick.ink");
    let clock = ManualClock::new();
    let mut session = InkSession::create(&path, clock.clone(), PipelineConfig::default()).unwrap();

    let page = session.doc().current_page_id();
    let shape = Shape::new(
        page,
        ShapeKind::Draw {
            points: vec![Point::new(1.0, 1.0), Point::new(9.0, 9.0)],
            is_complete: true,
        },
    );
    session.doc_mut().create_shape(shape).unwrap();
    assert!(session.tick().is_none());

    clock.advance_ms(500);
    session.tick();
    let saved = Envelope::load(&path).unwrap().envelope;
    assert_eq!(saved.document_snapshot.shapes.len(), 1);
    assert!(saved.meta.preview_is_outdated);
}

// ─── Host navigation ──────────────────────────────────────────────────

#[test]
fn test_open_link_converts_line_numbers() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("notes")).unwrap();
    fs::write(dir.path().join("notes/a.md"), "one\ntwo\nthree\nfour\n").unwrap();
    let mut host = FsHost::new(dir.path());

    let pos = open_link(&mut host, &link("notes/a.md", Some(3))).unwrap();
    assert_eq!(pos, CursorPos { line: 2, ch: 0 });
    assert_eq!(host.cursor(), Some(("notes/a.md", CursorPos { line: 2, ch: 0 })));
    assert_eq!(host.focused(), Some("notes/a.md"));

    let pos = open_link(&mut host, &link("notes/a.md", None)).unwrap();
    assert_eq!(pos.line, 0);
}

#[test]
fn test_missing_file_navigates_nowhere() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = FsHost::new(dir.path());

    let err = open_link(&mut host, &link("gone.md", Some(5))).unwrap_err();
    assert!(matches!(err, HostError::MissingResource(p) if p == "gone.md"));
    assert_eq!(host.cursor(), None);
    assert_eq!(host.focused(), None);
}

#[test]
fn test_binary_file_is_not_a_text_view() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("image.png"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
    let mut host = FsHost::new(dir.path());

    let err = open_link(&mut host, &link("image.png", None)).unwrap_err();
    assert!(matches!(err, HostError::NotATextView(_)));
    assert_eq!(host.focused(), None);
}

#[test]
fn test_vault_suggestions_skip_hidden_entries() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("Projects/ink")).unwrap();
    fs::create_dir_all(dir.path().join(".trash")).unwrap();
    fs::write(dir.path().join("Projects/ink/plan.md"), "").unwrap();
    fs::write(dir.path().join("Projects/roadmap.md"), "").unwrap();
    fs::write(dir.path().join(".trash/plan.md"), "").unwrap();
    let host = FsHost::new(dir.path());

    assert_eq!(
        host.resource_paths(),
        vec!["Projects/ink/plan.md", "Projects/roadmap.md"]
    );
    assert_eq!(suggest_paths(&host, "PLAN", 10), vec!["Projects/ink/plan.md"]);
    assert_eq!(suggest_paths(&host, "projects", 1).len(), 1);
}
