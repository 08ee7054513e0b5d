//! Maps one committed batch to the user activity it represents.

use tracing::trace;

use crate::records::{ChangeEntry, Record, RecordKind, Source};

/// What a change-stream entry means to the persistence pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    PointerMoved,
    CameraMovedAutomatically,
    CameraMovedManually,
    DrawingStarted,
    DrawingContinued,
    DrawingCompleted,
    DrawingErased,
    Other,
}

impl Activity {
    /// Activities that run the instant tier and schedule both save tiers
    pub fn finishes_edit(self) -> bool {
        matches!(self, Activity::DrawingCompleted | Activity::DrawingErased)
    }

    /// Activities that push back the pending saves
    pub fn is_drawing_in_progress(self) -> bool {
        matches!(self, Activity::DrawingStarted | Activity::DrawingContinued)
    }
}

/// Classify a non-empty entry. Checks run from most to least specific.
pub fn classify(entry: &ChangeEntry) -> Activity {
    let changes = &entry.changes;
    let kinds = changes.kinds();

    let activity = if !kinds.is_empty() && kinds.iter().all(|k| *k == RecordKind::Pointer) {
        Activity::PointerMoved
    } else if !kinds.is_empty() && kinds.iter().all(|k| *k == RecordKind::Camera) {
        match entry.source {
            Source::User => Activity::CameraMovedManually,
            Source::Programmatic => Activity::CameraMovedAutomatically,
        }
    } else if changes
        .added
        .values()
        .any(|r| matches!(r, Record::Shape(s) if s.kind.is_live_stroke()))
    {
        Activity::DrawingStarted
    } else if changes.updated.values().any(|(before, after)| {
        matches!((before, after), (Record::Shape(b), Record::Shape(a))
            if b.kind.is_live_stroke() && a.kind.is_live_stroke())
    }) {
        Activity::DrawingContinued
    } else if changes.updated.values().any(|(before, after)| {
        matches!((before, after), (Record::Shape(b), Record::Shape(a))
            if !b.kind.is_finished_stroke() && a.kind.is_finished_stroke())
    }) || changes
        .added
        .values()
        .any(|r| matches!(r, Record::Shape(s) if s.kind.is_finished_stroke()))
    {
        Activity::DrawingCompleted
    } else if changes.removed.values().any(|r| matches!(r, Record::Shape(_))) {
        Activity::DrawingErased
    } else {
        Activity::Other
    };

    trace!(?activity, source = ?entry.source, "Classified change");
    activity
}
