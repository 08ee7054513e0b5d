//! UI mode of an embedded ink file: static preview or live editor.

use std::sync::mpsc;
use std::time::Duration;

use inklink_core::Document;
use thiserror::Error;
use tracing::debug;

use crate::clock::{Clock, DebounceTimer};
use crate::pipeline::PersistencePipeline;
use crate::target::SaveTarget;

/// Delay before an embed that should open immediately switches to the editor
pub const AUTO_ACTIVATE_DELAY: Duration = Duration::from_millis(200);
/// Delay between the preview image loading and showing it
pub const PREVIEW_FLICKER_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedState {
    #[default]
    Preview,
    LoadingEditor,
    Editor,
    LoadingPreview,
}

impl EmbedState {
    /// The only state each state may move to
    pub fn next(self) -> EmbedState {
        match self {
            EmbedState::Preview => EmbedState::LoadingEditor,
            EmbedState::LoadingEditor => EmbedState::Editor,
            EmbedState::Editor => EmbedState::LoadingPreview,
            EmbedState::LoadingPreview => EmbedState::Preview,
        }
    }

    /// Preview is shown while not fully in the editor
    pub fn preview_active(self) -> bool {
        self != EmbedState::Editor
    }

    /// Editor is mounted while not fully in the preview
    pub fn editor_active(self) -> bool {
        self != EmbedState::Preview
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal embed transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: EmbedState,
    pub to: EmbedState,
}

/// Embed state container with change notification and one delayed
/// transition slot
pub struct EmbedController<C: Clock> {
    clock: C,
    state: EmbedState,
    subscribers: Vec<mpsc::Sender<EmbedState>>,
    scheduled: Option<(EmbedState, DebounceTimer)>,
}

impl<C: Clock> EmbedController<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: EmbedState::Preview,
            subscribers: Vec::new(),
            scheduled: None,
        }
    }

    pub fn state(&self) -> EmbedState {
        self.state
    }

    pub fn preview_active(&self) -> bool {
        self.state.preview_active()
    }

    pub fn editor_active(&self) -> bool {
        self.state.editor_active()
    }

    /// Receive every state change from now on
    pub fn subscribe(&mut self) -> mpsc::Receiver<EmbedState> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Move to `to` if the transition table allows it
    pub fn transition(&mut self, to: EmbedState) -> Result<(), TransitionError> {
        if self.state.next() != to {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        debug!(from = ?self.state, ?to, "Embed state");
        self.state = to;
        self.subscribers.retain(|tx| tx.send(to).is_ok());
        Ok(())
    }

    /// Run `transition(to)` once `delay` has passed. Replaces any earlier
    /// scheduled transition.
    pub fn schedule(&mut self, to: EmbedState, delay: Duration) {
        let mut timer = DebounceTimer::new(delay);
        timer.reset(self.clock.now());
        self.scheduled = Some((to, timer));
    }

    pub fn cancel_scheduled(&mut self) {
        self.scheduled = None;
    }

    pub fn has_scheduled(&self) -> bool {
        self.scheduled.is_some()
    }

    /// Apply a due scheduled transition
    pub fn poll(&mut self) -> Option<Result<EmbedState, TransitionError>> {
        let now = self.clock.now();
        let (to, timer) = self.scheduled.as_mut()?;
        if !timer.fire(now) {
            return None;
        }
        let to = *to;
        self.scheduled = None;
        Some(self.transition(to).map(|()| to))
    }

    /// Open the editor, after the auto-activate delay when `delayed`
    pub fn switch_to_edit_mode(&mut self, delayed: bool) -> Result<(), TransitionError> {
        if delayed {
            self.schedule(EmbedState::LoadingEditor, AUTO_ACTIVATE_DELAY);
            Ok(())
        } else {
            self.transition(EmbedState::LoadingEditor)
        }
    }

    /// The editor finished mounting
    pub fn editor_mounted(&mut self) -> Result<(), TransitionError> {
        self.transition(EmbedState::Editor)
    }

    /// Flush and halt the editor's pipeline, then start loading the preview.
    /// A failed save leaves the editor open.
    pub fn save_and_switch_to_preview<P: Clock, T: SaveTarget>(
        &mut self,
        pipeline: &mut PersistencePipeline<P, T>,
        doc: &Document,
    ) -> anyhow::Result<()> {
        if self.state != EmbedState::Editor {
            return Err(TransitionError {
                from: self.state,
                to: EmbedState::LoadingPreview,
            }
            .into());
        }
        pipeline.save_and_halt(doc)?;
        self.transition(EmbedState::LoadingPreview)?;
        Ok(())
    }

    /// The preview image loaded; show it after the flicker delay
    pub fn preview_loaded(&mut self) {
        self.schedule(EmbedState::Preview, PREVIEW_FLICKER_DELAY);
    }
}
