//! Tiered persistence driven by classified user activity.
//!
//! - instant tier: layout normalization, run as soon as a stroke finishes or
//!   shapes are erased
//! - short tier: incremental save (no preview, marked outdated)
//! - long tier: complete save with a rendered preview
//!
//! Both debounced tiers are deadlines checked in `poll`; nothing runs on its
//! own thread.

use std::time::Duration;

use anyhow::Result;
use inklink_core::{
    Activity, ChangeListener, Document, LayoutRules, ListenFilter, classify, normalize_layout,
};
use inklink_export::render_preview_uri;
use tracing::{debug, warn};

use crate::clock::{Clock, DebounceTimer};
use crate::envelope::Envelope;
use crate::target::SaveTarget;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub short_delay: Duration,
    pub long_delay: Duration,
    pub layout: LayoutRules,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            short_delay: Duration::from_millis(500),
            long_delay: Duration::from_millis(2000),
            layout: LayoutRules::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    Incremental,
    Complete,
}

pub struct PersistencePipeline<C: Clock, T: SaveTarget> {
    clock: C,
    target: T,
    config: PipelineConfig,
    listener: Option<ChangeListener>,
    short: DebounceTimer,
    long: DebounceTimer,
    halted: bool,
}

impl<C: Clock, T: SaveTarget> PersistencePipeline<C, T> {
    pub fn new(clock: C, target: T, config: PipelineConfig) -> Self {
        Self {
            clock,
            target,
            short: DebounceTimer::new(config.short_delay),
            long: DebounceTimer::new(config.long_delay),
            config,
            listener: None,
            halted: false,
        }
    }

    /// Start watching user changes on `doc`
    pub fn attach(&mut self, doc: &mut Document) {
        self.listener = Some(doc.listen(ListenFilter::user()));
        self.halted = false;
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Whether either debounced tier is waiting
    pub fn has_pending_save(&self) -> bool {
        self.short.is_pending() || self.long.is_pending()
    }

    /// Classify pending changes and schedule tiers. Returns the activities
    /// seen, in order.
    pub fn pump(&mut self, doc: &mut Document) -> Vec<Activity> {
        let entries = match &self.listener {
            Some(listener) => listener.drain(),
            None => return Vec::new(),
        };

        let mut seen = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.changes.is_empty() {
                continue;
            }
            let activity = classify(&entry);
            if activity.is_drawing_in_progress() {
                self.reset_timers();
            } else if activity.finishes_edit() {
                self.queue_or_run_post_processes(doc);
            } else if activity == Activity::Other && entry.changes.touches_persistent_records() {
                // Camera and pointer activity never schedules
                self.schedule_saves();
            }
            seen.push(activity);
        }
        seen
    }

    /// Run the instant tier, then (re)schedule both debounced tiers
    pub fn queue_or_run_post_processes(&mut self, doc: &mut Document) {
        if let Some(height) = normalize_layout(doc, &self.config.layout) {
            debug!(height, "Page grown");
        }
        self.schedule_saves();
    }

    fn schedule_saves(&mut self) {
        if self.halted {
            return;
        }
        let now = self.clock.now();
        self.short.reset(now);
        self.long.reset(now);
    }

    /// Cancel both debounced tiers
    pub fn reset_timers(&mut self) {
        self.short.cancel();
        self.long.cancel();
    }

    /// Run whichever tier is due. A due complete save supersedes a pending
    /// incremental one. Failures are logged; the next activity reschedules.
    pub fn poll(&mut self, doc: &Document) -> Option<SaveKind> {
        let now = self.clock.now();
        if self.long.fire(now) {
            self.short.cancel();
            if let Err(e) = self.complete_save(doc) {
                warn!("Complete save failed: {e:#}");
            }
            return Some(SaveKind::Complete);
        }
        if self.short.fire(now) {
            if let Err(e) = self.incremental_save(doc) {
                warn!("Incremental save failed: {e:#}");
            }
            return Some(SaveKind::Incremental);
        }
        None
    }

    /// `pump` then `poll`
    pub fn tick(&mut self, doc: &mut Document) -> Option<SaveKind> {
        self.pump(doc);
        self.poll(doc)
    }

    /// Snapshot without a preview, flagged outdated
    pub fn incremental_save(&mut self, doc: &Document) -> Result<()> {
        debug!("Incremental save");
        let envelope = Envelope::from_document(doc, None, true);
        self.target.write(&envelope)
    }

    /// Snapshot with a freshly rendered preview. Falls back to no preview
    /// when there is nothing to render.
    pub fn complete_save(&mut self, doc: &Document) -> Result<()> {
        debug!("Complete save");
        let mut envelope = Envelope::from_document(doc, None, false);
        envelope.preview_image = render_preview_uri(&envelope.document_snapshot);
        self.target.write(&envelope)
    }

    /// Cancel pending tiers and save completely, right now
    pub fn flush(&mut self, doc: &Document) -> Result<()> {
        self.reset_timers();
        self.complete_save(doc)
    }

    /// Stop reacting to changes
    pub fn halt(&mut self) {
        self.reset_timers();
        self.listener = None;
        self.halted = true;
    }

    /// Flush then halt. The pipeline halts even if the save fails.
    pub fn save_and_halt(&mut self, doc: &Document) -> Result<()> {
        let result = self.flush(doc);
        self.halt();
        result
    }
}
