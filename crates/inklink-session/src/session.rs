//! An open ink file: live document plus the pipeline that persists it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use inklink_core::{Document, normalize_layout};
use tracing::info;

use crate::clock::Clock;
use crate::envelope::Envelope;
use crate::pipeline::{PersistencePipeline, PipelineConfig, SaveKind};
use crate::target::{FileTarget, SaveTarget};

/// Kind of ink file, which decides its default folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InkKind {
    Writing,
    Drawing,
}

/// File extension for ink files
pub const INK_EXTENSION: &str = "ink";

pub struct InkSession<C: Clock> {
    path: PathBuf,
    doc: Document,
    pipeline: PersistencePipeline<C, FileTarget>,
    backfilled: bool,
}

impl<C: Clock> InkSession<C> {
    /// Create a new file with one empty page and save it
    pub fn create(path: impl Into<PathBuf>, clock: C, config: PipelineConfig) -> Result<Self> {
        let path = path.into();
        let mut doc = Document::new();
        normalize_layout(&mut doc, &config.layout);

        let mut pipeline = PersistencePipeline::new(clock, FileTarget::new(&path), config);
        pipeline.attach(&mut doc);
        pipeline
            .flush(&doc)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        info!(path = %path.display(), "Created ink file");

        Ok(Self {
            path,
            doc,
            pipeline,
            backfilled: false,
        })
    }

    /// Open an existing file. A legacy file missing `linkGroups` is written
    /// back once, right away.
    pub fn open(path: impl Into<PathBuf>, clock: C, config: PipelineConfig) -> Result<Self> {
        let path = path.into();
        let loaded = Envelope::load(&path)?;
        let mut doc = loaded.envelope.to_document()?;

        let mut pipeline = PersistencePipeline::new(clock, FileTarget::new(&path), config);
        if loaded.did_backfill {
            pipeline
                .target_mut()
                .write(&loaded.envelope)
                .context("Failed to save backfilled envelope")?;
        }
        pipeline.attach(&mut doc);

        Ok(Self {
            path,
            doc,
            pipeline,
            backfilled: loaded.did_backfill,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn pipeline(&self) -> &PersistencePipeline<C, FileTarget> {
        &self.pipeline
    }

    /// Whether opening repaired a legacy envelope
    pub fn was_backfilled(&self) -> bool {
        self.backfilled
    }

    /// Process pending changes and run due save tiers
    pub fn tick(&mut self) -> Option<SaveKind> {
        self.pipeline.tick(&mut self.doc)
    }

    /// Complete save now
    pub fn flush(&mut self) -> Result<()> {
        self.pipeline.pump(&mut self.doc);
        self.pipeline.flush(&self.doc)
    }

    /// Save and stop the pipeline
    pub fn close(mut self) -> Result<()> {
        self.pipeline.pump(&mut self.doc);
        self.pipeline.save_and_halt(&self.doc)
    }
}

/// Default location for a new ink file inside a vault
pub fn default_file_path(vault: &Path, subfolder: &str, name: &str) -> PathBuf {
    let file = if name.ends_with(&format!(".{INK_EXTENSION}")) {
        name.to_string()
    } else {
        format!("{name}.{INK_EXTENSION}")
    };
    vault.join(subfolder).join(file)
}
