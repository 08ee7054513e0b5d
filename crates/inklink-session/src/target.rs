//! Where the pipeline writes envelopes.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::envelope::Envelope;

/// Destination for saved envelopes
pub trait SaveTarget {
    fn write(&mut self, envelope: &Envelope) -> Result<()>;
}

/// Writes the envelope to a file on disk
#[derive(Debug, Clone)]
pub struct FileTarget {
    path: PathBuf,
}

impl FileTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SaveTarget for FileTarget {
    fn write(&mut self, envelope: &Envelope) -> Result<()> {
        envelope.save_to(&self.path)?;
        debug!(path = %self.path.display(), "Wrote envelope");
        Ok(())
    }
}

/// Keeps every written envelope in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    pub writes: Vec<Envelope>,
}

impl MemoryTarget {
    pub fn last(&self) -> Option<&Envelope> {
        self.writes.last()
    }
}

impl SaveTarget for MemoryTarget {
    fn write(&mut self, envelope: &Envelope) -> Result<()> {
        self.writes.push(envelope.clone());
        Ok(())
    }
}
