//! Host application capabilities: opening linked files and listing the
//! resources a link may point at.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use inklink_core::LinkFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum suggestions returned by default
pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("file not found: {0}")]
    MissingResource(String),
    #[error("{0} cannot be opened as text")]
    NotATextView(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// 0-based editor position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPos {
    pub line: u32,
    pub ch: u32,
}

/// Editor navigation offered by the host. Lines are 0-based here.
pub trait HostNavigator {
    type Handle;

    fn open_file(&mut self, path: &str) -> Result<Self::Handle, HostError>;
    fn set_cursor(&mut self, handle: &Self::Handle, pos: CursorPos) -> Result<(), HostError>;
    fn scroll_into_view(
        &mut self,
        handle: &Self::Handle,
        from: CursorPos,
        to: CursorPos,
        center: bool,
    ) -> Result<(), HostError>;
    fn focus(&mut self, handle: &Self::Handle) -> Result<(), HostError>;
}

/// Open a link's file and put the cursor on its line (1-based, default 1).
/// Nothing is navigated when the file cannot be opened.
pub fn open_link<H: HostNavigator>(host: &mut H, link: &LinkFile) -> Result<CursorPos, HostError> {
    let handle = host.open_file(&link.path)?;
    let pos = CursorPos {
        line: link.line.map_or(0, |line| line.get() - 1),
        ch: 0,
    };
    host.set_cursor(&handle, pos)?;
    host.scroll_into_view(&handle, pos, pos, true)?;
    host.focus(&handle)?;
    debug!(path = %link.path, line = pos.line, "Opened link");
    Ok(pos)
}

/// Source of resource paths for suggestions
pub trait Vault {
    fn resource_paths(&self) -> Vec<String>;
}

impl Vault for Vec<String> {
    fn resource_paths(&self) -> Vec<String> {
        self.clone()
    }
}

/// Paths containing `query`, case-insensitive. A blank query suggests nothing.
pub fn suggest_paths<V: Vault + ?Sized>(vault: &V, query: &str, limit: usize) -> Vec<String> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    vault
        .resource_paths()
        .into_iter()
        .filter(|path| path.to_lowercase().contains(&needle))
        .take(limit)
        .collect()
}

/// An opened text file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsHandle {
    pub path: String,
    pub line_count: u32,
}

/// Host backed by a vault directory on disk
#[derive(Debug, Clone)]
pub struct FsHost {
    root: PathBuf,
    cursor: Option<(String, CursorPos)>,
    focused: Option<String>,
}

impl FsHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cursor: None,
            focused: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File and position of the last cursor placement
    pub fn cursor(&self) -> Option<(&str, CursorPos)> {
        self.cursor.as_ref().map(|(path, pos)| (path.as_str(), *pos))
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    fn collect(&self, dir: &Path, out: &mut Vec<String>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), "Cannot list directory: {e}");
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden {
                continue;
            }
            if path.is_dir() {
                self.collect(&path, out);
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
    }
}

impl Vault for FsHost {
    /// Vault-relative paths with `/` separators, sorted
    fn resource_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect(&self.root, &mut out);
        out.sort();
        out
    }
}

impl HostNavigator for FsHost {
    type Handle = FsHandle;

    fn open_file(&mut self, path: &str) -> Result<FsHandle, HostError> {
        let full = self.root.join(path);
        if !full.is_file() {
            return Err(HostError::MissingResource(path.to_string()));
        }
        let content = match fs::read_to_string(&full) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(HostError::NotATextView(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(FsHandle {
            path: path.to_string(),
            line_count: content.lines().count() as u32,
        })
    }

    fn set_cursor(&mut self, handle: &FsHandle, pos: CursorPos) -> Result<(), HostError> {
        let last_line = handle.line_count.saturating_sub(1);
        let pos = CursorPos {
            line: pos.line.min(last_line),
            ch: pos.ch,
        };
        self.cursor = Some((handle.path.clone(), pos));
        Ok(())
    }

    fn scroll_into_view(
        &mut self,
        _handle: &FsHandle,
        _from: CursorPos,
        _to: CursorPos,
        _center: bool,
    ) -> Result<(), HostError> {
        Ok(())
    }

    fn focus(&mut self, handle: &FsHandle) -> Result<(), HostError> {
        self.focused = Some(handle.path.clone());
        Ok(())
    }
}
