//! Command handlers behind the CLI.
//!
//! Every mutating command opens the file, applies its edits in one go and
//! closes the session, which performs a complete save. A command that fails
//! leaves the file untouched.

use std::fmt::Write as _;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use inklink_core::{
    AddFileOutcome, Document, GroupId, GroupPatch, LinkFileId, LinkFilePatch, NewLinkFile,
    ShapeColor, ShapeId, UpdateFileOutcome,
};
use inklink_export::{group_overlays, render_preview, save_preview};
use inklink_session::{
    ActiveMarkdown, Envelope, FsHost, InkKind, InkSession, Settings, SystemClock, TargetRule,
    compute_target, default_file_path, suggest_paths,
};
use tracing::info;

pub struct App {
    settings: Settings,
    vault: PathBuf,
}

impl App {
    pub fn new(settings: Settings, vault: PathBuf) -> Self {
        Self { settings, vault }
    }

    /// Open `file`, apply `f`, save and close. Nothing is saved when `f` fails.
    fn edit<T>(&self, file: &Path, f: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let mut session = InkSession::open(file, SystemClock, self.settings.pipeline_config())?;
        let out = f(session.doc_mut())?;
        session.close()?;
        Ok(out)
    }

    fn load(&self, file: &Path) -> Result<Envelope> {
        Ok(Envelope::load(file)?.envelope)
    }

    pub fn new_file(&self, name: &str, kind: InkKind) -> Result<PathBuf> {
        let path = default_file_path(&self.vault, self.settings.subfolder(kind), name);
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        let session = InkSession::create(&path, SystemClock, self.settings.pipeline_config())?;
        session.close()?;
        Ok(path)
    }

    pub fn inspect(&self, file: &Path) -> Result<String> {
        let envelope = self.load(file)?;
        let snapshot = &envelope.document_snapshot;
        let mut out = String::new();

        write!(
            out,
            "{}: format {}, written by inklink {}",
            file.display(),
            envelope.meta.format_version,
            envelope.meta.plugin_version
        )?;
        if envelope.meta.preview_is_outdated || envelope.preview_image.is_none() {
            write!(out, " (preview outdated)")?;
        }
        writeln!(out)?;

        for page in &snapshot.pages {
            let marker = if snapshot.current_page_id == Some(page.id) { "*" } else { " " };
            let count = snapshot.shapes_on(page.id).count();
            writeln!(
                out,
                "{marker} {} ({}) height {}, {count} shapes",
                page.name, page.id, page.height
            )?;
            for group in page.linkable_groups().values() {
                let members = group.resolve_members(snapshot.shapes_on(page.id));
                writeln!(
                    out,
                    "    group {} \"{}\" {}, {} shapes",
                    group.id,
                    group.name,
                    group.color,
                    members.len()
                )?;
                for link in &group.link_files {
                    match link.line {
                        Some(line) => writeln!(
                            out,
                            "      {} {} -> {}:{line}",
                            link.id, link.name, link.path
                        )?,
                        None => writeln!(out, "      {} {} -> {}", link.id, link.name, link.path)?,
                    }
                }
            }
        }
        Ok(out.trim_end().to_string())
    }

    pub fn overlays_json(&self, file: &Path) -> Result<String> {
        let envelope = self.load(file)?;
        let overlays = group_overlays(&envelope.document_snapshot, &envelope.link_groups);
        Ok(serde_json::to_string_pretty(&overlays)?)
    }

    pub fn create_group(
        &self,
        file: &Path,
        name: &str,
        color: ShapeColor,
        shapes: &[ShapeId],
    ) -> Result<GroupId> {
        let id = self.edit(file, |doc| {
            if let Some(missing) = shapes.iter().find(|id| doc.shape(**id).is_none()) {
                bail!("unknown shape {missing}");
            }
            Ok(doc.groups_mut().create_group(name, color, shapes))
        })?;
        info!(group = %id, "Created group");
        Ok(id)
    }

    pub fn update_group(
        &self,
        file: &Path,
        group: &GroupId,
        name: Option<String>,
        color: Option<ShapeColor>,
    ) -> Result<String> {
        if name.is_none() && color.is_none() {
            bail!("nothing to change");
        }
        self.edit(file, |doc| {
            if !doc.groups_mut().update_group(group, GroupPatch { name, color }) {
                bail!("unknown group {group}");
            }
            Ok(format!("Updated {group}"))
        })
    }

    pub fn remove_group(&self, file: &Path, group: &GroupId) -> Result<String> {
        self.edit(file, |doc| {
            if !doc.groups_mut().remove_group(group) {
                bail!("unknown group {group}");
            }
            Ok(format!("Removed {group}"))
        })
    }

    pub fn attach(&self, file: &Path, group: &GroupId, shapes: &[ShapeId]) -> Result<String> {
        self.edit(file, |doc| {
            if doc.groups().group(group).is_none() {
                bail!("unknown group {group}");
            }
            let added = doc.groups_mut().attach_shapes(group, shapes);
            Ok(format!("Attached {added} shapes"))
        })
    }

    pub fn detach(&self, file: &Path, group: &GroupId, shapes: &[ShapeId]) -> Result<String> {
        self.edit(file, |doc| {
            if doc.groups().group(group).is_none() {
                bail!("unknown group {group}");
            }
            let removed = doc.groups_mut().detach_shapes(group, shapes);
            Ok(format!("Detached {removed} shapes"))
        })
    }

    pub fn add_link(
        &self,
        file: &Path,
        group: &GroupId,
        path: &str,
        name: Option<String>,
        line: Option<NonZeroU32>,
    ) -> Result<String> {
        let mut new_file = NewLinkFile::new(path);
        if let Some(name) = name {
            new_file = new_file.named(name);
        }
        if let Some(line) = line {
            new_file = new_file.at_line(line);
        }
        self.edit(file, |doc| match doc.groups_mut().add_file(group, new_file) {
            AddFileOutcome::Added(link) => Ok(link.id.to_string()),
            AddFileOutcome::Duplicate => Ok("Already linked".to_string()),
            AddFileOutcome::UnknownGroup => bail!("unknown group {group}"),
        })
    }

    pub fn edit_link(
        &self,
        file: &Path,
        group: &GroupId,
        link: &LinkFileId,
        name: Option<String>,
        path: Option<String>,
        line: Option<Option<NonZeroU32>>,
    ) -> Result<String> {
        let patch = LinkFilePatch { name, path, line };
        self.edit(file, |doc| match doc.groups_mut().update_file(group, link, patch) {
            UpdateFileOutcome::Updated => Ok(format!("Updated {link}")),
            UpdateFileOutcome::Duplicate => {
                Ok("Another link already has that name and path".to_string())
            }
            UpdateFileOutcome::NotFound => bail!("unknown link {link} in group {group}"),
        })
    }

    pub fn remove_link(&self, file: &Path, group: &GroupId, link: &LinkFileId) -> Result<String> {
        self.edit(file, |doc| {
            if !doc.groups_mut().remove_file(group, link) {
                bail!("unknown link {link} in group {group}");
            }
            Ok(format!("Removed {link}"))
        })
    }

    /// Resolve a link against the vault. Prints `path:line`.
    pub fn open_link(&self, file: &Path, group: &GroupId, link: &LinkFileId) -> Result<String> {
        let doc = self.load(file)?.to_document()?;
        let groups = doc.groups();
        let target = groups
            .group(group)
            .with_context(|| format!("unknown group {group}"))?
            .file(link)
            .with_context(|| format!("unknown link {link} in group {group}"))?;

        let mut host = FsHost::new(&self.vault);
        let pos = inklink_session::open_link(&mut host, target)?;
        Ok(format!("{}:{}", target.path, pos.line + 1))
    }

    pub fn suggest(&self, query: &str) -> Vec<String> {
        let host = FsHost::new(&self.vault);
        suggest_paths(&host, query, self.settings.suggestion_limit)
    }

    pub fn preview(&self, file: &Path, output: Option<&Path>) -> Result<String> {
        let envelope = self.load(file)?;
        let snapshot = &envelope.document_snapshot;
        match output {
            Some(out) => {
                if save_preview(snapshot, out)? {
                    Ok(format!("Wrote {}", out.display()))
                } else {
                    Ok("Nothing to render".to_string())
                }
            }
            None => Ok(render_preview(snapshot).unwrap_or_default()),
        }
    }

    pub fn target(&self, note: &Path, line: NonZeroU32, rules: &[TargetRule]) -> Result<String> {
        if !self.settings.linkable_ink_enabled {
            return Ok("Linkable ink is disabled".to_string());
        }
        let text = fs::read_to_string(note)
            .with_context(|| format!("Failed to read {}", note.display()))?;
        let relative = note.strip_prefix(&self.vault).unwrap_or(note);
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let active = ActiveMarkdown::new(Some(path), &text).with_cursor(line.get() - 1, 0);
        match compute_target(&self.settings, Some(&active), rules) {
            Some(target) => Ok(serde_json::to_string_pretty(&target)?),
            None => Ok("No target".to_string()),
        }
    }
}
