//! On-disk file format: a tab-indented JSON envelope around a document
//! snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use inklink_core::{Document, DocumentSnapshot, Group, GroupId};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FORMAT_VERSION: &str = "1";

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMeta {
    pub plugin_version: String,
    pub format_version: String,
    /// Only written when `true`
    #[serde(default, skip_serializing_if = "is_false")]
    pub preview_is_outdated: bool,
}

/// A saved ink file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub meta: EnvelopeMeta,
    pub document_snapshot: DocumentSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,
    pub link_groups: BTreeMap<GroupId, Group>,
}

/// Envelope as read from disk, before backfill
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    meta: EnvelopeMeta,
    document_snapshot: DocumentSnapshot,
    #[serde(default)]
    preview_image: Option<String>,
    #[serde(default)]
    link_groups: Option<BTreeMap<GroupId, Group>>,
}

/// Result of loading an envelope
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEnvelope {
    pub envelope: Envelope,
    /// `linkGroups` was missing and has been filled in memory; the caller
    /// should save once to make the repair durable
    pub did_backfill: bool,
}

impl Envelope {
    /// Envelope without a preview; marked outdated when `preview_is_outdated`
    pub fn build(
        document_snapshot: DocumentSnapshot,
        link_groups: BTreeMap<GroupId, Group>,
        preview_image: Option<String>,
        preview_is_outdated: bool,
    ) -> Self {
        Self {
            meta: EnvelopeMeta {
                plugin_version: PLUGIN_VERSION.to_string(),
                format_version: FORMAT_VERSION.to_string(),
                preview_is_outdated,
            },
            document_snapshot,
            preview_image: preview_image.filter(|p| !p.is_empty()),
            link_groups,
        }
    }

    /// Capture a document's snapshot and every group it holds
    pub fn from_document(doc: &Document, preview_image: Option<String>, outdated: bool) -> Self {
        let link_groups = doc
            .groups()
            .all_groups()
            .map(|g| (g.id.clone(), g.clone()))
            .collect();
        Self::build(doc.snapshot(), link_groups, preview_image, outdated)
    }

    /// Parse, backfilling a missing `linkGroups` with an empty map
    pub fn parse(json: &str) -> Result<LoadedEnvelope> {
        let raw: RawEnvelope = serde_json::from_str(json).context("Invalid envelope JSON")?;
        let did_backfill = raw.link_groups.is_none();
        Ok(LoadedEnvelope {
            envelope: Envelope {
                meta: raw.meta,
                document_snapshot: raw.document_snapshot,
                preview_image: raw.preview_image,
                link_groups: raw.link_groups.unwrap_or_default(),
            },
            did_backfill,
        })
    }

    pub fn load(path: &Path) -> Result<LoadedEnvelope> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let loaded =
            Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        if loaded.did_backfill {
            info!(path = %path.display(), "Backfilled missing linkGroups");
        }
        Ok(loaded)
    }

    /// Pretty JSON, tab-indented
    pub fn to_json_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8(buf)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = self.to_json_string()?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Rebuild the live document
    pub fn to_document(&self) -> Result<Document> {
        Document::from_snapshot(self.document_snapshot.clone())
    }
}
