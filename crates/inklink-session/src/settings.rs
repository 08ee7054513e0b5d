//! User settings for inklink
//!
//! Stored as JSON under the config directory. A missing or unreadable file
//! means defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use inklink_core::LayoutRules;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::host::DEFAULT_SUGGESTION_LIMIT;
use crate::link_target::{DEFAULT_TARGET_RULES, TargetRule};
use crate::pipeline::PipelineConfig;
use crate::session::InkKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub short_delay_ms: u64,
    pub long_delay_ms: u64,
    pub linkable_ink_enabled: bool,
    pub linkable_ink_default_rules: Vec<TargetRule>,
    pub writing_subfolder: String,
    pub drawing_subfolder: String,
    pub writing_min_page_height: f64,
    pub writing_line_height: f64,
    pub suggestion_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let layout = LayoutRules::default();
        Self {
            short_delay_ms: 500,
            long_delay_ms: 2000,
            linkable_ink_enabled: false,
            linkable_ink_default_rules: DEFAULT_TARGET_RULES.to_vec(),
            writing_subfolder: "Ink/Writing".to_string(),
            drawing_subfolder: "Ink/Drawing".to_string(),
            writing_min_page_height: layout.min_page_height,
            writing_line_height: layout.line_height,
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

impl Settings {
    /// Load from the config directory
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| serde_json::from_str(&content).map_err(anyhow::Error::from))
        {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), "Ignoring unreadable settings: {e}");
                Self::default()
            }
        }
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            });
        config_dir.join("inklink").join("settings.json")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Vault subfolder new files of `kind` go into
    pub fn subfolder(&self, kind: InkKind) -> &str {
        match kind {
            InkKind::Writing => &self.writing_subfolder,
            InkKind::Drawing => &self.drawing_subfolder,
        }
    }

    pub fn layout_rules(&self) -> LayoutRules {
        LayoutRules {
            min_page_height: self.writing_min_page_height,
            line_height: self.writing_line_height,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            short_delay: Duration::from_millis(self.short_delay_ms),
            long_delay: Duration::from_millis(self.long_delay_ms),
            layout: self.layout_rules(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_broken_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(Settings::load_from(&path), Settings::default());

        fs::write(&path, "{not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"shortDelayMs": 250, "linkableInkEnabled": true}"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.short_delay_ms, 250);
        assert!(settings.linkable_ink_enabled);
        assert_eq!(settings.long_delay_ms, 2000);
        assert_eq!(settings.pipeline_config().short_delay, Duration::from_millis(250));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            writing_subfolder: "Sketches".into(),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }
}
