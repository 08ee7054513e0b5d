//! Linkable-ink targets: what new ink should link to, derived from the
//! markdown note the user is working in.

use serde::{Deserialize, Serialize};

use crate::host::CursorPos;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TargetRule {
    SelectedText,
    CurrentHeading,
    ActiveFile,
}

pub const DEFAULT_TARGET_RULES: [TargetRule; 3] = [
    TargetRule::SelectedText,
    TargetRule::CurrentHeading,
    TargetRule::ActiveFile,
];

/// The markdown note currently focused in the host
#[derive(Debug, Clone, Default)]
pub struct ActiveMarkdown {
    pub path: Option<String>,
    pub lines: Vec<String>,
    pub cursor: CursorPos,
    /// `(from, to)`, ordered
    pub selection: Option<(CursorPos, CursorPos)>,
}

impl ActiveMarkdown {
    pub fn new(path: Option<String>, text: &str) -> Self {
        Self {
            path,
            lines: text.lines().map(str::to_string).collect(),
            ..Default::default()
        }
    }

    pub fn with_cursor(mut self, line: u32, ch: u32) -> Self {
        self.cursor = CursorPos { line, ch };
        self
    }

    pub fn with_selection(mut self, from: CursorPos, to: CursorPos) -> Self {
        self.selection = Some((from, to));
        self
    }

    fn file_name(&self) -> Option<&str> {
        self.path.as_deref().and_then(|p| p.rsplit('/').next())
    }

    /// Text between the selection ends
    pub fn selected_text(&self) -> Option<String> {
        let (from, to) = self.selection?;
        let mut out = String::new();
        for line_no in from.line..=to.line {
            let line = self.lines.get(line_no as usize)?;
            let start = if line_no == from.line { from.ch as usize } else { 0 };
            let end = if line_no == to.line {
                to.ch as usize
            } else {
                line.chars().count()
            };
            out.extend(line.chars().skip(start).take(end.saturating_sub(start)));
            if line_no != to.line {
                out.push('\n');
            }
        }
        Some(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum TargetMeta {
    #[serde(rename_all = "camelCase")]
    SelectedText {
        file_path: Option<String>,
        selection: String,
        from: (u32, u32),
        to: (u32, u32),
    },
    #[serde(rename_all = "camelCase")]
    CurrentHeading {
        file_path: Option<String>,
        heading: String,
        heading_level: usize,
        heading_line: u32,
    },
    #[serde(rename_all = "camelCase")]
    ActiveFile { file_path: String, file_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkTarget {
    pub target: String,
    pub meta: TargetMeta,
}

/// First target produced by the rules. Explicit rules win, then the rules
/// from settings, then the built-in order.
pub fn compute_target(
    settings: &Settings,
    active: Option<&ActiveMarkdown>,
    rules: &[TargetRule],
) -> Option<LinkTarget> {
    if !settings.linkable_ink_enabled {
        return None;
    }
    let active = active?;
    let order: &[TargetRule] = if !rules.is_empty() {
        rules
    } else if !settings.linkable_ink_default_rules.is_empty() {
        &settings.linkable_ink_default_rules
    } else {
        &DEFAULT_TARGET_RULES
    };

    order.iter().find_map(|rule| match rule {
        TargetRule::SelectedText => selection_target(active),
        TargetRule::CurrentHeading => heading_target(active),
        TargetRule::ActiveFile => file_target(active),
    })
}

fn selection_target(active: &ActiveMarkdown) -> Option<LinkTarget> {
    let (from, to) = active.selection?;
    let text = active.selected_text()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(LinkTarget {
        target: trimmed.to_string(),
        meta: TargetMeta::SelectedText {
            file_path: active.path.clone(),
            selection: trimmed.to_string(),
            from: (from.line, from.ch),
            to: (to.line, to.ch),
        },
    })
}

fn heading_target(active: &ActiveMarkdown) -> Option<LinkTarget> {
    let (text, level, line) = find_current_heading(active)?;
    let target = match &active.path {
        Some(path) => format!("[[{path}#{text}]]"),
        None => text.clone(),
    };
    Some(LinkTarget {
        target,
        meta: TargetMeta::CurrentHeading {
            file_path: active.path.clone(),
            heading: text,
            heading_level: level,
            heading_line: line,
        },
    })
}

fn file_target(active: &ActiveMarkdown) -> Option<LinkTarget> {
    let path = active.path.clone()?;
    let file_name = active.file_name().unwrap_or(&path).to_string();
    Some(LinkTarget {
        target: format!("[[{path}]]"),
        meta: TargetMeta::ActiveFile {
            file_path: path,
            file_name,
        },
    })
}

/// ATX heading text and level, e.g. `## Notes`
fn parse_heading(line: &str) -> Option<(String, usize)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &line[level..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let text = rest.trim();
    if text.is_empty() {
        return None;
    }
    Some((text.to_string(), level))
}

/// Nearest heading at or above the cursor
fn find_current_heading(active: &ActiveMarkdown) -> Option<(String, usize, u32)> {
    let start = (active.cursor.line as usize).min(active.lines.len().checked_sub(1)?);
    (0..=start).rev().find_map(|line_no| {
        let (text, level) = parse_heading(&active.lines[line_no])?;
        Some((text, level, line_no as u32))
    })
}
