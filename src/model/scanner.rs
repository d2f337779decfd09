// Finds task links (and their checkbox, if any) in document lines.
use crate::error::ConfigError;
use crate::model::status::CheckboxState;
use regex::Regex;

/// Notion page links: `[Title](https://www.notion.so/Title-words-<id>)`.
pub const DEFAULT_LINK_PATTERN: &str =
    r"\[.*\]\(https://www\.notion\.so/[a-zA-Z0-9-]+-([a-z0-9]+)\)";

const CHECKBOX_PATTERN: &str = r"^(\s*)- \[(.)\] ";

/// One task link found on one line. Rebuilt on every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReference {
    pub line_index: usize,
    pub identifier: String,
    pub line: String,
    /// Raw character between the brackets, `None` for a bare link.
    pub glyph: Option<char>,
}

impl LocalReference {
    /// The recognized checkbox state; `None` for a bare link or an unknown glyph.
    pub fn checkbox(&self) -> Option<CheckboxState> {
        self.glyph.and_then(CheckboxState::from_glyph)
    }
}

#[derive(Debug, Clone)]
pub struct Scanner {
    link: Regex,
    checkbox: Regex,
}

impl Scanner {
    /// Builds a scanner from a link pattern whose single capture group is
    /// the task identifier.
    pub fn new(link_pattern: &str) -> Result<Self, ConfigError> {
        let link =
            Regex::new(link_pattern).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        // Group 0 is the whole match.
        if link.captures_len() != 2 {
            return Err(ConfigError::PatternWithoutCapture);
        }
        let checkbox =
            Regex::new(CHECKBOX_PATTERN).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        Ok(Self { link, checkbox })
    }

    pub fn notion() -> Result<Self, ConfigError> {
        Self::new(DEFAULT_LINK_PATTERN)
    }

    pub fn scan_line(&self, line_index: usize, line: &str) -> Option<LocalReference> {
        let identifier = self.link.captures(line)?.get(1)?.as_str();
        if identifier.is_empty() {
            return None;
        }
        let glyph = self
            .checkbox
            .captures(line)
            .and_then(|c| c.get(2))
            .and_then(|m| m.as_str().chars().next());

        Some(LocalReference {
            line_index,
            identifier: identifier.to_string(),
            line: line.to_string(),
            glyph,
        })
    }

    /// Scans every line. Lines are split on `\n` only so a trailing `\r`
    /// stays part of the line and survives a rewrite.
    pub fn scan_document(&self, text: &str) -> Vec<LocalReference> {
        text.split('\n')
            .enumerate()
            .filter_map(|(idx, line)| self.scan_line(idx, line))
            .collect()
    }

    /// Replaces the glyph of the leading checkbox, keeping everything else.
    /// Returns `None` when the line has no checkbox marker.
    pub fn rewrite_glyph(&self, line: &str, state: CheckboxState) -> Option<String> {
        let glyph = self.checkbox.captures(line)?.get(2)?;
        let mut out = String::with_capacity(line.len());
        out.push_str(&line[..glyph.start()]);
        out.push(state.glyph());
        out.push_str(&line[glyph.end()..]);
        Some(out)
    }
}
