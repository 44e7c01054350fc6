// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source provenance for input lines and macro expansions.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOrigin {
    pub file: Option<Arc<str>>,
    pub line: u32,
}

impl SourceOrigin {
    pub fn new(file: Option<Arc<str>>, line: u32) -> Self {
        Self { file, line }
    }

    pub fn file_name(&self) -> Option<String> {
        self.file.as_deref().map(str::to_string)
    }
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}:{}", self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

/// One line of assembler input with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub origin: SourceOrigin,
    pub text: String,
}

impl SourceLine {
    pub fn new(origin: SourceOrigin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
        }
    }

    /// Split a text buffer into one-based numbered lines.
    pub fn parse_text(file: Option<&str>, text: &str) -> Vec<SourceLine> {
        let file: Option<Arc<str>> = file.map(Arc::from);
        text.lines()
            .enumerate()
            .map(|(idx, line)| SourceLine {
                origin: SourceOrigin::new(file.clone(), idx as u32 + 1),
                text: line.trim_end_matches('\r').to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text_numbers_lines_from_one() {
        let lines = SourceLine::parse_text(Some("a.asm"), "  nop\r\nloop bra loop\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "  nop");
        assert_eq!(lines[1].origin.line, 2);
        assert_eq!(lines[1].origin.to_string(), "a.asm:2");
    }

    #[test]
    fn origin_without_file_displays_line() {
        let origin = SourceOrigin::new(None, 7);
        assert_eq!(origin.to_string(), "line 7");
        assert_eq!(origin.file_name(), None);
    }
}
