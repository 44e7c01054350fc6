// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and reporting for the assembler.

use std::fmt;
use std::sync::Arc;

use crate::core::expr::{EvalError, EvalErrorKind};
use crate::core::parser::ParseError;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Syntax,
    UndefinedSymbol,
    CpuMode,
    Redefinition,
    Range,
    Directive,
    /// Unbalanced or misplaced conditional block.
    Conditional,
    /// Macro definition errors and the expansion depth limit.
    Macro,
    /// Encodings still changing when the pass budget ran out.
    Oscillation,
    Internal,
    Io,
    Cli,
}

impl AsmErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AsmErrorKind::Syntax => "syntax",
            AsmErrorKind::UndefinedSymbol => "undefined symbol",
            AsmErrorKind::CpuMode => "cpu mode",
            AsmErrorKind::Redefinition => "redefinition",
            AsmErrorKind::Range => "range",
            AsmErrorKind::Directive => "directive",
            AsmErrorKind::Conditional => "unbalanced conditional",
            AsmErrorKind::Macro => "macro",
            AsmErrorKind::Oscillation => "oscillating encoding",
            AsmErrorKind::Internal => "internal",
            AsmErrorKind::Io => "io",
            AsmErrorKind::Cli => "cli",
        }
    }

    /// Stable diagnostic code for this category.
    pub fn code(self) -> &'static str {
        default_diagnostic_code(self)
    }

    /// Structural and internal errors abort the run immediately.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            AsmErrorKind::Oscillation | AsmErrorKind::Internal | AsmErrorKind::Io
        )
    }
}

/// An assembler error with a kind and message.
#[derive(Debug, Clone)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
    column: Option<usize>,
    pending: bool,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self {
            kind,
            message: format_error(msg, param),
            column: None,
            pending: false,
        }
    }

    /// A value that is not known yet. Resolve passes ignore these.
    pub fn pending(msg: &str, param: Option<&str>) -> Self {
        Self {
            pending: true,
            ..Self::new(AsmErrorKind::UndefinedSymbol, msg, param)
        }
    }

    pub fn with_column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AsmError {}

impl From<ParseError> for AsmError {
    fn from(err: ParseError) -> Self {
        AsmError::new(AsmErrorKind::Syntax, &err.message, None)
            .with_column(Some(err.span.col_start))
    }
}

impl From<EvalError> for AsmError {
    fn from(err: EvalError) -> Self {
        let column = err.span.map(|span| span.col_start);
        let error = match err.kind {
            EvalErrorKind::Pending => AsmError::pending(&err.message, None),
            EvalErrorKind::Undefined => {
                AsmError::new(AsmErrorKind::UndefinedSymbol, &err.message, None)
            }
            EvalErrorKind::Invalid => AsmError::new(AsmErrorKind::Syntax, &err.message, None),
        };
        error.with_column(column)
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub(crate) line: u32,
    pub(crate) column: Option<usize>,
    pub(crate) code: String,
    pub(crate) severity: Severity,
    pub(crate) error: AsmError,
    pub(crate) file: Option<String>,
    pub(crate) source: Option<String>,
    pub(crate) notes: Vec<String>,
    pub(crate) help: Vec<String>,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, error: AsmError) -> Self {
        Self {
            line,
            column: error.column(),
            code: default_diagnostic_code(error.kind()).to_string(),
            severity,
            error,
            file: None,
            source: None,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    pub fn format(&self) -> String {
        let sev = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        format!(
            "{}: {} [{}] - {}",
            self.line,
            sev,
            self.code,
            self.error.message()
        )
    }

    pub fn format_with_context(&self, lines: Option<&[String]>, use_color: bool) -> String {
        let sev = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        let header = match &self.file {
            Some(file) => format!("{file}:{}: {sev} [{}]", self.line, self.code),
            None => format!("{}: {sev} [{}]", self.line, self.code),
        };

        let mut out = String::new();
        out.push_str(&header);
        out.push('\n');

        let context = build_context_lines(
            self.line,
            self.column,
            lines,
            self.source.as_deref(),
            use_color,
        );
        for line in context {
            out.push_str(&line);
            out.push('\n');
        }

        for note in &self.notes {
            out.push_str("note: ");
            out.push_str(note);
            out.push('\n');
        }

        for help in &self.help {
            out.push_str("help: ");
            out.push_str(help);
            out.push('\n');
        }

        out.push_str(&format!("{sev}: {}", self.error.message()));
        out
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.error.kind()
    }

    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn message(&self) -> &str {
        self.error.message()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn help(&self) -> &[String] {
        &self.help
    }
}

/// Report from a successful assembly run.
#[derive(Debug)]
pub struct AsmRunReport {
    diagnostics: Vec<Diagnostic>,
    source_lines: Arc<Vec<String>>,
}

impl AsmRunReport {
    pub fn new(diagnostics: Vec<Diagnostic>, source_lines: impl Into<Arc<Vec<String>>>) -> Self {
        Self {
            diagnostics,
            source_lines: source_lines.into(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}

/// Error from a failed assembly run.
#[derive(Debug)]
pub struct AsmRunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
    source_lines: Arc<Vec<String>>,
}

impl AsmRunError {
    pub fn new(
        error: AsmError,
        diagnostics: Vec<Diagnostic>,
        source_lines: impl Into<Arc<Vec<String>>>,
    ) -> Self {
        Self {
            error,
            diagnostics,
            source_lines: source_lines.into(),
        }
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.error.kind()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }

    /// Returns true if any diagnostic carries `kind`.
    pub fn has_kind(&self, kind: AsmErrorKind) -> bool {
        self.error.kind() == kind || self.diagnostics.iter().any(|d| d.kind() == kind)
    }
}

impl fmt::Display for AsmRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for AsmRunError {}

/// Line, error and warning counts for listing footers.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassCounts {
    pub lines: u32,
    pub errors: u32,
    pub warnings: u32,
}

impl PassCounts {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Build context lines for error display.
pub fn build_context_lines(
    line_num: u32,
    column: Option<usize>,
    lines: Option<&[String]>,
    source_override: Option<&str>,
    use_color: bool,
) -> Vec<String> {
    let mut out = Vec::new();
    let line_idx = line_num.saturating_sub(1) as usize;

    if let Some(source) = source_override {
        let highlighted = highlight_line(source, column, use_color);
        out.push(format!("{:>5} | {}", line_num, highlighted));
        return out;
    }

    let Some(line) = lines.and_then(|lines| lines.get(line_idx)) else {
        out.push(format!("{:>5} | <source unavailable>", line_num));
        return out;
    };

    let display = highlight_line(line, column, use_color);
    out.push(format!("{:>5} | {}", line_num, display));
    if let Some(col) = column.filter(|&col| col > 0 && !use_color) {
        out.push(format!("{:>5} | {}^", "", " ".repeat(col - 1)));
    }

    out
}

fn highlight_line(line: &str, column: Option<usize>, use_color: bool) -> String {
    crate::core::report::highlight_line(line, column, use_color)
}

fn default_diagnostic_code(kind: AsmErrorKind) -> &'static str {
    match kind {
        AsmErrorKind::Syntax => "asm101",
        AsmErrorKind::Cli => "asm102",
        AsmErrorKind::Directive => "asm201",
        AsmErrorKind::Conditional => "asm202",
        AsmErrorKind::Macro => "asm203",
        AsmErrorKind::UndefinedSymbol => "asm301",
        AsmErrorKind::Redefinition => "asm302",
        AsmErrorKind::CpuMode => "asm401",
        AsmErrorKind::Range => "asm402",
        AsmErrorKind::Oscillation => "asm403",
        AsmErrorKind::Io => "asm501",
        AsmErrorKind::Internal => "asm901",
    }
}

/// Format an error message with an optional parameter.
pub fn format_error(msg: &str, param: Option<&str>) -> String {
    match param {
        Some(p) => format!("{msg}: {p}"),
        None => msg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::Span;

    #[test]
    fn diagnostic_format_includes_line_and_severity() {
        let err = AsmError::new(AsmErrorKind::Syntax, "Bad operand", Some("q,x"));
        let diag = Diagnostic::new(12, Severity::Error, err);
        assert_eq!(diag.format(), "12: ERROR [asm101] - Bad operand: q,x");
    }

    #[test]
    fn format_with_context_renders_caret_notes_and_help() {
        let err = AsmError::new(AsmErrorKind::Conditional, "endc without if", None);
        let diag = Diagnostic::new(2, Severity::Error, err)
            .with_file(Some("example.asm".to_string()))
            .with_column(Some(5))
            .with_note("no conditional block is open")
            .with_help("remove the stray endc");

        let lines = vec!["    nop".to_string(), "    endc".to_string()];
        let rendered = diag.format_with_context(Some(&lines), false);
        let expected = [
            "example.asm:2: ERROR [asm202]",
            "    2 |     endc",
            "      |     ^",
            "note: no conditional block is open",
            "help: remove the stray endc",
            "ERROR: endc without if",
        ]
        .join("\n");
        assert_eq!(rendered, expected);
    }

    #[test]
    fn eval_errors_keep_pending_marker_and_column() {
        let pending = EvalError::with_span(EvalErrorKind::Pending, "later", Span::new(1, 4, 9));
        let err = AsmError::from(pending);
        assert!(err.is_pending());
        assert_eq!(err.kind(), AsmErrorKind::UndefinedSymbol);
        assert_eq!(err.column(), Some(5));

        let undefined = AsmError::from(EvalError::new(EvalErrorKind::Undefined, "nope"));
        assert!(!undefined.is_pending());
    }

    #[test]
    fn run_error_reports_kinds_from_diagnostics() {
        let diag = Diagnostic::new(
            3,
            Severity::Error,
            AsmError::new(AsmErrorKind::CpuMode, "6309 only", None),
        );
        let err = AsmRunError::new(
            AsmError::new(AsmErrorKind::Syntax, "Errors detected", None),
            vec![diag],
            Vec::new(),
        );
        assert!(err.has_kind(AsmErrorKind::CpuMode));
        assert!(!err.has_kind(AsmErrorKind::Internal));
    }
}
