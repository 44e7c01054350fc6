// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Resolve and emit pass sequencing.
//!
//! Parsing happens once (see the front end). Resolve passes then walk every
//! line in source order: assign the address, run the descriptor's `apply`
//! and `resolve` hooks, and advance the cursor by the line's current length.
//! A pass in which no length and no constant changed is a fixed point; the
//! emit pass then runs exactly once over the same layout.

use tracing::{debug, info, trace, warn};

use crate::core::assembler::conditional::ConditionalStack;
use crate::core::assembler::context::{AsmContext, Phase};
use crate::core::assembler::error::{AsmError, AsmErrorKind, Diagnostic, Severity};
use crate::core::line::LineRecord;
use crate::core::macro_processor::MacroProcessor;
use crate::core::registry::{InsnFlags, InstructionRegistry, Sizing};
use crate::core::source_map::SourceOrigin;

use super::output::ObjectOutput;
use super::AssemblerConfig;

/// What one resolve pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub pass: u32,
    /// Indices of lines whose length changed.
    pub changed_lines: Vec<usize>,
    /// Non-mutable symbols whose value changed.
    pub changed_symbols: Vec<String>,
}

impl PassSummary {
    pub fn is_stable(&self) -> bool {
        self.changed_lines.is_empty() && self.changed_symbols.is_empty()
    }
}

/// Owns every piece of per-run state and drives the phases over it.
pub struct PassDriver<'r> {
    pub(super) registry: &'r InstructionRegistry,
    pub(super) config: AssemblerConfig,
    pub ctx: AsmContext,
    pub(super) lines: Vec<LineRecord>,
    pub(super) diagnostics: Vec<Diagnostic>,
    pub(super) conditionals: ConditionalStack,
    pub(super) macros: MacroProcessor,
    /// Set once `end` has been parsed.
    pub(super) ended: bool,
    passes: u32,
}

impl<'r> PassDriver<'r> {
    pub fn new(registry: &'r InstructionRegistry, config: AssemblerConfig) -> Self {
        let ctx = AsmContext::new(config.cpu, config.branch_policy, config.initial_dp);
        Self {
            registry,
            config,
            ctx,
            lines: Vec::new(),
            diagnostics: Vec::new(),
            conditionals: ConditionalStack::new(),
            macros: MacroProcessor::new(),
            ended: false,
            passes: 0,
        }
    }

    pub fn lines(&self) -> &[LineRecord] {
        &self.lines
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity() == Severity::Error)
            .count()
    }

    /// Resolve passes run so far.
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// One traversal of every line. Only fatal errors are returned; any
    /// other failure is left for the emit pass to report, once values are
    /// final.
    pub fn resolve_pass(&mut self) -> Result<PassSummary, AsmError> {
        self.passes += 1;
        let pass = self.passes;
        let ctx = &mut self.ctx;
        ctx.begin_pass(Phase::Resolve, pass);
        let mut changed_lines = Vec::new();

        for (idx, line) in self.lines.iter_mut().enumerate() {
            ctx.here = Some(ctx.sections.here());
            if let Some(desc) = line.descriptor {
                if let Err(err) = desc.ops.apply(desc, line, ctx) {
                    if err.kind().is_fatal() {
                        return Err(err);
                    }
                }
            }
            match place_line(line, ctx) {
                Err(err) if err.kind().is_fatal() => return Err(err),
                // Reported by the emit pass.
                Ok(()) | Err(_) => {}
            }
            if let Some(desc) = line.descriptor {
                match desc.ops.resolve(desc, line, ctx) {
                    Ok(Some(sizing)) => {
                        if apply_sizing(line, sizing) {
                            changed_lines.push(idx);
                        }
                    }
                    Ok(None) => {}
                    Err(err) if err.kind().is_fatal() => return Err(err),
                    Err(_) => {}
                }
            }
            // Overflow is reported by the emit pass.
            if let Err(err) = ctx.sections.advance(line.size) {
                trace!(line = %line.origin, "{}", err.message());
            }
        }
        ctx.take_warnings();

        let summary = PassSummary {
            pass,
            changed_lines,
            changed_symbols: ctx.changed_symbols().to_vec(),
        };
        debug!(
            pass,
            changed_lines = summary.changed_lines.len(),
            changed_symbols = summary.changed_symbols.len(),
            "resolve pass"
        );
        Ok(summary)
    }

    /// Run resolve passes until one changes nothing, returning the number of
    /// passes used. Running out of passes is an oscillation error naming the
    /// lines that were still changing.
    pub fn resolve_to_fixed_point(&mut self) -> Result<u32, AsmError> {
        let mut last = PassSummary::default();
        for _ in 0..self.config.max_passes {
            last = self.resolve_pass()?;
            if last.is_stable() {
                let total: u32 = self.lines.iter().map(|line| line.size).sum();
                info!(passes = self.passes, bytes = total, "layout converged");
                return Ok(self.passes);
            }
        }
        Err(self.oscillation(&last))
    }

    fn oscillation(&mut self, last: &PassSummary) -> AsmError {
        let mut culprits: Vec<String> = last
            .changed_lines
            .iter()
            .filter_map(|&idx| self.lines.get(idx))
            .map(|line| line.origin.to_string())
            .collect();
        culprits.extend(last.changed_symbols.iter().map(|name| format!("symbol {name}")));
        let err = AsmError::new(
            AsmErrorKind::Oscillation,
            &format!(
                "Encoding did not converge after {} passes",
                self.config.max_passes
            ),
            Some(&culprits.join(", ")),
        );
        for &idx in &last.changed_lines {
            let Some(line) = self.lines.get(idx) else {
                continue;
            };
            let diag = line_diagnostic(
                &line.origin,
                &line.text,
                Severity::Error,
                AsmError::new(
                    AsmErrorKind::Oscillation,
                    "Line length still changing",
                    Some(&format!("{} bytes", line.size)),
                ),
            )
            .with_note(format!(
                "size changed again in pass {} of {}",
                self.passes, self.config.max_passes
            ));
            self.diagnostics.push(diag);
        }
        err
    }

    /// Produce final bytes and relocations. Per-line errors are collected as
    /// diagnostics; a length mismatch or other fatal error aborts.
    pub fn emit(&mut self) -> Result<(), AsmError> {
        let ctx = &mut self.ctx;
        let diagnostics = &mut self.diagnostics;
        ctx.begin_pass(Phase::Emit, self.passes + 1);

        for line in self.lines.iter_mut() {
            ctx.here = Some(ctx.sections.here());
            if let Some(desc) = line.descriptor {
                if let Err(err) = desc.ops.apply(desc, line, ctx) {
                    let fatal = err.kind().is_fatal();
                    diagnostics.push(line_diagnostic(
                        &line.origin,
                        &line.text,
                        Severity::Error,
                        err.clone(),
                    ));
                    if fatal {
                        return Err(err);
                    }
                }
            }
            if let Err(err) = place_line(line, ctx) {
                diagnostics.push(line_diagnostic(&line.origin, &line.text, Severity::Error, err));
            }
            if let Some(desc) = line.descriptor {
                match desc.ops.emit(desc, line, ctx) {
                    Ok(em) if em.len() != line.size => {
                        let err = AsmError::new(
                            AsmErrorKind::Internal,
                            &format!(
                                "Emitted {} bytes but the line was resolved to {}",
                                em.len(),
                                line.size
                            ),
                            Some(desc.mnemonic),
                        );
                        diagnostics.push(line_diagnostic(
                            &line.origin,
                            &line.text,
                            Severity::Error,
                            err.clone(),
                        ));
                        return Err(err);
                    }
                    Ok(em) => {
                        line.bytes = em.bytes;
                        line.reserved = em.reserved;
                        line.relocations = em.relocations;
                    }
                    Err(err) => {
                        let fatal = err.kind().is_fatal();
                        diagnostics.push(line_diagnostic(
                            &line.origin,
                            &line.text,
                            Severity::Error,
                            err.clone(),
                        ));
                        if fatal {
                            return Err(err);
                        }
                    }
                }
            }
            for warning in ctx.take_warnings() {
                diagnostics.push(line_diagnostic(
                    &line.origin,
                    &line.text,
                    Severity::Warning,
                    warning,
                ));
            }
            if let Err(err) = ctx.sections.advance(line.size) {
                let err = AsmError::new(AsmErrorKind::Range, &err.message(), None);
                diagnostics.push(line_diagnostic(&line.origin, &line.text, Severity::Error, err));
            }
        }
        Ok(())
    }

    pub fn output(&self) -> ObjectOutput {
        ObjectOutput::collect(&self.lines, &self.ctx)
    }
}

/// Give `line` its address for this pass and define its label there.
fn place_line(line: &mut LineRecord, ctx: &mut AsmContext) -> Result<(), AsmError> {
    line.address = ctx.sections.cursor();
    line.section = ctx.sections.current().map(str::to_string);
    line.dp = ctx.dp;
    let here = line.here();
    ctx.here = Some(here.clone());
    let defines = line
        .descriptor
        .is_some_and(|desc| desc.has(InsnFlags::DEFINES_SYMBOL));
    match &line.label {
        Some(label) if !defines => ctx.define_symbol(label, here),
        _ => Ok(()),
    }
}

/// Store a new length for `line`, enforcing the relaxation floor. Returns
/// true if the length changed.
fn apply_sizing(line: &mut LineRecord, sizing: Sizing) -> bool {
    let old = line.size;
    let new = match sizing {
        Sizing::Exact(n) => n,
        Sizing::Relaxed(n) => {
            let n = n.max(line.size_floor);
            if n < old {
                line.shrunk = true;
            } else if n > old && line.shrunk {
                warn!(
                    line = %line.origin,
                    from = old,
                    to = n,
                    "line grew after shrinking; keeping it at least this long"
                );
                line.size_floor = n;
            }
            n
        }
    };
    if new == old {
        return false;
    }
    trace!(line = %line.origin, from = old, to = new, "size changed");
    line.size = new;
    true
}

pub(super) fn line_diagnostic(
    origin: &SourceOrigin,
    text: &str,
    severity: Severity,
    err: AsmError,
) -> Diagnostic {
    Diagnostic::new(origin.line, severity, err)
        .with_file(origin.file_name())
        .with_source(Some(text.to_string()))
}
