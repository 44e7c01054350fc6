// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Parse phase: macro capture and expansion, conditional filtering, struct
//! definition mode, label declaration and the descriptor parse hook.

use tracing::trace;

use crate::core::assembler::conditional::ConditionalAction;
use crate::core::assembler::context::Phase;
use crate::core::assembler::error::{AsmError, AsmErrorKind, Diagnostic, Severity};
use crate::core::line::LineRecord;
use crate::core::registry::{
    InsnFlags, InstructionDescriptor, LookupError, ParseOutcome, ParseRequest,
};
use crate::core::source_map::{SourceLine, SourceOrigin};
use crate::core::symbol_table::{SymbolKind, SymbolTableResult};
use crate::core::text_utils::{is_valid_symbol, operand_field, split_line, SplitLine};
use crate::families::m6800::is_register;

use super::directives::STRUCT_INSTANCE;
use super::passes::{line_diagnostic, PassDriver};

/// Zero-based column of `part`, a subslice of `text`.
fn column_in(text: &str, part: &str) -> usize {
    (part.as_ptr() as usize).saturating_sub(text.as_ptr() as usize)
}

impl PassDriver<'_> {
    /// Parse every source line once. Per-line errors become diagnostics;
    /// structural errors (unterminated blocks, runaway macros) are returned.
    pub fn parse(&mut self, source: &[SourceLine]) -> Result<(), AsmError> {
        self.ctx.begin_pass(Phase::Parse, 0);
        for line in source {
            if self.ended {
                break;
            }
            self.parse_line(&line.origin, &line.text, 0)?;
        }
        self.finish_parse()
    }

    fn report(&mut self, origin: &SourceOrigin, text: &str, severity: Severity, err: AsmError) {
        self.diagnostics
            .push(line_diagnostic(origin, text, severity, err));
    }

    fn fatal(&mut self, origin: &SourceOrigin, text: &str, err: AsmError) -> AsmError {
        self.report(origin, text, Severity::Error, err.clone());
        err
    }

    fn drain_warnings(&mut self, origin: &SourceOrigin, text: &str) {
        for warning in self.ctx.take_warnings() {
            self.report(origin, text, Severity::Warning, warning);
        }
    }

    fn parse_line(&mut self, origin: &SourceOrigin, text: &str, depth: usize) -> Result<(), AsmError> {
        if self.macros.is_capturing() {
            self.capture_macro_line(origin, text);
            return Ok(());
        }
        let Some(split) = split_line(text) else {
            return Ok(());
        };
        let skipping = self.conditionals.skipping();
        let Some(mnemonic) = split.mnemonic else {
            if !skipping {
                self.label_only(origin, text, &split);
            }
            return Ok(());
        };

        let desc = match self.registry.lookup(mnemonic, self.ctx.cpu) {
            Ok(desc) => desc,
            Err(_) if skipping => return Ok(()),
            Err(LookupError::CpuMismatch(cpus)) => {
                let names: Vec<&str> = cpus.iter().map(|cpu| cpu.as_str()).collect();
                let err = AsmError::new(
                    AsmErrorKind::CpuMode,
                    &format!("Instruction not available on {}", self.ctx.cpu),
                    Some(mnemonic),
                )
                .with_column(Some(column_in(text, mnemonic) + 1));
                let diag = line_diagnostic(origin, text, Severity::Error, err)
                    .with_help(format!("available on: {}", names.join(", ")));
                self.diagnostics.push(diag);
                self.label_only(origin, text, &split);
                return Ok(());
            }
            Err(LookupError::Unknown) => {
                if self.macros.lookup(mnemonic).is_some() {
                    return self.expand_macro(origin, text, &split, mnemonic, depth);
                }
                if self.ctx.structs.get(mnemonic).is_none() {
                    let err = AsmError::new(AsmErrorKind::Syntax, "Unknown mnemonic", Some(mnemonic))
                        .with_column(Some(column_in(text, mnemonic) + 1));
                    self.report(origin, text, Severity::Error, err);
                    self.label_only(origin, text, &split);
                    return Ok(());
                }
                &STRUCT_INSTANCE
            }
        };
        if skipping && !desc.has(InsnFlags::CONDITIONAL) {
            return Ok(());
        }
        self.parse_with(origin, text, &split, mnemonic, desc, skipping)
    }

    fn parse_with(
        &mut self,
        origin: &SourceOrigin,
        text: &str,
        split: &SplitLine<'_>,
        mnemonic: &str,
        desc: &'static InstructionDescriptor,
        skipping: bool,
    ) -> Result<(), AsmError> {
        let in_struct = self.ctx.structs.in_definition();
        let instance = std::ptr::eq(desc, &STRUCT_INSTANCE);
        if in_struct
            && !instance
            && !desc.has(InsnFlags::RESERVES_DATA)
            && !desc.has(InsnFlags::STRUCT_CLOSE)
            && !desc.has(InsnFlags::CONDITIONAL)
        {
            let err = AsmError::new(
                AsmErrorKind::Directive,
                "Only reservations and struct instances are allowed inside a struct",
                Some(mnemonic),
            )
            .with_column(Some(column_in(text, mnemonic) + 1));
            self.report(origin, text, Severity::Error, err);
            return Ok(());
        }

        // Struct members and symbol-defining directives consume the label.
        let label = if skipping || in_struct || desc.has(InsnFlags::DEFINES_SYMBOL) {
            None
        } else {
            split.label.and_then(|name| self.declare_label(origin, text, name))
        };

        let req = ParseRequest {
            mnemonic,
            label: split.label,
            operand: split.operand,
            operand_col: split.operand_col,
            origin,
            skipping,
        };
        let outcome = desc.ops.parse(desc, &req, &mut self.ctx);
        self.drain_warnings(origin, text);

        let mut record = LineRecord::new(origin.clone(), text);
        record.label = label;
        record.operand_text = operand_field(split.operand).to_string();
        record.operand_col = split.operand_col;

        let parsed = match outcome {
            Ok(ParseOutcome::Line(parsed)) => parsed,
            Ok(ParseOutcome::EndInput(parsed)) => {
                self.ended = true;
                parsed
            }
            Ok(ParseOutcome::Conditional(action)) => {
                if let Err(err) = self.conditionals.apply(action, origin) {
                    let err = AsmError::new(AsmErrorKind::Conditional, err.message(), None)
                        .with_column(Some(column_in(text, mnemonic) + 1));
                    self.report(origin, text, Severity::Error, err);
                }
                if !skipping {
                    record.descriptor = Some(desc);
                    self.lines.push(record);
                }
                return Ok(());
            }
            Ok(ParseOutcome::BeginMacro(name)) => {
                self.begin_macro(origin, text, &name);
                record.descriptor = Some(desc);
                self.lines.push(record);
                return Ok(());
            }
            Err(err) => {
                if err.kind().is_fatal() {
                    return Err(self.fatal(origin, text, err));
                }
                self.report(origin, text, Severity::Error, err);
                // A failed test still opens its block so the matching endc pairs up.
                if desc.has(InsnFlags::CONDITIONAL) {
                    let _ = self.conditionals.apply(ConditionalAction::If(false), origin);
                }
                self.lines.push(record);
                return Ok(());
            }
        };

        if desc.has(InsnFlags::DEFINES_SYMBOL) && !in_struct {
            record.label = split.label.map(str::to_string);
        }
        for name in parsed.operand.referenced_symbols() {
            self.ctx.symbols.note_reference(&name);
        }
        record.descriptor = Some(desc);
        record.operand = parsed.operand;
        record.size = parsed.size;
        self.lines.push(record);
        Ok(())
    }

    /// A label with no mnemonic: an address marker, or a zero-size field
    /// inside a struct definition.
    fn label_only(&mut self, origin: &SourceOrigin, text: &str, split: &SplitLine<'_>) {
        let Some(name) = split.label else {
            return;
        };
        if let Some(builder) = self.ctx.structs.open_mut() {
            builder.add_field(Some(name), 0);
            return;
        }
        let mut record = LineRecord::new(origin.clone(), text);
        record.label = self.declare_label(origin, text, name);
        self.lines.push(record);
    }

    fn declare_label(&mut self, origin: &SourceOrigin, text: &str, name: &str) -> Option<String> {
        let err = if !is_valid_symbol(name) {
            AsmError::new(AsmErrorKind::Syntax, "Invalid label", Some(name))
        } else if is_register(name) {
            AsmError::new(
                AsmErrorKind::Syntax,
                "Register name cannot be used as a label",
                Some(name),
            )
        } else {
            match self.ctx.symbols.declare(name, SymbolKind::Label) {
                SymbolTableResult::Ok => return Some(name.to_string()),
                SymbolTableResult::Duplicate | SymbolTableResult::NotFound => AsmError::new(
                    AsmErrorKind::Redefinition,
                    "Symbol is already defined",
                    Some(name),
                ),
            }
        };
        self.report(origin, text, Severity::Error, err.with_column(Some(1)));
        None
    }

    fn begin_macro(&mut self, origin: &SourceOrigin, text: &str, name: &str) {
        let result = if self.registry.contains(name) {
            Err(AsmError::new(
                AsmErrorKind::Macro,
                "Macro name shadows a mnemonic",
                Some(name),
            ))
        } else {
            self.macros
                .begin(name, origin.clone())
                .map_err(|err| AsmError::new(AsmErrorKind::Macro, err.message(), None))
        };
        if let Err(err) = result {
            self.report(origin, text, Severity::Error, err.with_column(Some(1)));
        }
    }

    fn capture_macro_line(&mut self, origin: &SourceOrigin, text: &str) {
        let desc = split_line(text)
            .and_then(|split| split.mnemonic)
            .and_then(|mnemonic| self.registry.lookup(mnemonic, self.ctx.cpu).ok());
        match desc {
            Some(desc) if desc.has(InsnFlags::MACRO_END) => {
                if let Err(err) = self.macros.finish(origin.line).map(|_| ()) {
                    let err = AsmError::new(AsmErrorKind::Macro, err.message(), None);
                    self.report(origin, text, Severity::Error, err);
                }
            }
            Some(desc) if desc.has(InsnFlags::MACRO_START) => {
                let err = AsmError::new(
                    AsmErrorKind::Macro,
                    "Macro definitions cannot nest",
                    None,
                )
                .with_column(Some(1));
                self.report(origin, text, Severity::Error, err);
            }
            _ => self.macros.capture_line(text),
        }
    }

    fn expand_macro(
        &mut self,
        origin: &SourceOrigin,
        text: &str,
        split: &SplitLine<'_>,
        name: &str,
        depth: usize,
    ) -> Result<(), AsmError> {
        if depth >= self.config.max_macro_depth {
            let err = AsmError::new(
                AsmErrorKind::Macro,
                &format!(
                    "Macro expansion exceeds depth limit of {}",
                    self.config.max_macro_depth
                ),
                Some(name),
            )
            .with_column(Some(column_in(text, name) + 1));
            return Err(self.fatal(origin, text, err));
        }
        self.label_only(origin, text, split);
        let args = operand_field(split.operand);
        let expanded = match self.macros.expand(name, args, origin.line) {
            Ok(lines) => lines,
            Err(err) => {
                let err = AsmError::new(AsmErrorKind::Macro, err.message(), Some(name))
                    .with_column(Some(split.operand_col + 1));
                self.report(origin, text, Severity::Error, err);
                return Ok(());
            }
        };
        trace!(macro_name = name, lines = expanded.len(), depth, "expanding macro");
        for line in &expanded {
            if self.ended {
                break;
            }
            self.parse_line(origin, line, depth + 1)?;
        }
        Ok(())
    }

    /// Blocks still open at the end of input are fatal.
    fn finish_parse(&mut self) -> Result<(), AsmError> {
        let unterminated = if let Some(def) = self.macros.open_definition() {
            Some((
                def.origin.clone(),
                AsmError::new(AsmErrorKind::Macro, "Macro without endm", Some(def.name.as_str())),
                "add endm after the macro body",
            ))
        } else if let Some(open) = self.conditionals.last() {
            Some((
                open.origin.clone(),
                AsmError::new(AsmErrorKind::Conditional, "Conditional block without endc", None),
                "add a matching endc or endif",
            ))
        } else {
            self.ctx.structs.open().map(|builder| {
                (
                    builder.origin.clone(),
                    AsmError::new(
                        AsmErrorKind::Directive,
                        "Struct without endstruct",
                        Some(builder.name.as_str()),
                    ),
                    "add endstruct after the last field",
                )
            })
        };
        match unterminated {
            Some((origin, err, help)) => {
                self.diagnostics.push(
                    Diagnostic::new(origin.line, Severity::Error, err.clone())
                        .with_file(origin.file_name())
                        .with_help(help),
                );
                Err(err)
            }
            None => Ok(()),
        }
    }
}
