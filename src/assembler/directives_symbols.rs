// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Directives that create or test symbols: `equ`, `set`, `extern`, `export`,
//! struct definitions and instances, macro brackets, conditionals and
//! user messages.

use crate::core::assembler::conditional::ConditionalAction;
use crate::core::assembler::context::AsmContext;
use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::Value;
use crate::core::line::LineRecord;
use crate::core::operand::{ParsedOperand, StructField};
use crate::core::registry::{
    Emission, InstructionDescriptor, InstructionOps, ParseOutcome, ParseRequest, Parsed,
};
use crate::core::symbol_table::{SymbolKind, SymbolTableResult};

use super::directives::{
    declare, directive_error, operand_items, operand_mismatch, require_label, single_expr,
    symbol_list,
};

fn assignment(
    desc: &InstructionDescriptor,
    req: &ParseRequest<'_>,
    ctx: &mut AsmContext,
    kind: SymbolKind,
) -> Result<ParseOutcome, AsmError> {
    let name = require_label(desc, req)?;
    let expr = single_expr(desc, req)?;
    declare(ctx, name, kind)?;
    // Constant operands are visible to conditionals on later lines.
    match ctx.eval(&expr) {
        Ok(value) => ctx.define_symbol(name, value)?,
        Err(err) if err.is_pending() => {}
        Err(err) => return Err(err),
    }
    Ok(ParseOutcome::Line(Parsed::new(
        ParsedOperand::Assignment(expr),
        0,
    )))
}

fn apply_assignment(
    desc: &InstructionDescriptor,
    line: &LineRecord,
    ctx: &mut AsmContext,
) -> Result<(), AsmError> {
    let (Some(name), ParsedOperand::Assignment(expr)) = (&line.label, &line.operand) else {
        return Err(operand_mismatch(desc));
    };
    let value = ctx.eval(expr)?;
    ctx.define_symbol(name, value)
        .map_err(|err| err.with_column(Some(expr.span().col_start)))
}

/// `name equ value`
pub struct EquOps;

impl InstructionOps for EquOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        assignment(desc, req, ctx, SymbolKind::Constant)
    }

    fn apply(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<(), AsmError> {
        apply_assignment(desc, line, ctx)
    }
}

/// `name set value`: like `equ`, but may be reassigned.
pub struct SetOps;

impl InstructionOps for SetOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        assignment(desc, req, ctx, SymbolKind::Variable)
    }

    fn apply(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<(), AsmError> {
        apply_assignment(desc, line, ctx)
    }
}

pub struct ExternOps;

impl InstructionOps for ExternOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let names = symbol_list(desc, req)?;
        for name in &names {
            declare(ctx, name, SymbolKind::External)?;
        }
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::Symbols(names),
            0,
        )))
    }
}

pub struct ExportOps;

impl InstructionOps for ExportOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let names = symbol_list(desc, req)?;
        for name in &names {
            if ctx.symbols.mark_exported(name) != SymbolTableResult::Ok {
                return Err(directive_error(
                    "Cannot export an external symbol",
                    Some(name.as_str()),
                    req.operand_col,
                ));
            }
        }
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::Symbols(names),
            0,
        )))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let ParsedOperand::Symbols(names) = &line.operand else {
            return Err(operand_mismatch(desc));
        };
        if let Some(missing) = names.iter().find(|name| !ctx.symbols.is_defined(name)) {
            return Err(AsmError::new(
                AsmErrorKind::UndefinedSymbol,
                "Exported symbol is never defined",
                Some(missing.as_str()),
            )
            .with_column(Some(line.operand_col + 1)));
        }
        Ok(Emission::default())
    }
}

/// `name struct`
pub struct StructOps;

impl InstructionOps for StructOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let name = require_label(desc, req)?;
        if ctx
            .symbols
            .entry(name)
            .is_some_and(|entry| entry.kind != SymbolKind::Referenced)
        {
            return Err(AsmError::new(
                AsmErrorKind::Redefinition,
                "Symbol is already defined",
                Some(name),
            )
            .with_column(Some(1)));
        }
        ctx.structs
            .begin(name, req.origin.clone())
            .map_err(|err| directive_error(&err.message(), Some(name), 0))?;
        Ok(ParseOutcome::Line(Parsed::empty()))
    }
}

/// `endstruct` / `ends`: the struct name becomes its size and each field
/// `name.field` its offset.
pub struct EndStructOps;

impl InstructionOps for EndStructOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        if let Some((_, col)) = operand_items(req).first() {
            return Err(directive_error(
                "Directive takes no operand",
                Some(desc.mnemonic),
                *col,
            ));
        }
        if let (Some(label), Some(builder)) = (req.label, ctx.structs.open_mut()) {
            builder.add_field(Some(label), 0);
        }
        let def = ctx
            .structs
            .finish()
            .map_err(|err| directive_error(&err.message(), None, 0))?;
        declare(ctx, &def.name, SymbolKind::Constant)?;
        ctx.define_symbol(&def.name, Value::Absolute(def.size as i64))?;
        for field in &def.fields {
            let name = format!("{}.{}", def.name, field.name);
            declare(ctx, &name, SymbolKind::Constant)?;
            ctx.define_symbol(&name, Value::Absolute(field.offset as i64))?;
        }
        Ok(ParseOutcome::Line(Parsed::empty()))
    }
}

fn offset_value(base: &Value, offset: u32) -> Value {
    match base {
        Value::Absolute(v) => Value::Absolute(v + offset as i64),
        Value::Relocatable { base, offset: at } => Value::Relocatable {
            base: base.clone(),
            offset: at + offset as i64,
        },
    }
}

/// A line whose mnemonic names a struct: reserves one instance, or embeds
/// the struct when it appears inside another definition.
pub struct StructInstanceOps;

impl InstructionOps for StructInstanceOps {
    fn parse(
        &self,
        _desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let Some(def) = ctx.structs.get(req.mnemonic).cloned() else {
            return Err(AsmError::new(
                AsmErrorKind::Internal,
                "Struct instance without definition",
                Some(req.mnemonic),
            ));
        };
        if let Some((_, col)) = operand_items(req).first() {
            return Err(directive_error(
                "Struct instance takes no operand",
                Some(req.mnemonic),
                *col,
            ));
        }
        if let Some(builder) = ctx.structs.open_mut() {
            builder.add_nested(req.label, &def);
            return Ok(ParseOutcome::Line(Parsed::empty()));
        }
        let mut fields = Vec::new();
        if let Some(label) = req.label {
            for field in &def.fields {
                let name = format!("{label}.{}", field.name);
                declare(ctx, &name, SymbolKind::Label)?;
                fields.push(StructField {
                    name,
                    offset: field.offset,
                });
            }
        }
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::StructInstance {
                name: def.name,
                size: def.size,
                fields,
            },
            def.size,
        )))
    }

    fn apply(
        &self,
        _desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<(), AsmError> {
        let ParsedOperand::StructInstance { fields, .. } = &line.operand else {
            return Ok(());
        };
        let base = ctx.current()?;
        for field in fields {
            ctx.define_symbol(&field.name, offset_value(&base, field.offset))?;
        }
        Ok(())
    }

    fn emit(
        &self,
        _desc: &InstructionDescriptor,
        line: &LineRecord,
        _ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        Ok(Emission::reserve(line.size))
    }
}

/// `name macro`
pub struct MacroOps;

impl InstructionOps for MacroOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let name = require_label(desc, req)?;
        Ok(ParseOutcome::BeginMacro(name.to_string()))
    }
}

/// Only reached when no definition is open; the front end consumes `endm`
/// while capturing.
pub struct EndMacroOps;

impl InstructionOps for EndMacroOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        _req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        Err(AsmError::new(
            AsmErrorKind::Macro,
            "endm without macro",
            Some(desc.mnemonic),
        )
        .with_column(Some(1)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondTest {
    NonZero,
    Zero,
    Positive,
    NonNegative,
    Negative,
    NonPositive,
    Defined,
    NotDefined,
    Else,
    End,
}

impl CondTest {
    fn holds(self, value: i64) -> bool {
        match self {
            CondTest::NonZero => value != 0,
            CondTest::Zero => value == 0,
            CondTest::Positive => value > 0,
            CondTest::NonNegative => value >= 0,
            CondTest::Negative => value < 0,
            CondTest::NonPositive => value <= 0,
            CondTest::Defined | CondTest::NotDefined | CondTest::Else | CondTest::End => false,
        }
    }
}

/// The `if` family. Conditions are decided while parsing, so their operands
/// must only use symbols defined on earlier lines.
pub struct ConditionalOps {
    pub test: CondTest,
}

impl InstructionOps for ConditionalOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let action = match self.test {
            CondTest::Else => ConditionalAction::Else,
            CondTest::End => ConditionalAction::End,
            // Nested blocks inside a skipped one are tracked but not evaluated.
            _ if req.skipping => ConditionalAction::If(false),
            CondTest::Defined | CondTest::NotDefined => {
                let names = symbol_list(desc, req)?;
                let [name] = names.as_slice() else {
                    return Err(directive_error(
                        "Expected one symbol name",
                        Some(desc.mnemonic),
                        req.operand_col,
                    ));
                };
                let declared = ctx
                    .symbols
                    .entry(name)
                    .is_some_and(|entry| entry.kind != SymbolKind::Referenced);
                ConditionalAction::If(declared == (self.test == CondTest::Defined))
            }
            test => {
                let expr = single_expr(desc, req)?;
                ConditionalAction::If(test.holds(ctx.eval_now(&expr, desc.mnemonic)?))
            }
        };
        Ok(ParseOutcome::Conditional(action))
    }
}

/// `error text` fails the line; `warning text` reports and continues.
pub struct MessageOps {
    pub warning: bool,
}

impl MessageOps {
    fn text<'a>(req: &ParseRequest<'a>) -> &'a str {
        let text = req.operand.trim();
        text.strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(text)
    }
}

impl InstructionOps for MessageOps {
    fn parse(
        &self,
        _desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let text = Self::text(req);
        let error = AsmError::new(AsmErrorKind::Directive, text, None)
            .with_column(Some(req.operand_col + 1));
        if !self.warning {
            return Err(error);
        }
        ctx.warn(error);
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::Message(text.to_string()),
            0,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_tests_compare_against_zero() {
        assert!(CondTest::NonZero.holds(3));
        assert!(!CondTest::NonZero.holds(0));
        assert!(CondTest::Zero.holds(0));
        assert!(CondTest::Positive.holds(1));
        assert!(!CondTest::Positive.holds(0));
        assert!(CondTest::NonNegative.holds(0));
        assert!(CondTest::Negative.holds(-1));
        assert!(CondTest::NonPositive.holds(0));
        assert!(!CondTest::NonPositive.holds(2));
    }

    #[test]
    fn struct_instance_offsets_keep_their_base() {
        let base = Value::Relocatable {
            base: crate::core::expr::RelocBase::Section("data".to_string()),
            offset: 4,
        };
        assert_eq!(
            offset_value(&base, 3),
            Value::Relocatable {
                base: crate::core::expr::RelocBase::Section("data".to_string()),
                offset: 7,
            }
        );
        assert_eq!(offset_value(&Value::Absolute(0x100), 2), Value::Absolute(0x102));
    }
}
