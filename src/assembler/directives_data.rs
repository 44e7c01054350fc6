// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Data directives: constants (`fcb`, `fdb`, `fqb`), strings (`fcc`, `fcs`,
//! `fcn`) and reserved space (`rmb`, `rmd`, `rmq`, `zmb`, `zmd`, `fill`).

use crate::core::assembler::context::AsmContext;
use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::display_value;
use crate::core::line::LineRecord;
use crate::core::operand::ParsedOperand;
use crate::core::parser::Expr;
use crate::core::registry::{
    Emission, InstructionDescriptor, InstructionOps, ParseOutcome, ParseRequest, Parsed, Sizing,
};
use crate::core::text_utils::{is_space, parse_delimited};
use crate::families::m6800::handler::push_field;

use super::directives::{directive_error, item_expr, operand_items, operand_mismatch, single_expr};

/// Upper bound for one reservation, so a runaway count cannot exhaust memory.
const MAX_RESERVE: i64 = 0x10000;

fn count_value(ctx: &AsmContext, expr: &Expr, what: &str) -> Result<u32, AsmError> {
    let n = ctx.eval_absolute(expr, what)?;
    if !(0..=MAX_RESERVE).contains(&n) {
        return Err(AsmError::new(
            AsmErrorKind::Range,
            &format!("Count out of range: {n}"),
            Some(what),
        )
        .with_column(Some(expr.span().col_start)));
    }
    Ok(n as u32)
}

pub(crate) fn byte_value(ctx: &AsmContext, expr: &Expr, what: &str) -> Result<u8, AsmError> {
    let v = ctx.eval_absolute(expr, what)?;
    if !(-128..=255).contains(&v) {
        return Err(AsmError::new(
            AsmErrorKind::Range,
            &format!("Fill byte out of range: {}", display_value(v)),
            Some(what),
        )
        .with_column(Some(expr.span().col_start)));
    }
    Ok(v as u8)
}

/// Comma-separated values of `width` bytes each.
pub struct DataOps {
    pub width: u32,
}

impl InstructionOps for DataOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let items = operand_items(req);
        if items.is_empty() {
            return Err(directive_error(
                "Missing operand",
                Some(desc.mnemonic),
                req.operand_col,
            ));
        }
        let values = items
            .into_iter()
            .map(|(text, col)| item_expr(text, req.origin.line, col))
            .collect::<Result<Vec<_>, _>>()?;
        let size = values.len() as u32 * self.width;
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::Values(values),
            size,
        )))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let ParsedOperand::Values(values) = &line.operand else {
            return Err(operand_mismatch(desc));
        };
        let mut em = Emission::default();
        for expr in values {
            let value = ctx.eval(expr)?;
            push_field(&mut em, &value, self.width, expr.span().col_start)?;
        }
        Ok(em)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Plain,
    /// `fcs`: bit 7 set on the final character.
    HighBitLast,
    /// `fcn`: followed by a zero byte.
    NulTerminated,
}

pub struct TextOps {
    pub mode: TextMode,
}

impl InstructionOps for TextOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let (mut bytes, consumed) = parse_delimited(req.operand)
            .map_err(|msg| directive_error(msg, Some(desc.mnemonic), req.operand_col))?;
        let rest = &req.operand[consumed..];
        if rest.bytes().next().is_some_and(|c| !is_space(c) && c != b';') {
            return Err(directive_error(
                "Unexpected text after string",
                Some(rest),
                req.operand_col + consumed,
            ));
        }
        match self.mode {
            TextMode::Plain => {}
            TextMode::HighBitLast => match bytes.last_mut() {
                Some(last) => *last |= 0x80,
                None => {
                    return Err(directive_error(
                        "String must not be empty",
                        Some(desc.mnemonic),
                        req.operand_col,
                    ))
                }
            },
            TextMode::NulTerminated => bytes.push(0),
        }
        let size = bytes.len() as u32;
        Ok(ParseOutcome::Line(Parsed::new(ParsedOperand::Text(bytes), size)))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        _ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let ParsedOperand::Text(bytes) = &line.operand else {
            return Err(operand_mismatch(desc));
        };
        Ok(Emission::bytes(bytes.clone()))
    }
}

/// `rmb`/`rmd`/`rmq` reserve space; `zmb`/`zmd` fill it with zeros.
/// Inside a struct definition the reservation becomes a field.
pub struct ReserveOps {
    pub width: u32,
    pub zero: bool,
}

impl InstructionOps for ReserveOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let expr = single_expr(desc, req)?;
        if ctx.structs.in_definition() {
            let size = ctx.eval_now(&expr, desc.mnemonic)?;
            if !(0..=MAX_RESERVE).contains(&size) {
                return Err(directive_error(
                    "Field size out of range",
                    Some(desc.mnemonic),
                    req.operand_col,
                ));
            }
            if let Some(builder) = ctx.structs.open_mut() {
                builder.add_field(req.label, size as u32 * self.width);
            }
            return Ok(ParseOutcome::Line(Parsed::empty()));
        }
        // A forward count sizes the line at zero until it resolves.
        let size = match count_value(ctx, &expr, desc.mnemonic) {
            Ok(n) => n * self.width,
            Err(err) if err.is_pending() => 0,
            Err(err) => return Err(err),
        };
        Ok(ParseOutcome::Line(Parsed::new(ParsedOperand::Count(expr), size)))
    }

    fn resolve(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Option<Sizing>, AsmError> {
        match &line.operand {
            ParsedOperand::Count(expr) => Ok(Some(Sizing::Exact(
                count_value(ctx, expr, desc.mnemonic)? * self.width,
            ))),
            _ => Ok(None),
        }
    }

    fn emit(
        &self,
        _desc: &InstructionDescriptor,
        line: &LineRecord,
        _ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        if self.zero {
            Ok(Emission::bytes(vec![0; line.size as usize]))
        } else {
            Ok(Emission::reserve(line.size))
        }
    }
}

/// `fill value,count`.
pub struct FillOps;

impl InstructionOps for FillOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let items = operand_items(req);
        let [(value, value_col), (count, count_col)] = items.as_slice() else {
            return Err(directive_error(
                "Expected value,count",
                Some(desc.mnemonic),
                req.operand_col,
            ));
        };
        let value = item_expr(value, req.origin.line, *value_col)?;
        let count = item_expr(count, req.origin.line, *count_col)?;
        let size = match count_value(ctx, &count, desc.mnemonic) {
            Ok(n) => n,
            Err(err) if err.is_pending() => 0,
            Err(err) => return Err(err),
        };
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::Fill { value, count },
            size,
        )))
    }

    fn resolve(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Option<Sizing>, AsmError> {
        let ParsedOperand::Fill { count, .. } = &line.operand else {
            return Err(operand_mismatch(desc));
        };
        Ok(Some(Sizing::Exact(count_value(ctx, count, desc.mnemonic)?)))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let ParsedOperand::Fill { value, .. } = &line.operand else {
            return Err(operand_mismatch(desc));
        };
        let byte = byte_value(ctx, value, desc.mnemonic)?;
        Ok(Emission::bytes(vec![byte; line.size as usize]))
    }
}
