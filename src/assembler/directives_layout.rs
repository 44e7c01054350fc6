// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Address-space directives: `org`, `reorg`, `setdp`, `section`,
//! `endsection`, `align` and `end`.

use crate::core::assembler::context::AsmContext;
use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::display_value;
use crate::core::line::LineRecord;
use crate::core::operand::ParsedOperand;
use crate::core::registry::{
    Emission, InstructionDescriptor, InstructionOps, ParseOutcome, ParseRequest, Parsed, Sizing,
};
use crate::core::text_utils::is_valid_symbol;

use super::directives::{
    directive_error, item_expr, operand_items, operand_mismatch, single_expr,
};
use super::directives_data::byte_value;

fn no_operand(desc: &InstructionDescriptor, req: &ParseRequest<'_>) -> Result<(), AsmError> {
    match operand_items(req).first() {
        Some((_, col)) => Err(directive_error(
            "Directive takes no operand",
            Some(desc.mnemonic),
            *col,
        )),
        None => Ok(()),
    }
}

fn range_error(msg: &str, value: i64, col: usize) -> AsmError {
    AsmError::new(AsmErrorKind::Range, &format!("{msg}: {}", display_value(value)), None)
        .with_column(Some(col))
}

pub struct OrgOps;

impl InstructionOps for OrgOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let expr = single_expr(desc, req)?;
        Ok(ParseOutcome::Line(Parsed::new(ParsedOperand::Origin(expr), 0)))
    }

    fn apply(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<(), AsmError> {
        let ParsedOperand::Origin(expr) = &line.operand else {
            return Err(operand_mismatch(desc));
        };
        let col = expr.span().col_start;
        let address = ctx.eval_absolute(expr, desc.mnemonic)?;
        if !(0..=0xFFFF).contains(&address) {
            return Err(range_error("Origin out of range", address, col));
        }
        ctx.sections
            .set_origin(address as u32)
            .map_err(|err| directive_error(&err.message(), None, line.operand_col))
    }
}

/// Return to the address in effect before the last `org`.
pub struct ReorgOps;

impl InstructionOps for ReorgOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        no_operand(desc, req)?;
        Ok(ParseOutcome::Line(Parsed::empty()))
    }

    fn apply(
        &self,
        _desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<(), AsmError> {
        ctx.sections
            .restore_origin()
            .map_err(|err| directive_error(&err.message(), None, line.operand_col))
    }
}

pub struct SetDpOps;

impl InstructionOps for SetDpOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let expr = single_expr(desc, req)?;
        Ok(ParseOutcome::Line(Parsed::new(ParsedOperand::DirectPage(expr), 0)))
    }

    fn apply(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<(), AsmError> {
        let ParsedOperand::DirectPage(expr) = &line.operand else {
            return Err(operand_mismatch(desc));
        };
        let page = ctx.eval_absolute(expr, desc.mnemonic)?;
        if !(0..=0xFF).contains(&page) {
            return Err(range_error(
                "Direct page must be 0-255",
                page,
                expr.span().col_start,
            ));
        }
        ctx.dp = page as u8;
        Ok(())
    }
}

pub struct SectionOps;

impl InstructionOps for SectionOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let items = operand_items(req);
        let [(name, col)] = items.as_slice() else {
            return Err(directive_error(
                "Expected one section name",
                Some(desc.mnemonic),
                req.operand_col,
            ));
        };
        if !is_valid_symbol(name) {
            return Err(directive_error("Invalid section name", Some(name), *col));
        }
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::Section(name.to_string()),
            0,
        )))
    }

    fn apply(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<(), AsmError> {
        let ParsedOperand::Section(name) = &line.operand else {
            return Err(operand_mismatch(desc));
        };
        ctx.sections.enter(name);
        Ok(())
    }
}

pub struct EndSectionOps;

impl InstructionOps for EndSectionOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        no_operand(desc, req)?;
        Ok(ParseOutcome::Line(Parsed::empty()))
    }

    fn apply(
        &self,
        _desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<(), AsmError> {
        ctx.sections
            .leave()
            .map_err(|err| directive_error(&err.message(), None, line.operand_col))
    }
}

/// `align n[,fill]`: pad to the next multiple of `n` within the section.
pub struct AlignOps;

impl AlignOps {
    fn boundary(
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &AsmContext,
    ) -> Result<u32, AsmError> {
        let ParsedOperand::Align { boundary, .. } = &line.operand else {
            return Err(operand_mismatch(desc));
        };
        let n = ctx.eval_absolute(boundary, desc.mnemonic)?;
        if !(1..=0x10000).contains(&n) {
            return Err(range_error(
                "Alignment must be 1-65536",
                n,
                boundary.span().col_start,
            ));
        }
        Ok(n as u32)
    }
}

impl InstructionOps for AlignOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let items = operand_items(req);
        let line_num = req.origin.line;
        let (boundary, fill) = match items.as_slice() {
            [(n, n_col)] => (item_expr(n, line_num, *n_col)?, None),
            [(n, n_col), (f, f_col)] => (
                item_expr(n, line_num, *n_col)?,
                Some(item_expr(f, line_num, *f_col)?),
            ),
            _ => {
                return Err(directive_error(
                    "Expected boundary[,fill]",
                    Some(desc.mnemonic),
                    req.operand_col,
                ))
            }
        };
        let n = ctx.eval_now(&boundary, desc.mnemonic)?;
        if !(1..=0x10000).contains(&n) {
            return Err(range_error(
                "Alignment must be 1-65536",
                n,
                boundary.span().col_start,
            ));
        }
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::Align { boundary, fill },
            (n - 1) as u32,
        )))
    }

    fn resolve(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Option<Sizing>, AsmError> {
        let n = Self::boundary(desc, line, ctx)?;
        Ok(Some(Sizing::Exact((n - line.address % n) % n)))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let ParsedOperand::Align { fill, .. } = &line.operand else {
            return Err(operand_mismatch(desc));
        };
        let byte = match fill {
            Some(expr) => byte_value(ctx, expr, desc.mnemonic)?,
            None => 0,
        };
        Ok(Emission::bytes(vec![byte; line.size as usize]))
    }
}

/// `end [entry]`: stop reading input, optionally recording the entry point.
pub struct EndOps;

impl InstructionOps for EndOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let entry = match operand_items(req).as_slice() {
            [] => None,
            [(text, col)] => Some(item_expr(text, req.origin.line, *col)?),
            [_, (_, col), ..] => {
                return Err(directive_error("Too many operands", Some(desc.mnemonic), *col))
            }
        };
        Ok(ParseOutcome::EndInput(Parsed::new(ParsedOperand::End(entry), 0)))
    }

    fn apply(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<(), AsmError> {
        let ParsedOperand::End(entry) = &line.operand else {
            return Err(operand_mismatch(desc));
        };
        ctx.entry = match entry {
            Some(expr) => Some(ctx.eval(expr)?),
            None => None,
        };
        Ok(())
    }
}
