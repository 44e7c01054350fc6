// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Relative branches and their short/long relaxation.

use tracing::trace;

use crate::core::assembler::context::{AsmContext, BranchPolicy};
use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::fits_i8;
use crate::core::line::LineRecord;
use crate::core::operand::ParsedOperand;
use crate::core::registry::{
    opcode_len, push_opcode, BranchForm, Emission, InstructionDescriptor, InstructionOps, Opcode,
    OpcodeSet, ParseOutcome, ParseRequest, Parsed, Sizing,
};

use super::handler::{distance_from, push_pc_relative};
use super::indexed::short_displacement;
use super::operand::{expr_at, field_of, syntax};

#[derive(Debug, Clone, Copy)]
struct BranchSlots {
    short: Option<Opcode>,
    long: Opcode,
    written: BranchForm,
}

impl BranchSlots {
    fn of(desc: &InstructionDescriptor) -> Result<Self, AsmError> {
        match desc.opcodes {
            OpcodeSet::Relative {
                short,
                long,
                written,
            } => Ok(Self {
                short,
                long,
                written,
            }),
            _ => Err(AsmError::new(
                AsmErrorKind::Internal,
                "Opcode table does not match operation",
                Some(desc.mnemonic),
            )),
        }
    }

    fn short_len(&self) -> Option<u32> {
        self.short.map(|opcode| opcode_len(opcode) + 1)
    }

    fn long_len(&self) -> u32 {
        opcode_len(self.long) + 2
    }

    /// The form chosen at parse time when the policy does not relax.
    fn fixed_len(&self, policy: BranchPolicy) -> Option<u32> {
        match (policy, self.written) {
            (BranchPolicy::Relax, _) => self.short_len().is_none().then(|| self.long_len()),
            (BranchPolicy::Explicit, BranchForm::Short) => self.short_len(),
            (BranchPolicy::Explicit, BranchForm::Long) => Some(self.long_len()),
        }
    }
}

/// `bra`/`lbra`, `bsr`/`lbsr` and the conditional branches.
pub struct RelativeOps;

impl InstructionOps for RelativeOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let slots = BranchSlots::of(desc)?;
        let (field, col) = field_of(req.operand, req.operand_col);
        if field.is_empty() {
            return Err(syntax("Missing branch target", Some(desc.mnemonic), col));
        }
        if field.starts_with('#') || field.contains(',') {
            return Err(syntax(
                "Branch target must be an address",
                Some(field),
                col,
            ));
        }
        let target = expr_at(field, req.origin.line, col)?;
        let size = slots
            .fixed_len(ctx.branch_policy)
            .unwrap_or_else(|| slots.long_len());
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::Relative(target),
            size,
        )))
    }

    fn resolve(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Option<Sizing>, AsmError> {
        let slots = BranchSlots::of(desc)?;
        let (Some(short_len), None) = (slots.short_len(), slots.fixed_len(ctx.branch_policy))
        else {
            return Ok(None);
        };
        let ParsedOperand::Relative(target) = &line.operand else {
            return Ok(None);
        };
        let long_len = slots.long_len();
        let target = match ctx.eval(target) {
            Ok(value) => value,
            Err(err) if err.is_pending() => return Ok(Some(Sizing::Relaxed(long_len))),
            Err(err) => return Err(err),
        };
        let size = match distance_from(&target, &line.here()) {
            Some(d) if fits_i8(short_displacement(d, short_len, line.size)) => short_len,
            Some(_) => long_len,
            None => {
                trace!(line = line.origin.line, "branch target in another section");
                long_len
            }
        };
        Ok(Some(Sizing::Relaxed(size)))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let slots = BranchSlots::of(desc)?;
        let ParsedOperand::Relative(expr) = &line.operand else {
            return Err(AsmError::new(
                AsmErrorKind::Internal,
                "Operand does not match instruction",
                Some(desc.mnemonic),
            ));
        };
        let target = ctx.eval(expr)?;
        let distance = distance_from(&target, &line.here());
        let col = Some(expr.span().col_start);
        let mut em = Emission::default();

        match slots.short.zip(slots.short_len()) {
            Some((opcode, short_len)) if line.size == short_len => {
                let Some(d) = distance else {
                    return Err(AsmError::new(
                        AsmErrorKind::Range,
                        "Short branch cannot reach another section",
                        Some(desc.mnemonic),
                    )
                    .with_column(col));
                };
                let offset = d - i64::from(short_len);
                if !fits_i8(offset) {
                    return Err(AsmError::new(
                        AsmErrorKind::Range,
                        &format!("Branch out of range ({offset} bytes)"),
                        Some(desc.mnemonic),
                    )
                    .with_column(col));
                }
                push_opcode(&mut em.bytes, opcode);
                em.bytes.push(offset as u8);
            }
            _ => {
                push_opcode(&mut em.bytes, slots.long);
                let end = i64::from(slots.long_len());
                push_pc_relative(&mut em, &target, distance.map(|d| d - end));
            }
        }
        Ok(em)
    }
}
