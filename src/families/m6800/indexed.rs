// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Indexed addressing: postbyte selection and offset sizing.
//!
//! The postbyte layout is `1RRI_MMMM` for the long forms and `0RRn_nnnn` for
//! 5-bit offsets, where `RR` is the index register and `I` the indirect bit.

use crate::core::assembler::context::AsmContext;
use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::{fits_i5, fits_i8, Value};
use crate::core::operand::{IndexedForm, IndexedOperand, OffsetForce, WForm};
use crate::core::registry::Emission;

use super::handler::{distance_from, push_field, push_pc_relative};

const INDIRECT: u8 = 0x10;

/// Offset bytes after the postbyte for the longest encoding of `op`.
pub fn max_extra(op: &IndexedOperand) -> u32 {
    match &op.form {
        IndexedForm::Offset { force, .. } | IndexedForm::ProgramCounter { force, .. } => {
            match force {
                OffsetForce::Bits5 => 0,
                OffsetForce::Bits8 => 1,
                OffsetForce::Auto | OffsetForce::Bits16 => 2,
            }
        }
        IndexedForm::Extended(_) | IndexedForm::W(WForm::Offset(_)) => 2,
        IndexedForm::ZeroOffset { .. }
        | IndexedForm::Accumulator { .. }
        | IndexedForm::AutoIncrement { .. }
        | IndexedForm::AutoDecrement { .. }
        | IndexedForm::W(_) => 0,
    }
}

/// Whether the offset width depends on values that may change between passes.
pub fn is_variable(op: &IndexedOperand) -> bool {
    matches!(
        op.form,
        IndexedForm::Offset { force: OffsetForce::Auto, .. }
            | IndexedForm::ProgramCounter { force: OffsetForce::Auto, .. }
    )
}

/// Shortest offset width valid for the current values.
///
/// `prefix` is the number of instruction bytes before the postbyte and
/// `current_len` the length the line holds in this pass.
pub fn required_extra(
    op: &IndexedOperand,
    ctx: &AsmContext,
    here: &Value,
    prefix: u32,
    current_len: u32,
) -> Result<u32, AsmError> {
    if !is_variable(op) {
        return Ok(max_extra(op));
    }
    match &op.form {
        IndexedForm::Offset { offset, .. } => match ctx.eval(offset) {
            Ok(Value::Absolute(0)) => Ok(0),
            Ok(Value::Absolute(v)) if fits_i5(v) && !op.indirect => Ok(0),
            Ok(Value::Absolute(v)) if fits_i8(v) => Ok(1),
            Ok(_) => Ok(2),
            Err(err) if err.is_pending() => Ok(2),
            Err(err) => Err(err),
        },
        IndexedForm::ProgramCounter {
            offset, relative, ..
        } => {
            let value = match ctx.eval(offset) {
                Ok(value) => value,
                Err(err) if err.is_pending() => return Ok(2),
                Err(err) => return Err(err),
            };
            let displacement = if *relative {
                distance_from(&value, here).map(|d| short_displacement(d, prefix + 2, current_len))
            } else {
                value.absolute()
            };
            Ok(match displacement {
                Some(d) if fits_i8(d) => 1,
                _ => 2,
            })
        }
        _ => Ok(max_extra(op)),
    }
}

/// Displacement a short PC-relative form would encode. `short_end` is the
/// length of the short form; a forward target moves back with the line when
/// it shrinks from `current_len`.
pub fn short_displacement(distance: i64, short_end: u32, current_len: u32) -> i64 {
    if distance > 0 {
        distance - i64::from(short_end.max(current_len))
    } else {
        distance - i64::from(short_end)
    }
}

fn base_postbyte(op: &IndexedOperand, long: u8) -> u8 {
    if op.indirect {
        long | INDIRECT
    } else {
        long
    }
}

fn range_error(msg: &str, expr_col: usize) -> AsmError {
    AsmError::new(AsmErrorKind::Range, msg, None).with_column(Some(expr_col))
}

/// Append the postbyte and `extra` offset bytes for `op` to `em`.
pub fn encode_indexed(
    op: &IndexedOperand,
    extra: u32,
    ctx: &AsmContext,
    here: &Value,
    em: &mut Emission,
) -> Result<(), AsmError> {
    match &op.form {
        IndexedForm::ZeroOffset { base } => {
            em.bytes.push(base_postbyte(op, 0x84) | base.bits());
        }
        IndexedForm::Accumulator { base, postbyte } => {
            em.bytes.push(base_postbyte(op, *postbyte) | base.bits());
        }
        IndexedForm::AutoIncrement { base, double } => {
            let mode = if *double { 0x81 } else { 0x80 };
            em.bytes.push(base_postbyte(op, mode) | base.bits());
        }
        IndexedForm::AutoDecrement { base, double } => {
            let mode = if *double { 0x83 } else { 0x82 };
            em.bytes.push(base_postbyte(op, mode) | base.bits());
        }
        IndexedForm::Offset { base, offset, force } => {
            let value = ctx.eval(offset)?;
            let col = offset.span().col_start;
            match extra {
                0 => {
                    let Some(v) = value.absolute() else {
                        return Err(range_error("Relocatable offset requires 16 bits", col));
                    };
                    if v == 0 && *force != OffsetForce::Bits5 {
                        em.bytes.push(base_postbyte(op, 0x84) | base.bits());
                    } else if fits_i5(v) && !op.indirect {
                        em.bytes.push(base.bits() | (v as u8 & 0x1F));
                    } else {
                        return Err(range_error("Offset out of 5-bit range", col));
                    }
                }
                1 => {
                    let Some(v) = value.absolute().filter(|v| fits_i8(*v)) else {
                        return Err(range_error("Offset out of 8-bit range", col));
                    };
                    em.bytes.push(base_postbyte(op, 0x88) | base.bits());
                    em.bytes.push(v as u8);
                }
                _ => {
                    em.bytes.push(base_postbyte(op, 0x89) | base.bits());
                    push_field(em, &value, 2, col)?;
                }
            }
        }
        IndexedForm::ProgramCounter {
            offset, relative, ..
        } => {
            let value = ctx.eval(offset)?;
            let col = offset.span().col_start;
            let postbyte = if extra == 1 { 0x8C } else { 0x8D };
            em.bytes.push(base_postbyte(op, postbyte));
            let end = i64::from(em.bytes.len() as u32 + extra);
            match (extra, *relative) {
                (1, true) => {
                    let Some(d) = distance_from(&value, here)
                        .map(|d| d - end)
                        .filter(|d| fits_i8(*d))
                    else {
                        return Err(range_error("PC-relative offset out of 8-bit range", col));
                    };
                    em.bytes.push(d as u8);
                }
                (1, false) => {
                    let Some(v) = value.absolute().filter(|v| fits_i8(*v)) else {
                        return Err(range_error("Offset out of 8-bit range", col));
                    };
                    em.bytes.push(v as u8);
                }
                (_, true) => {
                    let distance = distance_from(&value, here).map(|d| d - end);
                    push_pc_relative(em, &value, distance);
                }
                (_, false) => push_field(em, &value, 2, col)?,
            }
        }
        IndexedForm::Extended(address) => {
            em.bytes.push(0x9F);
            let value = ctx.eval(address)?;
            push_field(em, &value, 2, address.span().col_start)?;
        }
        IndexedForm::W(form) => match form {
            WForm::Zero => em.bytes.push(if op.indirect { 0x90 } else { 0x8F }),
            WForm::Offset(offset) => {
                em.bytes.push(if op.indirect { 0xB0 } else { 0xAF });
                let value = ctx.eval(offset)?;
                push_field(em, &value, 2, offset.span().col_start)?;
            }
            WForm::Increment => em.bytes.push(if op.indirect { 0xD0 } else { 0xCF }),
            WForm::Decrement => em.bytes.push(if op.indirect { 0xF0 } else { 0xEF }),
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembler::context::{BranchPolicy, Phase};
    use crate::core::cpu::CpuVariant;
    use crate::core::symbol_table::SymbolKind;
    use crate::families::m6800::operand::parse_indexed;

    fn parse_indexed_text(text: &str) -> IndexedOperand {
        parse_indexed(text, 1, 0, CpuVariant::HD6309).expect("parse")
    }

    fn ctx() -> AsmContext {
        let mut ctx = AsmContext::new(CpuVariant::HD6309, BranchPolicy::Relax, 0);
        ctx.phase = Phase::Emit;
        ctx.here = Some(Value::Absolute(0x1000));
        ctx
    }

    fn encode(text: &str, ctx: &AsmContext) -> Vec<u8> {
        let op = parse_indexed_text(text);
        let here = Value::Absolute(0x1000);
        let extra = required_extra(&op, ctx, &here, 1, 0).expect("size");
        let mut em = Emission::default();
        em.bytes.push(0xA6);
        encode_indexed(&op, extra, ctx, &here, &mut em).expect("encode");
        em.bytes
    }

    #[test]
    fn offsets_pick_the_smallest_width() {
        let ctx = ctx();
        assert_eq!(encode(",x", &ctx), vec![0xA6, 0x84]);
        assert_eq!(encode("0,y", &ctx), vec![0xA6, 0xA4]);
        assert_eq!(encode("-16,u", &ctx), vec![0xA6, 0x50]);
        assert_eq!(encode("15,s", &ctx), vec![0xA6, 0x6F]);
        assert_eq!(encode("16,x", &ctx), vec![0xA6, 0x88, 0x10]);
        assert_eq!(encode("-129,x", &ctx), vec![0xA6, 0x89, 0xFF, 0x7F]);
        assert_eq!(encode("[1,x]", &ctx), vec![0xA6, 0x98, 0x01]);
        assert_eq!(encode(">1,x", &ctx), vec![0xA6, 0x89, 0x00, 0x01]);
    }

    #[test]
    fn register_and_auto_forms() {
        let ctx = ctx();
        assert_eq!(encode("a,x", &ctx), vec![0xA6, 0x86]);
        assert_eq!(encode("d,u", &ctx), vec![0xA6, 0xCB]);
        assert_eq!(encode(",x+", &ctx), vec![0xA6, 0x80]);
        assert_eq!(encode(",--s", &ctx), vec![0xA6, 0xE3]);
        assert_eq!(encode("[,y++]", &ctx), vec![0xA6, 0xB1]);
        assert_eq!(encode("[$1234]", &ctx), vec![0xA6, 0x9F, 0x12, 0x34]);
        assert_eq!(encode(",w++", &ctx), vec![0xA6, 0xCF]);
        assert_eq!(encode("[2,w]", &ctx), vec![0xA6, 0xB0, 0x00, 0x02]);
    }

    #[test]
    fn pc_relative_offsets_count_from_the_next_instruction() {
        let mut ctx = ctx();
        let _ = ctx.symbols.declare("near", SymbolKind::Label);
        let _ = ctx.symbols.assign("near", Value::Absolute(0x1010));
        let _ = ctx.symbols.declare("far", SymbolKind::Label);
        let _ = ctx.symbols.assign("far", Value::Absolute(0x2000));
        assert_eq!(encode("near,pcr", &ctx), vec![0xA6, 0x8C, 0x0D]);
        assert_eq!(encode("far,pcr", &ctx), vec![0xA6, 0x8D, 0x0F, 0xFC]);
        assert_eq!(encode("4,pc", &ctx), vec![0xA6, 0x8C, 0x04]);
    }

    #[test]
    fn pending_offsets_take_sixteen_bits() {
        let mut ctx = ctx();
        ctx.phase = Phase::Resolve;
        let op = parse_indexed_text("later,x");
        let extra = required_extra(&op, &ctx, &Value::Absolute(0), 1, 0).unwrap();
        assert_eq!(extra, 2);
    }

    #[test]
    fn forward_distance_allows_for_the_line_shrinking() {
        assert_eq!(short_displacement(130, 3, 0), 127);
        assert_eq!(short_displacement(130, 3, 4), 126);
        assert_eq!(short_displacement(-10, 3, 4), -13);
        assert_eq!(short_displacement(0, 2, 3), -2);
    }
}
