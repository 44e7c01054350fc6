// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Parse/resolve/emit operations for the 6809 addressing-mode families.

use crate::core::assembler::context::AsmContext;
use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::{display_value, value_fits_byte, value_fits_word, RelocBase, Value};
use crate::core::line::{LineRecord, RelocKind, RelocTarget, Relocation};
use crate::core::operand::{AddressForce, ParsedOperand};
use crate::core::registry::{
    opcode_len, push_opcode, Emission, InstructionDescriptor, InstructionOps, Opcode, OpcodeSet,
    OperandWidth, ParseOutcome, ParseRequest, Parsed, Sizing,
};

use super::indexed::{encode_indexed, is_variable, max_extra, required_extra};
use super::operand::{
    field_of, parse_general, parse_indexed, parse_register_list, parse_register_pair, syntax,
};

/// Distance from `from` to `target`, when both live in the same address space.
pub fn distance_from(target: &Value, from: &Value) -> Option<i64> {
    match (target, from) {
        (Value::Absolute(t), Value::Absolute(f)) => Some(t - f),
        (
            Value::Relocatable {
                base: RelocBase::Section(t_sec),
                offset: t,
            },
            Value::Relocatable {
                base: RelocBase::Section(f_sec),
                offset: f,
            },
        ) if t_sec == f_sec => Some(t - f),
        _ => None,
    }
}

/// Append `value` as a big-endian field of `width` bytes. Relocatable values
/// store their offset as the addend and record a relocation for the field.
pub fn push_field(em: &mut Emission, value: &Value, width: u32, col: usize) -> Result<(), AsmError> {
    let raw = match value {
        Value::Absolute(v) => {
            let fits = match width {
                1 => value_fits_byte(*v),
                2 => value_fits_word(*v),
                _ => (-(1i64 << 31)..=0xFFFF_FFFF).contains(v),
            };
            if !fits {
                return Err(AsmError::new(
                    AsmErrorKind::Range,
                    &format!("Value {} does not fit in {} bits", display_value(*v), width * 8),
                    None,
                )
                .with_column(Some(col)));
            }
            *v
        }
        Value::Relocatable { base, offset } => {
            let kind = match width {
                1 => RelocKind::Abs8,
                2 => RelocKind::Abs16,
                _ => {
                    return Err(AsmError::new(
                        AsmErrorKind::Range,
                        "Relocatable value cannot fill a 32-bit field",
                        Some(&base.to_string()),
                    )
                    .with_column(Some(col)))
                }
            };
            em.relocations.push(Relocation {
                offset: em.bytes.len() as u32,
                target: RelocTarget::from(base),
                addend: *offset,
                kind,
            });
            *offset
        }
    };
    for shift in (0..width).rev() {
        em.bytes.push((raw >> (shift * 8)) as u8);
    }
    Ok(())
}

/// Append a 16-bit PC-relative field whose displacement is measured from
/// the end of the field. An unknown `distance` becomes a relocation.
pub fn push_pc_relative(em: &mut Emission, target: &Value, distance: Option<i64>) {
    let field = match distance {
        Some(d) => d,
        None => {
            let target_ref = match target {
                Value::Absolute(_) => RelocTarget::Absolute,
                Value::Relocatable { base, .. } => RelocTarget::from(base),
            };
            let addend = target.offset() - 2;
            em.relocations.push(Relocation {
                offset: em.bytes.len() as u32,
                target: target_ref,
                addend,
                kind: RelocKind::PcRel16,
            });
            addend
        }
    };
    em.bytes.extend_from_slice(&(field as u16).to_be_bytes());
}

fn unexpected_operand(desc: &InstructionDescriptor) -> AsmError {
    AsmError::new(
        AsmErrorKind::Internal,
        "Operand does not match instruction",
        Some(desc.mnemonic),
    )
}

fn unexpected_opcodes(desc: &InstructionDescriptor) -> AsmError {
    AsmError::new(
        AsmErrorKind::Internal,
        "Opcode table does not match operation",
        Some(desc.mnemonic),
    )
}

/// How an address operand is encoded after the opcode bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Direct,
    Extended,
    Indexed { extra: u32 },
}

impl AddressMode {
    pub fn operand_len(self) -> u32 {
        match self {
            AddressMode::Direct => 1,
            AddressMode::Extended => 2,
            AddressMode::Indexed { extra } => 1 + extra,
        }
    }

    /// Recover the mode from the operand bytes the last pass settled on.
    pub fn from_len(operand: &ParsedOperand, len: u32) -> Option<Self> {
        match operand {
            ParsedOperand::Memory { .. } if len == 1 => Some(AddressMode::Direct),
            ParsedOperand::Memory { .. } => Some(AddressMode::Extended),
            ParsedOperand::Indexed(_) => Some(AddressMode::Indexed {
                extra: len.saturating_sub(1),
            }),
            _ => None,
        }
    }
}

/// Longest encoding of an address operand.
pub fn widest_mode(operand: &ParsedOperand) -> Option<AddressMode> {
    match operand {
        ParsedOperand::Memory {
            force: AddressForce::Direct,
            ..
        } => Some(AddressMode::Direct),
        ParsedOperand::Memory { .. } => Some(AddressMode::Extended),
        ParsedOperand::Indexed(op) => Some(AddressMode::Indexed {
            extra: max_extra(op),
        }),
        _ => None,
    }
}

/// Whether the address mode can change between passes.
pub fn mode_is_variable(operand: &ParsedOperand) -> bool {
    match operand {
        ParsedOperand::Memory { force, .. } => *force == AddressForce::Auto,
        ParsedOperand::Indexed(op) => is_variable(op),
        _ => false,
    }
}

/// Shortest address mode for the current values. `prefix` counts the
/// instruction bytes before the address operand.
pub fn choose_mode(
    operand: &ParsedOperand,
    ctx: &AsmContext,
    line: &LineRecord,
    prefix: u32,
) -> Result<Option<AddressMode>, AsmError> {
    match operand {
        ParsedOperand::Memory {
            expr,
            force: AddressForce::Auto,
        } => Ok(Some(match ctx.eval(expr) {
            Ok(Value::Absolute(v))
                if (0..=0xFFFF).contains(&v) && ((v >> 8) as u8) == line.dp =>
            {
                AddressMode::Direct
            }
            Ok(_) => AddressMode::Extended,
            Err(err) if err.is_pending() => AddressMode::Extended,
            Err(err) => return Err(err),
        })),
        ParsedOperand::Indexed(op) => Ok(Some(AddressMode::Indexed {
            extra: required_extra(op, ctx, &line.here(), prefix, line.size)?,
        })),
        other => Ok(widest_mode(other)),
    }
}

/// Append the address operand bytes for `mode`.
pub fn encode_address(
    operand: &ParsedOperand,
    mode: AddressMode,
    ctx: &AsmContext,
    line: &LineRecord,
    em: &mut Emission,
) -> Result<(), AsmError> {
    match (operand, mode) {
        (ParsedOperand::Memory { expr, .. }, AddressMode::Direct) => {
            let value = ctx.eval(expr)?;
            let col = expr.span().col_start;
            match value {
                Value::Absolute(v) if value_fits_word(v) => em.bytes.push(v as u8),
                Value::Absolute(v) => {
                    return Err(AsmError::new(
                        AsmErrorKind::Range,
                        &format!("Address {} out of range", display_value(v)),
                        None,
                    )
                    .with_column(Some(col)))
                }
                relocatable => push_field(em, &relocatable, 1, col)?,
            }
        }
        (ParsedOperand::Memory { expr, .. }, _) => {
            let value = ctx.eval(expr)?;
            push_field(em, &value, 2, expr.span().col_start)?;
        }
        (ParsedOperand::Indexed(op), AddressMode::Indexed { extra }) => {
            encode_indexed(op, extra, ctx, &line.here(), em)?;
        }
        _ => {
            return Err(AsmError::new(
                AsmErrorKind::Internal,
                "Address mode does not match operand",
                None,
            ))
        }
    }
    Ok(())
}

/// Inherent instructions and fixed byte sequences. Any operand text is
/// treated as a comment.
pub struct InherentOps;

impl InstructionOps for InherentOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        _req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let size = match desc.opcodes {
            OpcodeSet::Inherent(opcode) => opcode_len(opcode),
            OpcodeSet::Sequence(bytes) => bytes.len() as u32,
            _ => return Err(unexpected_opcodes(desc)),
        };
        Ok(ParseOutcome::Line(Parsed::new(ParsedOperand::None, size)))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        _line: &LineRecord,
        _ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let mut bytes = Vec::new();
        match desc.opcodes {
            OpcodeSet::Inherent(opcode) => push_opcode(&mut bytes, opcode),
            OpcodeSet::Sequence(seq) => bytes.extend_from_slice(seq),
            _ => return Err(unexpected_opcodes(desc)),
        }
        Ok(Emission::bytes(bytes))
    }
}

/// Loads, stores, arithmetic and read-modify-write operations with any of
/// the immediate, direct, indexed and extended modes.
pub struct GeneralOps;

struct GeneralSlots {
    direct: Option<Opcode>,
    indexed: Option<Opcode>,
    extended: Option<Opcode>,
    immediate: Option<Opcode>,
    width: OperandWidth,
}

fn general_slots(desc: &InstructionDescriptor) -> Result<GeneralSlots, AsmError> {
    match desc.opcodes {
        OpcodeSet::General {
            direct,
            indexed,
            extended,
            immediate,
            width,
        } => Ok(GeneralSlots {
            direct,
            indexed,
            extended,
            immediate,
            width,
        }),
        _ => Err(unexpected_opcodes(desc)),
    }
}

impl GeneralSlots {
    fn opcode_for(&self, mode: AddressMode) -> Option<Opcode> {
        match mode {
            AddressMode::Direct => self.direct,
            AddressMode::Extended => self.extended,
            AddressMode::Indexed { .. } => self.indexed,
        }
    }

    fn size(&self, mode: AddressMode) -> Option<u32> {
        self.opcode_for(mode)
            .map(|opcode| opcode_len(opcode) + mode.operand_len())
    }
}

impl InstructionOps for GeneralOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let slots = general_slots(desc)?;
        let (field, col) = field_of(req.operand, req.operand_col);
        let operand = parse_general(field, req.origin.line, col, ctx.cpu, slots.immediate.is_some())?;
        let size = match &operand {
            ParsedOperand::Immediate(_) => slots
                .immediate
                .map(|opcode| opcode_len(opcode) + slots.width.bytes()),
            other => widest_mode(other).and_then(|mode| slots.size(mode)),
        };
        let Some(size) = size else {
            return Err(syntax("Addressing mode not supported", Some(desc.mnemonic), col));
        };
        Ok(ParseOutcome::Line(Parsed::new(operand, size)))
    }

    fn resolve(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Option<Sizing>, AsmError> {
        if !mode_is_variable(&line.operand) {
            return Ok(None);
        }
        let slots = general_slots(desc)?;
        let prefix = slots.indexed.map_or(1, opcode_len);
        let Some(mode) = choose_mode(&line.operand, ctx, line, prefix)? else {
            return Ok(None);
        };
        Ok(slots.size(mode).map(Sizing::Relaxed))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let slots = general_slots(desc)?;
        let mut em = Emission::default();
        if let ParsedOperand::Immediate(expr) = &line.operand {
            let opcode = slots.immediate.ok_or_else(|| unexpected_operand(desc))?;
            push_opcode(&mut em.bytes, opcode);
            let value = ctx.eval(expr)?;
            push_field(&mut em, &value, slots.width.bytes(), expr.span().col_start)?;
            return Ok(em);
        }
        let opcode_bytes = slots
            .extended
            .or(slots.indexed)
            .or(slots.direct)
            .map_or(1, opcode_len);
        let operand_len = line.size.saturating_sub(opcode_bytes);
        let mode = AddressMode::from_len(&line.operand, operand_len)
            .ok_or_else(|| unexpected_operand(desc))?;
        let opcode = slots.opcode_for(mode).ok_or_else(|| unexpected_operand(desc))?;
        push_opcode(&mut em.bytes, opcode);
        encode_address(&line.operand, mode, ctx, line, &mut em)?;
        Ok(em)
    }
}

/// Immediate-only operations (`andcc`, `orcc`, `cwai`, `ldmd`, `bitmd`).
pub struct ImmediateOps;

impl InstructionOps for ImmediateOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let OpcodeSet::Immediate { opcode, width } = desc.opcodes else {
            return Err(unexpected_opcodes(desc));
        };
        let (field, col) = field_of(req.operand, req.operand_col);
        let Some(rest) = field.strip_prefix('#') else {
            return Err(syntax("Expected immediate operand", Some(desc.mnemonic), col));
        };
        let expr = super::operand::expr_at(rest, req.origin.line, col + 1)?;
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::Immediate(expr),
            opcode_len(opcode) + width.bytes(),
        )))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let (OpcodeSet::Immediate { opcode, width }, ParsedOperand::Immediate(expr)) =
            (desc.opcodes, &line.operand)
        else {
            return Err(unexpected_operand(desc));
        };
        let mut em = Emission::default();
        push_opcode(&mut em.bytes, opcode);
        let value = ctx.eval(expr)?;
        push_field(&mut em, &value, width.bytes(), expr.span().col_start)?;
        Ok(em)
    }
}

/// `leax`/`leay`/`leas`/`leau`: indexed operands only.
pub struct IndexedOnlyOps;

impl InstructionOps for IndexedOnlyOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let OpcodeSet::Indexed(opcode) = desc.opcodes else {
            return Err(unexpected_opcodes(desc));
        };
        let (field, col) = field_of(req.operand, req.operand_col);
        if field.is_empty() {
            return Err(syntax("Missing operand", Some(desc.mnemonic), col));
        }
        if field.starts_with('#') || !(field.starts_with('[') || field.contains(',')) {
            return Err(syntax(
                "Indexed operand required",
                Some(desc.mnemonic),
                col,
            ));
        }
        let op = parse_indexed(field, req.origin.line, col, ctx.cpu)?;
        let size = opcode_len(opcode) + 1 + max_extra(&op);
        Ok(ParseOutcome::Line(Parsed::new(ParsedOperand::Indexed(op), size)))
    }

    fn resolve(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Option<Sizing>, AsmError> {
        let (OpcodeSet::Indexed(opcode), ParsedOperand::Indexed(op)) =
            (desc.opcodes, &line.operand)
        else {
            return Err(unexpected_operand(desc));
        };
        if !is_variable(op) {
            return Ok(None);
        }
        let prefix = opcode_len(opcode);
        let extra = required_extra(op, ctx, &line.here(), prefix, line.size)?;
        Ok(Some(Sizing::Relaxed(prefix + 1 + extra)))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let (OpcodeSet::Indexed(opcode), ParsedOperand::Indexed(op)) =
            (desc.opcodes, &line.operand)
        else {
            return Err(unexpected_operand(desc));
        };
        let mut em = Emission::default();
        push_opcode(&mut em.bytes, opcode);
        let extra = line.size.saturating_sub(opcode_len(opcode) + 1);
        encode_indexed(op, extra, ctx, &line.here(), &mut em)?;
        Ok(em)
    }
}

/// `tfr`/`exg` and the 6309 register-to-register arithmetic.
pub struct RegisterPairOps;

impl InstructionOps for RegisterPairOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let OpcodeSet::Register(opcode) = desc.opcodes else {
            return Err(unexpected_opcodes(desc));
        };
        let (field, col) = field_of(req.operand, req.operand_col);
        let postbyte = parse_register_pair(field, col, ctx.cpu, desc.mnemonic)?;
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::RegisterPair(postbyte),
            opcode_len(opcode) + 1,
        )))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        _ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let (OpcodeSet::Register(opcode), ParsedOperand::RegisterPair(postbyte)) =
            (desc.opcodes, &line.operand)
        else {
            return Err(unexpected_operand(desc));
        };
        let mut bytes = Vec::new();
        push_opcode(&mut bytes, opcode);
        bytes.push(*postbyte);
        Ok(Emission::bytes(bytes))
    }
}

/// `pshs`/`puls`/`pshu`/`pulu`.
pub struct RegisterListOps;

impl InstructionOps for RegisterListOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let OpcodeSet::RegisterList { opcode, stack } = desc.opcodes else {
            return Err(unexpected_opcodes(desc));
        };
        let (field, col) = field_of(req.operand, req.operand_col);
        let operand = parse_register_list(field, req.origin.line, col, stack, desc.mnemonic)?;
        Ok(ParseOutcome::Line(Parsed::new(operand, opcode_len(opcode) + 1)))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let OpcodeSet::RegisterList { opcode, .. } = desc.opcodes else {
            return Err(unexpected_opcodes(desc));
        };
        let mut em = Emission::default();
        push_opcode(&mut em.bytes, opcode);
        match &line.operand {
            ParsedOperand::RegisterList(mask) => em.bytes.push(*mask),
            ParsedOperand::Immediate(expr) => {
                let mask = ctx.eval_absolute(expr, desc.mnemonic)?;
                push_field(&mut em, &Value::Absolute(mask), 1, expr.span().col_start)?;
            }
            _ => return Err(unexpected_operand(desc)),
        }
        Ok(em)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_requires_a_shared_base() {
        let sec = |name: &str, offset| Value::Relocatable {
            base: RelocBase::Section(name.to_string()),
            offset,
        };
        assert_eq!(distance_from(&Value::Absolute(10), &Value::Absolute(4)), Some(6));
        assert_eq!(distance_from(&sec("code", 2), &sec("code", 8)), Some(-6));
        assert_eq!(distance_from(&sec("code", 2), &sec("data", 8)), None);
        assert_eq!(distance_from(&Value::Absolute(2), &sec("code", 8)), None);
    }

    #[test]
    fn fields_record_relocations_for_relocatable_values() {
        let mut em = Emission::bytes(vec![0xBD]);
        let ext = Value::Relocatable {
            base: RelocBase::External("putc".to_string()),
            offset: 3,
        };
        push_field(&mut em, &ext, 2, 1).unwrap();
        assert_eq!(em.bytes, vec![0xBD, 0x00, 0x03]);
        assert_eq!(
            em.relocations,
            vec![Relocation {
                offset: 1,
                target: RelocTarget::Symbol("putc".to_string()),
                addend: 3,
                kind: RelocKind::Abs16,
            }]
        );
        assert!(push_field(&mut em, &ext, 4, 1).is_err());
    }

    #[test]
    fn fields_check_ranges() {
        let mut em = Emission::default();
        push_field(&mut em, &Value::Absolute(-1), 1, 1).unwrap();
        push_field(&mut em, &Value::Absolute(0x1234), 2, 1).unwrap();
        push_field(&mut em, &Value::Absolute(0x12345678), 4, 1).unwrap();
        assert_eq!(em.bytes, vec![0xFF, 0x12, 0x34, 0x12, 0x34, 0x56, 0x78]);
        let err = push_field(&mut em, &Value::Absolute(0x100), 1, 1).unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Range);
    }

    #[test]
    fn unknown_pc_distance_becomes_a_relocation() {
        let mut em = Emission::bytes(vec![0x17]);
        let target = Value::Relocatable {
            base: RelocBase::External("far".to_string()),
            offset: 0,
        };
        push_pc_relative(&mut em, &target, None);
        assert_eq!(em.bytes, vec![0x17, 0xFF, 0xFE]);
        assert_eq!(em.relocations[0].kind, RelocKind::PcRel16);
        assert_eq!(em.relocations[0].offset, 1);
        assert_eq!(em.relocations[0].addend, -2);
    }
}
