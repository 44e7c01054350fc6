// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! HD6309 operand families the 6809 does not have: memory-immediate
//! (`oim #m,addr`), register bit transfer (`band a,1,2,<$40`) and block
//! transfer (`tfm x+,y+`).

use crate::core::assembler::context::AsmContext;
use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::{display_value, value_fits_word, Value};
use crate::core::line::LineRecord;
use crate::core::operand::ParsedOperand;
use crate::core::registry::{
    push_opcode, Emission, InstructionDescriptor, InstructionOps, OpcodeSet, ParseOutcome,
    ParseRequest, Parsed, Sizing,
};
use crate::families::m6800::handler::{
    choose_mode, encode_address, mode_is_variable, push_field, widest_mode, AddressMode,
};
use crate::families::m6800::operand::{expr_at, field_of, operand_parts, parse_general, syntax};

fn opcode_mismatch(desc: &InstructionDescriptor) -> AsmError {
    AsmError::new(
        AsmErrorKind::Internal,
        "Opcode table does not match operation",
        Some(desc.mnemonic),
    )
}

/// Opcode byte plus the immediate mask.
const MEMORY_IMMEDIATE_PREFIX: u32 = 2;

pub struct MemoryImmediateOps;

impl MemoryImmediateOps {
    fn opcode_for(desc: &InstructionDescriptor, mode: AddressMode) -> Result<u16, AsmError> {
        match (desc.opcodes, mode) {
            (OpcodeSet::MemoryImmediate { direct, .. }, AddressMode::Direct) => Ok(direct),
            (OpcodeSet::MemoryImmediate { extended, .. }, AddressMode::Extended) => Ok(extended),
            (OpcodeSet::MemoryImmediate { indexed, .. }, AddressMode::Indexed { .. }) => {
                Ok(indexed)
            }
            _ => Err(opcode_mismatch(desc)),
        }
    }
}

impl InstructionOps for MemoryImmediateOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let (field, col) = field_of(req.operand, req.operand_col);
        let parts = operand_parts(field, col);
        let Some((first, first_col)) = parts.first().copied() else {
            return Err(syntax("Missing operand", Some(desc.mnemonic), col));
        };
        let Some(mask) = first.strip_prefix('#') else {
            return Err(syntax(
                "Expected immediate mask",
                Some(desc.mnemonic),
                first_col,
            ));
        };
        if parts.len() < 2 {
            return Err(syntax("Missing address", Some(desc.mnemonic), col));
        }
        let immediate = expr_at(mask, req.origin.line, first_col + 1)?;
        let address_col = parts[1].1;
        let address = field[address_col - col..].trim_end();
        let target = parse_general(address, req.origin.line, address_col, ctx.cpu, false)?;
        let Some(mode) = widest_mode(&target) else {
            return Err(syntax("Expected memory address", Some(address), address_col));
        };
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::MemoryImmediate {
                immediate,
                target: Box::new(target),
            },
            MEMORY_IMMEDIATE_PREFIX + mode.operand_len(),
        )))
    }

    fn resolve(
        &self,
        _desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Option<Sizing>, AsmError> {
        let ParsedOperand::MemoryImmediate { target, .. } = &line.operand else {
            return Ok(None);
        };
        if !mode_is_variable(target) {
            return Ok(None);
        }
        Ok(choose_mode(target, ctx, line, MEMORY_IMMEDIATE_PREFIX)?
            .map(|mode| Sizing::Relaxed(MEMORY_IMMEDIATE_PREFIX + mode.operand_len())))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let ParsedOperand::MemoryImmediate { immediate, target } = &line.operand else {
            return Err(opcode_mismatch(desc));
        };
        let mode = AddressMode::from_len(target, line.size.saturating_sub(MEMORY_IMMEDIATE_PREFIX))
            .ok_or_else(|| opcode_mismatch(desc))?;
        let mut em = Emission::default();
        push_opcode(&mut em.bytes, Self::opcode_for(desc, mode)?);
        let mask = ctx.eval(immediate)?;
        push_field(&mut em, &mask, 1, immediate.span().col_start)?;
        encode_address(target, mode, ctx, line, &mut em)?;
        Ok(em)
    }
}

fn bit_register(name: &str) -> Option<u8> {
    match name.to_ascii_uppercase().as_str() {
        "CC" => Some(0),
        "A" => Some(1),
        "B" => Some(2),
        _ => None,
    }
}

/// `band`, `biand`, `bor`, `bior`, `beor`, `bieor`, `ldbt` and `stbt`.
pub struct BitTransferOps;

impl InstructionOps for BitTransferOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let OpcodeSet::BitTransfer(_) = desc.opcodes else {
            return Err(opcode_mismatch(desc));
        };
        let (field, col) = field_of(req.operand, req.operand_col);
        let parts = operand_parts(field, col);
        let [(reg, reg_col), (src, src_col), (dst, dst_col), (addr, addr_col)] = parts.as_slice()
        else {
            return Err(syntax(
                "Expected register,source bit,destination bit,address",
                Some(desc.mnemonic),
                col,
            ));
        };
        let Some(reg_code) = bit_register(reg) else {
            return Err(syntax("Invalid bit register", Some(reg), *reg_col));
        };
        let line_num = req.origin.line;
        let bit = |text: &str, at: usize| -> Result<u8, AsmError> {
            let expr = expr_at(text, line_num, at)?;
            let value = ctx.eval_now(&expr, desc.mnemonic)?;
            if !(0..=7).contains(&value) {
                return Err(syntax("Bit number must be 0-7", Some(text), at));
            }
            Ok(value as u8)
        };
        let src_bit = bit(src, *src_col)?;
        let dst_bit = bit(dst, *dst_col)?;
        let address_text = addr.strip_prefix('<').unwrap_or(addr);
        let skip = addr.len() - address_text.len();
        let address = expr_at(address_text, line_num, addr_col + skip)?;
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::BitTransfer {
                postbyte: (reg_code << 6) | (src_bit << 3) | dst_bit,
                address,
            },
            4,
        )))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let (OpcodeSet::BitTransfer(opcode), ParsedOperand::BitTransfer { postbyte, address }) =
            (desc.opcodes, &line.operand)
        else {
            return Err(opcode_mismatch(desc));
        };
        let mut em = Emission::default();
        push_opcode(&mut em.bytes, opcode);
        em.bytes.push(*postbyte);
        let col = address.span().col_start;
        match ctx.eval(address)? {
            Value::Absolute(v) if value_fits_word(v) => em.bytes.push(v as u8),
            Value::Absolute(v) => {
                return Err(AsmError::new(
                    AsmErrorKind::Range,
                    &format!("Address {} out of range", display_value(v)),
                    None,
                )
                .with_column(Some(col)))
            }
            relocatable => push_field(&mut em, &relocatable, 1, col)?,
        }
        Ok(em)
    }
}

fn block_register(name: &str) -> Option<u8> {
    match name.to_ascii_uppercase().as_str() {
        "D" => Some(0),
        "X" => Some(1),
        "Y" => Some(2),
        "U" => Some(3),
        "S" => Some(4),
        _ => None,
    }
}

/// `tfm`: the opcode depends on which side increments or decrements.
pub struct BlockTransferOps;

impl InstructionOps for BlockTransferOps {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        _ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError> {
        let OpcodeSet::BlockTransfer(base) = desc.opcodes else {
            return Err(opcode_mismatch(desc));
        };
        let (field, col) = field_of(req.operand, req.operand_col);
        let parts = operand_parts(field, col);
        let [(src, src_col), (dst, dst_col)] = parts.as_slice() else {
            return Err(syntax("Expected two registers", Some(desc.mnemonic), col));
        };
        let split = |text: &str| -> (String, char) {
            match text.chars().last() {
                Some(c @ ('+' | '-')) => (text[..text.len() - 1].to_string(), c),
                _ => (text.to_string(), ' '),
            }
        };
        let (src_name, src_step) = split(src);
        let (dst_name, dst_step) = split(dst);
        let Some(src_code) = block_register(&src_name) else {
            return Err(syntax("Invalid tfm register", Some(src), *src_col));
        };
        let Some(dst_code) = block_register(&dst_name) else {
            return Err(syntax("Invalid tfm register", Some(dst), *dst_col));
        };
        let variant = match (src_step, dst_step) {
            ('+', '+') => 0,
            ('-', '-') => 1,
            ('+', ' ') => 2,
            (' ', '+') => 3,
            _ => {
                return Err(syntax(
                    "tfm supports r+,r+ r-,r- r+,r and r,r+",
                    Some(field),
                    col,
                ))
            }
        };
        Ok(ParseOutcome::Line(Parsed::new(
            ParsedOperand::BlockTransfer {
                opcode: base + variant,
                postbyte: (src_code << 4) | dst_code,
            },
            3,
        )))
    }

    fn emit(
        &self,
        desc: &InstructionDescriptor,
        line: &LineRecord,
        _ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        let ParsedOperand::BlockTransfer { opcode, postbyte } = &line.operand else {
            return Err(opcode_mismatch(desc));
        };
        let mut bytes = Vec::new();
        push_opcode(&mut bytes, *opcode);
        bytes.push(*postbyte);
        Ok(Emission::bytes(bytes))
    }
}
