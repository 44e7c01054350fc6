// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand syntax shared by the Motorola 6800 lineage (6809 and HD6309).
//!
//! Parsing turns raw operand text into a [`ParsedOperand`]. Nothing here
//! evaluates expressions: values are looked up by the resolve and emit
//! hooks, once the symbol table has had a chance to settle.

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::cpu::CpuVariant;
use crate::core::operand::{
    AddressForce, IndexBase, IndexedForm, IndexedOperand, OffsetForce, ParsedOperand, WForm,
};
use crate::core::parser::{parse_expr, Expr};
use crate::core::registry::StackRegister;
use crate::core::text_utils::{operand_field, split_operands};
use crate::core::tokenizer::Span;

/// The operand field of a request, trimmed of its comment, and its column.
pub fn field_of(operand: &str, operand_col: usize) -> (&str, usize) {
    (operand_field(operand), operand_col)
}

pub fn syntax(msg: &str, param: Option<&str>, col: usize) -> AsmError {
    AsmError::new(AsmErrorKind::Syntax, msg, param).with_column(Some(col + 1))
}

pub fn cpu_mode(msg: &str, param: Option<&str>, col: usize) -> AsmError {
    AsmError::new(AsmErrorKind::CpuMode, msg, param).with_column(Some(col + 1))
}

/// Parse an expression that starts at zero-based column `col`.
pub fn expr_at(text: &str, line: u32, col: usize) -> Result<Expr, AsmError> {
    let trimmed = text.trim_start();
    let col = col + (text.len() - trimmed.len());
    if trimmed.trim_end().is_empty() {
        return Err(syntax("Expected expression", None, col));
    }
    Ok(parse_expr(trimmed.trim_end(), line, col)?)
}

/// Split a comma-separated operand field into trimmed parts with columns.
pub fn operand_parts(field: &str, col: usize) -> Vec<(&str, usize)> {
    split_operands(field)
        .into_iter()
        .map(|(part, offset)| {
            let trimmed = part.trim_start();
            (trimmed.trim_end(), col + offset + (part.len() - trimmed.len()))
        })
        .collect()
}

/// Parse a memory operand: `#imm`, `<dp`, `>ext`, `addr` or any indexed form.
pub fn parse_general(
    field: &str,
    line: u32,
    col: usize,
    cpu: CpuVariant,
    allow_immediate: bool,
) -> Result<ParsedOperand, AsmError> {
    if field.is_empty() {
        return Err(syntax("Missing operand", None, col));
    }
    if let Some(rest) = field.strip_prefix('#') {
        if !allow_immediate {
            return Err(syntax("Immediate mode not allowed", Some(field), col));
        }
        return Ok(ParsedOperand::Immediate(expr_at(rest, line, col + 1)?));
    }
    if field.starts_with('[') || split_operands(field).len() > 1 {
        return Ok(ParsedOperand::Indexed(parse_indexed(field, line, col, cpu)?));
    }
    parse_memory(field, line, col)
}

/// Parse a direct or extended address with an optional `<`/`>` prefix.
pub fn parse_memory(field: &str, line: u32, col: usize) -> Result<ParsedOperand, AsmError> {
    let (force, text, skip) = if field.starts_with("<<") {
        return Err(syntax(
            "5-bit offset requires an index register",
            Some(field),
            col,
        ));
    } else if let Some(rest) = field.strip_prefix('<') {
        (AddressForce::Direct, rest, 1)
    } else if let Some(rest) = field.strip_prefix('>') {
        (AddressForce::Extended, rest, 1)
    } else {
        (AddressForce::Auto, field, 0)
    };
    Ok(ParsedOperand::Memory {
        expr: expr_at(text, line, col + skip)?,
        force,
    })
}

/// Parse every indexed form: `,R`, `n,R`, `acc,R`, `,R+`, `,--R`, `n,PCR`,
/// `[...]` and the 6309 W forms.
pub fn parse_indexed(
    field: &str,
    line: u32,
    col: usize,
    cpu: CpuVariant,
) -> Result<IndexedOperand, AsmError> {
    let (indirect, inner, inner_col) = if let Some(rest) = field.strip_prefix('[') {
        let Some(inner) = rest.strip_suffix(']') else {
            return Err(syntax("Missing ']' in indirect operand", Some(field), col));
        };
        (true, inner, col + 1)
    } else {
        (false, field, col)
    };

    let parts = operand_parts(inner, inner_col);
    let form = match parts.as_slice() {
        [(address, addr_col)] if indirect => {
            let text = address.strip_prefix('>').unwrap_or(address);
            let skip = address.len() - text.len();
            IndexedForm::Extended(expr_at(text, line, addr_col + skip)?)
        }
        [_] => return Err(syntax("Expected index register", Some(field), col)),
        [(offset, offset_col), (register, reg_col)] => {
            parse_indexed_pair(offset, *offset_col, register, *reg_col, indirect, line, cpu)?
        }
        _ => return Err(syntax("Too many operands for indexed mode", Some(field), col)),
    };
    Ok(IndexedOperand { indirect, form })
}

fn parse_indexed_pair(
    offset: &str,
    offset_col: usize,
    register: &str,
    reg_col: usize,
    indirect: bool,
    line: u32,
    cpu: CpuVariant,
) -> Result<IndexedForm, AsmError> {
    let (pre_dec, name) = if let Some(rest) = register.strip_prefix("--") {
        (2, rest)
    } else if let Some(rest) = register.strip_prefix('-') {
        (1, rest)
    } else {
        (0, register)
    };
    let (post_inc, name) = if let Some(rest) = name.strip_suffix("++") {
        (2, rest)
    } else if let Some(rest) = name.strip_suffix('+') {
        (1, rest)
    } else {
        (0, name)
    };
    if pre_dec > 0 && post_inc > 0 {
        return Err(syntax("Invalid index register", Some(register), reg_col));
    }
    let step = pre_dec.max(post_inc);
    if step > 0 && !offset.is_empty() {
        return Err(syntax(
            "Auto increment/decrement takes no offset",
            Some(register),
            offset_col,
        ));
    }
    if step == 1 && indirect {
        return Err(syntax(
            "Indirect mode requires double increment/decrement",
            Some(register),
            reg_col,
        ));
    }

    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "W" => {
            if !cpu.is_6309() {
                return Err(cpu_mode("W-based indexing requires the 6309", None, reg_col));
            }
            return match (pre_dec, post_inc) {
                (2, _) => Ok(IndexedForm::W(WForm::Decrement)),
                (_, 2) => Ok(IndexedForm::W(WForm::Increment)),
                (0, 0) if offset.is_empty() => Ok(IndexedForm::W(WForm::Zero)),
                (0, 0) => Ok(IndexedForm::W(WForm::Offset(expr_at(
                    offset.strip_prefix('>').unwrap_or(offset),
                    line,
                    offset_col + usize::from(offset.starts_with('>')),
                )?))),
                _ => Err(syntax(
                    "W indexing only supports double increment/decrement",
                    Some(register),
                    reg_col,
                )),
            };
        }
        "PC" | "PCR" => {
            if step > 0 {
                return Err(syntax("Invalid index register", Some(register), reg_col));
            }
            let (force, text, skip) = offset_force(offset);
            if force == OffsetForce::Bits5 {
                return Err(syntax(
                    "5-bit offset not allowed with PC",
                    Some(offset),
                    offset_col,
                ));
            }
            let offset = if text.is_empty() {
                Expr::Number("0".to_string(), Span::new(line, reg_col, reg_col))
            } else {
                expr_at(text, line, offset_col + skip)?
            };
            return Ok(IndexedForm::ProgramCounter {
                offset,
                force,
                relative: upper == "PCR",
            });
        }
        _ => {}
    }

    let Some(base) = IndexBase::from_name(name) else {
        return Err(syntax("Invalid index register", Some(register), reg_col));
    };
    if pre_dec > 0 {
        return Ok(IndexedForm::AutoDecrement {
            base,
            double: pre_dec == 2,
        });
    }
    if post_inc > 0 {
        return Ok(IndexedForm::AutoIncrement {
            base,
            double: post_inc == 2,
        });
    }
    if offset.is_empty() {
        return Ok(IndexedForm::ZeroOffset { base });
    }
    if let Some(postbyte) = accumulator_offset(offset, offset_col, cpu)? {
        return Ok(IndexedForm::Accumulator { base, postbyte });
    }
    let (force, text, skip) = offset_force(offset);
    if force == OffsetForce::Bits5 && indirect {
        return Err(syntax(
            "5-bit offset not allowed with indirection",
            Some(offset),
            offset_col,
        ));
    }
    Ok(IndexedForm::Offset {
        base,
        offset: expr_at(text, line, offset_col + skip)?,
        force,
    })
}

fn offset_force(offset: &str) -> (OffsetForce, &str, usize) {
    if let Some(rest) = offset.strip_prefix("<<") {
        (OffsetForce::Bits5, rest, 2)
    } else if let Some(rest) = offset.strip_prefix('<') {
        (OffsetForce::Bits8, rest, 1)
    } else if let Some(rest) = offset.strip_prefix('>') {
        (OffsetForce::Bits16, rest, 1)
    } else {
        (OffsetForce::Auto, offset, 0)
    }
}

/// Postbyte for an accumulator offset (`A,X`), or `None` if `name` is not one.
fn accumulator_offset(name: &str, col: usize, cpu: CpuVariant) -> Result<Option<u8>, AsmError> {
    let postbyte = match name.to_ascii_uppercase().as_str() {
        "A" => 0x86,
        "B" => 0x85,
        "D" => 0x8B,
        "E" => 0x87,
        "F" => 0x8A,
        "W" => 0x8E,
        _ => return Ok(None),
    };
    if matches!(postbyte, 0x87 | 0x8A | 0x8E) && !cpu.is_6309() {
        return Err(cpu_mode(
            "Accumulator offset requires the 6309",
            Some(name),
            col,
        ));
    }
    Ok(Some(postbyte))
}

/// Register operand width used by `tfr`/`exg` and the 6309 register ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWidth {
    Bits8,
    Bits16,
    /// The 6309 zero register, compatible with either width.
    Any,
}

/// Inter-register code: (code, width, 6309 only).
pub fn transfer_register(name: &str) -> Option<(u8, RegisterWidth, bool)> {
    let entry = match name.to_ascii_uppercase().as_str() {
        "D" => (0x0, RegisterWidth::Bits16, false),
        "X" => (0x1, RegisterWidth::Bits16, false),
        "Y" => (0x2, RegisterWidth::Bits16, false),
        "U" => (0x3, RegisterWidth::Bits16, false),
        "S" => (0x4, RegisterWidth::Bits16, false),
        "PC" => (0x5, RegisterWidth::Bits16, false),
        "W" => (0x6, RegisterWidth::Bits16, true),
        "V" => (0x7, RegisterWidth::Bits16, true),
        "A" => (0x8, RegisterWidth::Bits8, false),
        "B" => (0x9, RegisterWidth::Bits8, false),
        "CC" => (0xA, RegisterWidth::Bits8, false),
        "DP" => (0xB, RegisterWidth::Bits8, false),
        "0" | "00" => (0xC, RegisterWidth::Any, true),
        "E" => (0xE, RegisterWidth::Bits8, true),
        "F" => (0xF, RegisterWidth::Bits8, true),
        _ => return None,
    };
    Some(entry)
}

/// Parse `r1,r2` into the transfer postbyte `r1 << 4 | r2`.
pub fn parse_register_pair(
    field: &str,
    col: usize,
    cpu: CpuVariant,
    mnemonic: &str,
) -> Result<u8, AsmError> {
    let parts = operand_parts(field, col);
    let [(src, src_col), (dst, dst_col)] = parts.as_slice() else {
        return Err(syntax(
            "Expected two registers",
            Some(mnemonic),
            col,
        ));
    };
    let (src_code, src_width) = register_for_pair(src, *src_col, cpu, mnemonic)?;
    let (dst_code, dst_width) = register_for_pair(dst, *dst_col, cpu, mnemonic)?;
    let compatible = src_width == dst_width
        || src_width == RegisterWidth::Any
        || dst_width == RegisterWidth::Any;
    if !compatible && !cpu.is_6309() {
        return Err(syntax(
            "Register size mismatch",
            Some(&format!("{src},{dst}")),
            *src_col,
        ));
    }
    Ok((src_code << 4) | dst_code)
}

fn register_for_pair(
    name: &str,
    col: usize,
    cpu: CpuVariant,
    mnemonic: &str,
) -> Result<(u8, RegisterWidth), AsmError> {
    let Some((code, width, needs_6309)) = transfer_register(name) else {
        return Err(syntax(
            &format!("Invalid register for {mnemonic}"),
            Some(name),
            col,
        ));
    };
    if needs_6309 && !cpu.is_6309() {
        return Err(cpu_mode("Register requires the 6309", Some(name), col));
    }
    Ok((code, width))
}

/// Bit for `name` in a `psh`/`pul` postbyte. The other stack pointer shares
/// bit 6; the stack's own pointer cannot be pushed.
pub fn register_list_bit(name: &str, stack: StackRegister) -> Option<u8> {
    match name.to_ascii_uppercase().as_str() {
        "CC" => Some(0x01),
        "A" => Some(0x02),
        "B" => Some(0x04),
        "D" => Some(0x06),
        "DP" => Some(0x08),
        "X" => Some(0x10),
        "Y" => Some(0x20),
        "U" if stack == StackRegister::S => Some(0x40),
        "S" if stack == StackRegister::U => Some(0x40),
        "PC" => Some(0x80),
        _ => None,
    }
}

/// Parse a register list (`a,b,x` or `#$16`) into its postbyte.
pub fn parse_register_list(
    field: &str,
    line: u32,
    col: usize,
    stack: StackRegister,
    mnemonic: &str,
) -> Result<ParsedOperand, AsmError> {
    if field.is_empty() {
        return Err(syntax("Missing register list", Some(mnemonic), col));
    }
    if let Some(rest) = field.strip_prefix('#') {
        return Ok(ParsedOperand::Immediate(expr_at(rest, line, col + 1)?));
    }
    let mut mask = 0u8;
    for (name, name_col) in operand_parts(field, col) {
        let Some(bit) = register_list_bit(name, stack) else {
            return Err(syntax(
                &format!("invalid register {name} in {mnemonic} register list"),
                None,
                name_col,
            ));
        };
        mask |= bit;
    }
    Ok(ParsedOperand::RegisterList(mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed(text: &str, cpu: CpuVariant) -> Result<IndexedOperand, AsmError> {
        parse_indexed(text, 1, 0, cpu)
    }

    #[test]
    fn general_operand_prefixes() {
        let cpu = CpuVariant::M6809;
        assert!(matches!(
            parse_general("#$10", 1, 0, cpu, true),
            Ok(ParsedOperand::Immediate(_))
        ));
        assert!(parse_general("#$10", 1, 0, cpu, false).is_err());
        assert!(matches!(
            parse_general("<$10", 1, 0, cpu, true),
            Ok(ParsedOperand::Memory { force: AddressForce::Direct, .. })
        ));
        assert!(matches!(
            parse_general(">$10", 1, 0, cpu, true),
            Ok(ParsedOperand::Memory { force: AddressForce::Extended, .. })
        ));
        assert!(matches!(
            parse_general("2,x", 1, 0, cpu, true),
            Ok(ParsedOperand::Indexed(_))
        ));
    }

    #[test]
    fn indexed_forms_parse() {
        let cpu = CpuVariant::M6809;
        assert_eq!(
            indexed(",y", cpu).unwrap().form,
            IndexedForm::ZeroOffset { base: IndexBase::Y }
        );
        assert_eq!(
            indexed(",u++", cpu).unwrap().form,
            IndexedForm::AutoIncrement { base: IndexBase::U, double: true }
        );
        assert_eq!(
            indexed("[,--s]", cpu).unwrap(),
            IndexedOperand {
                indirect: true,
                form: IndexedForm::AutoDecrement { base: IndexBase::S, double: true },
            }
        );
        assert_eq!(
            indexed("b,x", cpu).unwrap().form,
            IndexedForm::Accumulator { base: IndexBase::X, postbyte: 0x85 }
        );
        assert!(matches!(
            indexed("table,pcr", cpu).unwrap().form,
            IndexedForm::ProgramCounter { relative: true, .. }
        ));
        assert!(matches!(
            indexed("[$1234]", cpu).unwrap().form,
            IndexedForm::Extended(_)
        ));
        assert!(matches!(
            indexed("<<3,x", cpu).unwrap().form,
            IndexedForm::Offset { force: OffsetForce::Bits5, .. }
        ));
    }

    #[test]
    fn indexed_errors() {
        let cpu = CpuVariant::M6809;
        assert!(indexed("[,x+]", cpu).is_err());
        assert!(indexed("1,x+", cpu).is_err());
        assert!(indexed("[<<1,x]", cpu).is_err());
        assert!(indexed("1,q", cpu).is_err());
        assert!(indexed("[,x", cpu).is_err());
        assert!(indexed("1,x,y", cpu).is_err());
    }

    #[test]
    fn hd6309_index_forms_are_gated() {
        let err = indexed(",w++", CpuVariant::M6809).unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::CpuMode);
        let err = indexed("e,x", CpuVariant::M6809).unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::CpuMode);
        assert_eq!(
            indexed(",w++", CpuVariant::HD6309).unwrap().form,
            IndexedForm::W(WForm::Increment)
        );
        assert_eq!(
            indexed("f,y", CpuVariant::HD6309).unwrap().form,
            IndexedForm::Accumulator { base: IndexBase::Y, postbyte: 0x8A }
        );
    }

    #[test]
    fn register_pairs_encode_and_check_widths() {
        assert_eq!(parse_register_pair("a,b", 0, CpuVariant::M6809, "tfr").unwrap(), 0x89);
        assert_eq!(parse_register_pair("x,y", 0, CpuVariant::M6809, "exg").unwrap(), 0x12);
        assert!(parse_register_pair("a,x", 0, CpuVariant::M6809, "tfr").is_err());
        assert_eq!(parse_register_pair("a,x", 0, CpuVariant::HD6309, "tfr").unwrap(), 0x81);
        let err = parse_register_pair("w,d", 0, CpuVariant::M6809, "tfr").unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::CpuMode);
        assert!(parse_register_pair("a", 0, CpuVariant::M6809, "tfr").is_err());
    }

    #[test]
    fn register_lists_depend_on_stack() {
        assert_eq!(
            parse_register_list("cc,a,b,dp,x,y,u,pc", 1, 0, StackRegister::S, "pshs").unwrap(),
            ParsedOperand::RegisterList(0xFF)
        );
        assert_eq!(
            parse_register_list("d,s", 1, 0, StackRegister::U, "pshu").unwrap(),
            ParsedOperand::RegisterList(0x46)
        );
        let err = parse_register_list("s", 1, 0, StackRegister::S, "pshs").unwrap_err();
        assert!(err.message().contains("invalid register s in pshs register list"));
    }
}
