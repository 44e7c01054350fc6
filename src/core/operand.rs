// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Parsed operand representations, one shape per addressing-mode family.

use crate::core::parser::Expr;

/// Index register named in an indexed operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBase {
    X,
    Y,
    U,
    S,
}

impl IndexBase {
    /// Register field of the indexed postbyte, already shifted into bits 6..5.
    pub fn bits(self) -> u8 {
        match self {
            IndexBase::X => 0x00,
            IndexBase::Y => 0x20,
            IndexBase::U => 0x40,
            IndexBase::S => 0x60,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "x" => Some(IndexBase::X),
            "y" => Some(IndexBase::Y),
            "u" => Some(IndexBase::U),
            "s" => Some(IndexBase::S),
            _ => None,
        }
    }
}

/// Offset width forced with `<<`, `<` or `>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetForce {
    #[default]
    Auto,
    Bits5,
    Bits8,
    Bits16,
}

/// Direct/extended selection forced with `<` or `>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressForce {
    #[default]
    Auto,
    Direct,
    Extended,
}

/// 6309 indexed forms based on the W register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WForm {
    Zero,
    Offset(Expr),
    Increment,
    Decrement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexedForm {
    ZeroOffset {
        base: IndexBase,
    },
    Offset {
        base: IndexBase,
        offset: Expr,
        force: OffsetForce,
    },
    /// `A,R`, `B,R`, `D,R` and the 6309 `E,R`, `F,R`, `W,R`.
    Accumulator {
        base: IndexBase,
        postbyte: u8,
    },
    AutoIncrement {
        base: IndexBase,
        double: bool,
    },
    AutoDecrement {
        base: IndexBase,
        double: bool,
    },
    /// `n,PC` (raw offset) or `target,PCR` (offset computed from the target).
    ProgramCounter {
        offset: Expr,
        force: OffsetForce,
        relative: bool,
    },
    /// `[address]`, only valid indirect.
    Extended(Expr),
    W(WForm),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedOperand {
    pub indirect: bool,
    pub form: IndexedForm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParsedOperand {
    #[default]
    None,
    Immediate(Expr),
    Memory {
        expr: Expr,
        force: AddressForce,
    },
    Indexed(IndexedOperand),
    Relative(Expr),
    /// `tfr`/`exg` style `r1,r2`, stored as the encoded postbyte.
    RegisterPair(u8),
    RegisterList(u8),
    /// 6309 `#imm,address` operands.
    MemoryImmediate {
        immediate: Expr,
        target: Box<ParsedOperand>,
    },
    BitTransfer {
        postbyte: u8,
        address: Expr,
    },
    BlockTransfer {
        opcode: u16,
        postbyte: u8,
    },
    Values(Vec<Expr>),
    Text(Vec<u8>),
    Count(Expr),
    Fill {
        value: Expr,
        count: Expr,
    },
    Align {
        boundary: Expr,
        fill: Option<Expr>,
    },
    Origin(Expr),
    /// `setdp` page number.
    DirectPage(Expr),
    Section(String),
    Assignment(Expr),
    Symbols(Vec<String>),
    StructInstance {
        name: String,
        size: u32,
        fields: Vec<StructField>,
    },
    Message(String),
    End(Option<Expr>),
}

impl ParsedOperand {
    /// Every expression held by the operand, in source order.
    pub fn expressions(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        self.collect_expressions(&mut out);
        out
    }

    fn collect_expressions<'a>(&'a self, out: &mut Vec<&'a Expr>) {
        match self {
            ParsedOperand::Immediate(expr)
            | ParsedOperand::Memory { expr, .. }
            | ParsedOperand::Relative(expr)
            | ParsedOperand::Count(expr)
            | ParsedOperand::Origin(expr)
            | ParsedOperand::DirectPage(expr)
            | ParsedOperand::Assignment(expr)
            | ParsedOperand::BitTransfer { address: expr, .. } => out.push(expr),
            ParsedOperand::Indexed(indexed) => match &indexed.form {
                IndexedForm::Offset { offset, .. }
                | IndexedForm::ProgramCounter { offset, .. }
                | IndexedForm::Extended(offset)
                | IndexedForm::W(WForm::Offset(offset)) => out.push(offset),
                _ => {}
            },
            ParsedOperand::MemoryImmediate { immediate, target } => {
                out.push(immediate);
                target.collect_expressions(out);
            }
            ParsedOperand::Values(values) => out.extend(values.iter()),
            ParsedOperand::Fill { value, count } => {
                out.push(value);
                out.push(count);
            }
            ParsedOperand::Align { boundary, fill } => {
                out.push(boundary);
                out.extend(fill.iter());
            }
            ParsedOperand::End(entry) => out.extend(entry.iter()),
            ParsedOperand::None
            | ParsedOperand::RegisterPair(_)
            | ParsedOperand::RegisterList(_)
            | ParsedOperand::BlockTransfer { .. }
            | ParsedOperand::Text(_)
            | ParsedOperand::Section(_)
            | ParsedOperand::Symbols(_)
            | ParsedOperand::StructInstance { .. }
            | ParsedOperand::Message(_) => {}
        }
    }

    /// Symbol names referenced by the operand.
    pub fn referenced_symbols(&self) -> Vec<String> {
        let mut names = Vec::new();
        for expr in self.expressions() {
            expr.visit_identifiers(&mut |name| names.push(name.to_string()));
        }
        names
    }
}
