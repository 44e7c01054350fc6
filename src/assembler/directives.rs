// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Pseudo-operation table.
//!
//! Directives are ordinary registry descriptors with an empty opcode set.
//! Each family of directives shares one operation object; the variant
//! (data width, conditional test, text termination) lives in the object.

use crate::core::assembler::context::AsmContext;
use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::parser::{parse_expr, Expr};
use crate::core::registry::{
    InsnFlags, InstructionDescriptor, InstructionModule, OpcodeSet, ParseRequest,
};
use crate::core::symbol_table::{SymbolKind, SymbolTableResult};
use crate::core::text_utils::{is_valid_symbol, operand_field, split_operands};

use super::directives_data::{DataOps, FillOps, ReserveOps, TextMode, TextOps};
use super::directives_layout::{
    AlignOps, EndOps, EndSectionOps, OrgOps, ReorgOps, SectionOps, SetDpOps,
};
use super::directives_symbols::{
    CondTest, ConditionalOps, EndMacroOps, EndStructOps, EquOps, ExportOps, ExternOps, MacroOps,
    MessageOps, SetOps, StructInstanceOps, StructOps,
};

pub const MODULE_ID: &str = "directives";

macro_rules! directive {
    ($mnemonic:literal, $ops:expr $(, $flags:expr)?) => {
        InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: OpcodeSet::None,
            ops: &$ops,
            flags: InsnFlags::empty() $(.union($flags))?,
        }
    };
}

const DEFINES: InsnFlags = InsnFlags::DEFINES_SYMBOL;
const CONDITIONAL: InsnFlags = InsnFlags::CONDITIONAL;
const RESERVES: InsnFlags = InsnFlags::RESERVES_DATA;

pub static DIRECTIVE_TABLE: &[InstructionDescriptor] = &[
    // layout
    directive!("org", OrgOps),
    directive!("reorg", ReorgOps),
    directive!("setdp", SetDpOps),
    directive!("section", SectionOps),
    directive!("sect", SectionOps),
    directive!("endsection", EndSectionOps),
    directive!("endsect", EndSectionOps),
    directive!("align", AlignOps),
    directive!("end", EndOps),
    // symbols
    directive!("equ", EquOps, DEFINES),
    directive!("set", SetOps, DEFINES),
    directive!("extern", ExternOps),
    directive!("external", ExternOps),
    directive!("import", ExternOps),
    directive!("export", ExportOps),
    directive!("global", ExportOps),
    // data
    directive!("fcb", DataOps { width: 1 }),
    directive!(".db", DataOps { width: 1 }),
    directive!("fdb", DataOps { width: 2 }),
    directive!(".dw", DataOps { width: 2 }),
    directive!("fqb", DataOps { width: 4 }),
    directive!("fcc", TextOps { mode: TextMode::Plain }),
    directive!("fcs", TextOps { mode: TextMode::HighBitLast }),
    directive!("fcn", TextOps { mode: TextMode::NulTerminated }),
    directive!("rmb", ReserveOps { width: 1, zero: false }, RESERVES),
    directive!("rmd", ReserveOps { width: 2, zero: false }, RESERVES),
    directive!("rmq", ReserveOps { width: 4, zero: false }, RESERVES),
    directive!("zmb", ReserveOps { width: 1, zero: true }),
    directive!("zmd", ReserveOps { width: 2, zero: true }),
    directive!("fill", FillOps),
    // structs
    directive!("struct", StructOps, InsnFlags::STRUCT_OPEN.union(DEFINES)),
    directive!("endstruct", EndStructOps, InsnFlags::STRUCT_CLOSE),
    directive!("ends", EndStructOps, InsnFlags::STRUCT_CLOSE),
    // macros
    directive!("macro", MacroOps, InsnFlags::MACRO_START.union(DEFINES)),
    directive!("endm", EndMacroOps, InsnFlags::MACRO_END),
    // conditionals
    directive!("if", ConditionalOps { test: CondTest::NonZero }, CONDITIONAL),
    directive!("ifne", ConditionalOps { test: CondTest::NonZero }, CONDITIONAL),
    directive!("ifeq", ConditionalOps { test: CondTest::Zero }, CONDITIONAL),
    directive!("ifgt", ConditionalOps { test: CondTest::Positive }, CONDITIONAL),
    directive!("ifge", ConditionalOps { test: CondTest::NonNegative }, CONDITIONAL),
    directive!("iflt", ConditionalOps { test: CondTest::Negative }, CONDITIONAL),
    directive!("ifle", ConditionalOps { test: CondTest::NonPositive }, CONDITIONAL),
    directive!("ifdef", ConditionalOps { test: CondTest::Defined }, CONDITIONAL),
    directive!("ifndef", ConditionalOps { test: CondTest::NotDefined }, CONDITIONAL),
    directive!("else", ConditionalOps { test: CondTest::Else }, CONDITIONAL),
    directive!("endc", ConditionalOps { test: CondTest::End }, CONDITIONAL),
    directive!("endif", ConditionalOps { test: CondTest::End }, CONDITIONAL),
    // messages
    directive!("error", MessageOps { warning: false }),
    directive!("warning", MessageOps { warning: true }),
];

/// Descriptor used for lines whose mnemonic names a defined struct.
/// It is not registered under any mnemonic.
pub static STRUCT_INSTANCE: InstructionDescriptor = directive!("struct instance", StructInstanceOps);

pub struct DirectiveModule;

impl InstructionModule for DirectiveModule {
    fn module_id(&self) -> &'static str {
        MODULE_ID
    }

    fn descriptors(&self) -> &'static [InstructionDescriptor] {
        DIRECTIVE_TABLE
    }
}

pub(crate) fn directive_error(msg: &str, param: Option<&str>, col: usize) -> AsmError {
    AsmError::new(AsmErrorKind::Directive, msg, param).with_column(Some(col + 1))
}

pub(crate) fn operand_mismatch(desc: &InstructionDescriptor) -> AsmError {
    AsmError::new(
        AsmErrorKind::Internal,
        "Operand does not match directive",
        Some(desc.mnemonic),
    )
}

/// The label a symbol-defining directive names.
pub(crate) fn require_label<'a>(
    desc: &InstructionDescriptor,
    req: &ParseRequest<'a>,
) -> Result<&'a str, AsmError> {
    match req.label {
        Some(label) if is_valid_symbol(label) => Ok(label),
        Some(label) => Err(AsmError::new(AsmErrorKind::Syntax, "Invalid symbol name", Some(label))
            .with_column(Some(1))),
        None => Err(AsmError::new(
            AsmErrorKind::Directive,
            "Directive requires a label",
            Some(desc.mnemonic),
        )
        .with_column(Some(1))),
    }
}

/// Operand items split at top-level commas, trimmed, with zero-based columns.
pub(crate) fn operand_items<'a>(req: &ParseRequest<'a>) -> Vec<(&'a str, usize)> {
    let field = operand_field(req.operand);
    if field.is_empty() {
        return Vec::new();
    }
    split_operands(field)
        .into_iter()
        .map(|(part, offset)| {
            let trimmed = part.trim_start();
            (
                trimmed.trim_end(),
                req.operand_col + offset + (part.len() - trimmed.len()),
            )
        })
        .collect()
}

pub(crate) fn item_expr(text: &str, line: u32, col: usize) -> Result<Expr, AsmError> {
    if text.is_empty() {
        return Err(directive_error("Expected expression", None, col));
    }
    Ok(parse_expr(text, line, col)?)
}

/// Exactly one expression operand.
pub(crate) fn single_expr(
    desc: &InstructionDescriptor,
    req: &ParseRequest<'_>,
) -> Result<Expr, AsmError> {
    match operand_items(req).as_slice() {
        [(text, col)] => item_expr(text, req.origin.line, *col),
        [] => Err(directive_error(
            "Missing operand",
            Some(desc.mnemonic),
            req.operand_col,
        )),
        [_, (_, col), ..] => Err(directive_error(
            "Too many operands",
            Some(desc.mnemonic),
            *col,
        )),
    }
}

/// Comma-separated symbol names.
pub(crate) fn symbol_list(
    desc: &InstructionDescriptor,
    req: &ParseRequest<'_>,
) -> Result<Vec<String>, AsmError> {
    let items = operand_items(req);
    if items.is_empty() {
        return Err(directive_error(
            "Missing symbol list",
            Some(desc.mnemonic),
            req.operand_col,
        ));
    }
    items
        .into_iter()
        .map(|(name, col)| {
            if is_valid_symbol(name) {
                Ok(name.to_string())
            } else {
                Err(AsmError::new(AsmErrorKind::Syntax, "Invalid symbol name", Some(name))
                    .with_column(Some(col + 1)))
            }
        })
        .collect()
}

pub(crate) fn declare(ctx: &mut AsmContext, name: &str, kind: SymbolKind) -> Result<(), AsmError> {
    match ctx.symbols.declare(name, kind) {
        SymbolTableResult::Ok => Ok(()),
        SymbolTableResult::Duplicate | SymbolTableResult::NotFound => Err(AsmError::new(
            AsmErrorKind::Redefinition,
            "Symbol is already defined",
            Some(name),
        )),
    }
}
