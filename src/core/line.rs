// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Per-line instruction state shared by the parse, resolve and emit phases.

use std::fmt;

use crate::core::expr::{RelocBase, Value};
use crate::core::operand::ParsedOperand;
use crate::core::registry::InstructionDescriptor;
use crate::core::source_map::SourceOrigin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    Abs8,
    Abs16,
    /// 16-bit field patched with `S + A - P`, where `P` is the field address.
    PcRel16,
}

impl RelocKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelocKind::Abs8 => "abs8",
            RelocKind::Abs16 => "abs16",
            RelocKind::PcRel16 => "pcrel16",
        }
    }

    pub fn width(self) -> u32 {
        match self {
            RelocKind::Abs8 => 1,
            RelocKind::Abs16 | RelocKind::PcRel16 => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocTarget {
    Symbol(String),
    Section(String),
    /// Absolute address referenced from a relocatable section.
    Absolute,
}

impl From<&RelocBase> for RelocTarget {
    fn from(base: &RelocBase) -> Self {
        match base {
            RelocBase::Section(name) => RelocTarget::Section(name.clone()),
            RelocBase::External(name) => RelocTarget::Symbol(name.clone()),
        }
    }
}

/// A field the linker must patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Byte offset of the field within the line's emitted bytes.
    pub offset: u32,
    pub target: RelocTarget,
    pub addend: i64,
    pub kind: RelocKind,
}

impl fmt::Display for Relocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.target {
            RelocTarget::Symbol(name) => name.clone(),
            RelocTarget::Section(name) => format!("[{name}]"),
            RelocTarget::Absolute => "*ABS*".to_string(),
        };
        write!(
            f,
            "+{} {} {}{:+}",
            self.offset,
            self.kind.as_str(),
            target,
            self.addend
        )
    }
}

/// One source line after preprocessing.
#[derive(Debug, Clone)]
pub struct LineRecord {
    pub origin: SourceOrigin,
    pub text: String,
    pub label: Option<String>,
    pub descriptor: Option<&'static InstructionDescriptor>,
    pub operand_text: String,
    pub operand_col: usize,
    pub operand: ParsedOperand,
    /// Current length estimate in bytes.
    pub size: u32,
    /// Lower bound recorded when a line had to grow after shrinking.
    pub size_floor: u32,
    pub shrunk: bool,
    /// Start address, relative to `section` when one is set.
    pub address: u32,
    pub section: Option<String>,
    /// Direct page in effect when the line starts.
    pub dp: u8,
    pub bytes: Vec<u8>,
    pub reserved: u32,
    pub relocations: Vec<Relocation>,
}

impl LineRecord {
    pub fn new(origin: SourceOrigin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
            label: None,
            descriptor: None,
            operand_text: String::new(),
            operand_col: 0,
            operand: ParsedOperand::None,
            size: 0,
            size_floor: 0,
            shrunk: false,
            address: 0,
            section: None,
            dp: 0,
            bytes: Vec::new(),
            reserved: 0,
            relocations: Vec::new(),
        }
    }

    /// The line's address as a value: absolute, or relative to its section.
    pub fn here(&self) -> Value {
        match &self.section {
            Some(name) => Value::Relocatable {
                base: RelocBase::Section(name.clone()),
                offset: self.address as i64,
            },
            None => Value::Absolute(self.address as i64),
        }
    }

    /// Address of the byte after this line.
    pub fn next_address(&self) -> i64 {
        self.address as i64 + self.size as i64
    }

    pub fn mnemonic(&self) -> &str {
        self.descriptor.map_or("", |desc| desc.mnemonic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn here_is_section_relative_inside_sections() {
        let mut line = LineRecord::new(SourceOrigin::new(None, 1), " nop");
        line.address = 0x10;
        assert_eq!(line.here(), Value::Absolute(0x10));
        line.section = Some("code".to_string());
        assert_eq!(line.here().section(), Some("code"));
        line.size = 3;
        assert_eq!(line.next_address(), 0x13);
    }

    #[test]
    fn relocation_display_names_target() {
        let reloc = Relocation {
            offset: 1,
            target: RelocTarget::Symbol("putc".to_string()),
            addend: 0,
            kind: RelocKind::Abs16,
        };
        assert_eq!(reloc.to_string(), "+1 abs16 putc+0");
    }
}
