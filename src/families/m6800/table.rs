// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! 6809 base instruction table and the descriptor-building macros shared by
//! the 6800-lineage tables.

use crate::core::registry::{InsnFlags, InstructionDescriptor};

macro_rules! inherent {
    ($mnemonic:literal, $opcode:expr $(, $flags:expr)?) => {
        $crate::core::registry::InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: $crate::core::registry::OpcodeSet::Inherent($opcode),
            ops: &$crate::families::m6800::handler::InherentOps,
            flags: $crate::core::registry::InsnFlags::empty() $(.union($flags))?,
        }
    };
}

macro_rules! sequence {
    ($mnemonic:literal, [$($byte:expr),+] $(, $flags:expr)?) => {
        $crate::core::registry::InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: $crate::core::registry::OpcodeSet::Sequence(&[$($byte),+]),
            ops: &$crate::families::m6800::handler::InherentOps,
            flags: $crate::core::registry::InsnFlags::empty() $(.union($flags))?,
        }
    };
}

/// Immediate, direct, indexed and extended slots.
macro_rules! general {
    ($mnemonic:literal, $width:ident, $imm:expr, $dir:expr, $idx:expr, $ext:expr $(, $flags:expr)?) => {
        $crate::core::registry::InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: $crate::core::registry::OpcodeSet::General {
                direct: Some($dir),
                indexed: Some($idx),
                extended: Some($ext),
                immediate: Some($imm),
                width: $crate::core::registry::OperandWidth::$width,
            },
            ops: &$crate::families::m6800::handler::GeneralOps,
            flags: $crate::core::registry::InsnFlags::empty() $(.union($flags))?,
        }
    };
}

/// Direct, indexed and extended slots only (stores and read-modify-write).
macro_rules! memory {
    ($mnemonic:literal, $dir:expr, $idx:expr, $ext:expr $(, $flags:expr)?) => {
        $crate::core::registry::InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: $crate::core::registry::OpcodeSet::General {
                direct: Some($dir),
                indexed: Some($idx),
                extended: Some($ext),
                immediate: None,
                width: $crate::core::registry::OperandWidth::Bits8,
            },
            ops: &$crate::families::m6800::handler::GeneralOps,
            flags: $crate::core::registry::InsnFlags::empty() $(.union($flags))?,
        }
    };
}

macro_rules! immediate {
    ($mnemonic:literal, $width:ident, $opcode:expr $(, $flags:expr)?) => {
        $crate::core::registry::InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: $crate::core::registry::OpcodeSet::Immediate {
                opcode: $opcode,
                width: $crate::core::registry::OperandWidth::$width,
            },
            ops: &$crate::families::m6800::handler::ImmediateOps,
            flags: $crate::core::registry::InsnFlags::empty() $(.union($flags))?,
        }
    };
}

macro_rules! register_pair {
    ($mnemonic:literal, $opcode:expr $(, $flags:expr)?) => {
        $crate::core::registry::InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: $crate::core::registry::OpcodeSet::Register($opcode),
            ops: &$crate::families::m6800::handler::RegisterPairOps,
            flags: $crate::core::registry::InsnFlags::empty() $(.union($flags))?,
        }
    };
}

macro_rules! register_list {
    ($mnemonic:literal, $opcode:expr, $stack:ident $(, $flags:expr)?) => {
        $crate::core::registry::InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: $crate::core::registry::OpcodeSet::RegisterList {
                opcode: $opcode,
                stack: $crate::core::registry::StackRegister::$stack,
            },
            ops: &$crate::families::m6800::handler::RegisterListOps,
            flags: $crate::core::registry::InsnFlags::empty() $(.union($flags))?,
        }
    };
}

macro_rules! branch {
    ($mnemonic:literal, $short:expr, $long:expr, $form:ident) => {
        $crate::core::registry::InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: $crate::core::registry::OpcodeSet::Relative {
                short: Some($short),
                long: $long,
                written: $crate::core::registry::BranchForm::$form,
            },
            ops: &$crate::families::m6800::relative::RelativeOps,
            flags: $crate::core::registry::InsnFlags::empty(),
        }
    };
}

pub(crate) use general;
pub(crate) use immediate;
pub(crate) use inherent;
pub(crate) use memory;
pub(crate) use register_list;
pub(crate) use register_pair;
pub(crate) use sequence;

macro_rules! lea {
    ($mnemonic:literal, $opcode:expr) => {
        InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: $crate::core::registry::OpcodeSet::Indexed($opcode),
            ops: &$crate::families::m6800::handler::IndexedOnlyOps,
            flags: InsnFlags::empty(),
        }
    };
}

pub static BASE_TABLE: &[InstructionDescriptor] = &[
    // Inherent
    inherent!("abx", 0x3A),
    inherent!("asla", 0x48),
    inherent!("aslb", 0x58),
    inherent!("asra", 0x47),
    inherent!("asrb", 0x57),
    inherent!("clra", 0x4F),
    inherent!("clrb", 0x5F),
    inherent!("coma", 0x43),
    inherent!("comb", 0x53),
    inherent!("daa", 0x19),
    inherent!("deca", 0x4A),
    inherent!("decb", 0x5A),
    inherent!("inca", 0x4C),
    inherent!("incb", 0x5C),
    inherent!("lsla", 0x48),
    inherent!("lslb", 0x58),
    inherent!("lsra", 0x44),
    inherent!("lsrb", 0x54),
    inherent!("mul", 0x3D),
    inherent!("nega", 0x40),
    inherent!("negb", 0x50),
    inherent!("nop", 0x12),
    inherent!("rola", 0x49),
    inherent!("rolb", 0x59),
    inherent!("rora", 0x46),
    inherent!("rorb", 0x56),
    inherent!("rti", 0x3B),
    inherent!("rts", 0x39),
    inherent!("sex", 0x1D),
    inherent!("swi", 0x3F),
    inherent!("swi2", 0x103F),
    inherent!("swi3", 0x113F),
    inherent!("sync", 0x13),
    inherent!("tsta", 0x4D),
    inherent!("tstb", 0x5D),
    // 8-bit accumulator operations
    general!("adca", Bits8, 0x89, 0x99, 0xA9, 0xB9),
    general!("adcb", Bits8, 0xC9, 0xD9, 0xE9, 0xF9),
    general!("adda", Bits8, 0x8B, 0x9B, 0xAB, 0xBB),
    general!("addb", Bits8, 0xCB, 0xDB, 0xEB, 0xFB),
    general!("anda", Bits8, 0x84, 0x94, 0xA4, 0xB4),
    general!("andb", Bits8, 0xC4, 0xD4, 0xE4, 0xF4),
    general!("bita", Bits8, 0x85, 0x95, 0xA5, 0xB5),
    general!("bitb", Bits8, 0xC5, 0xD5, 0xE5, 0xF5),
    general!("cmpa", Bits8, 0x81, 0x91, 0xA1, 0xB1),
    general!("cmpb", Bits8, 0xC1, 0xD1, 0xE1, 0xF1),
    general!("eora", Bits8, 0x88, 0x98, 0xA8, 0xB8),
    general!("eorb", Bits8, 0xC8, 0xD8, 0xE8, 0xF8),
    general!("lda", Bits8, 0x86, 0x96, 0xA6, 0xB6),
    general!("ldb", Bits8, 0xC6, 0xD6, 0xE6, 0xF6),
    general!("ora", Bits8, 0x8A, 0x9A, 0xAA, 0xBA),
    general!("orb", Bits8, 0xCA, 0xDA, 0xEA, 0xFA),
    general!("sbca", Bits8, 0x82, 0x92, 0xA2, 0xB2),
    general!("sbcb", Bits8, 0xC2, 0xD2, 0xE2, 0xF2),
    general!("suba", Bits8, 0x80, 0x90, 0xA0, 0xB0),
    general!("subb", Bits8, 0xC0, 0xD0, 0xE0, 0xF0),
    // 16-bit register operations
    general!("addd", Bits16, 0xC3, 0xD3, 0xE3, 0xF3),
    general!("cmpd", Bits16, 0x1083, 0x1093, 0x10A3, 0x10B3),
    general!("cmps", Bits16, 0x118C, 0x119C, 0x11AC, 0x11BC),
    general!("cmpu", Bits16, 0x1183, 0x1193, 0x11A3, 0x11B3),
    general!("cmpx", Bits16, 0x8C, 0x9C, 0xAC, 0xBC),
    general!("cmpy", Bits16, 0x108C, 0x109C, 0x10AC, 0x10BC),
    general!("ldd", Bits16, 0xCC, 0xDC, 0xEC, 0xFC),
    general!("lds", Bits16, 0x10CE, 0x10DE, 0x10EE, 0x10FE),
    general!("ldu", Bits16, 0xCE, 0xDE, 0xEE, 0xFE),
    general!("ldx", Bits16, 0x8E, 0x9E, 0xAE, 0xBE),
    general!("ldy", Bits16, 0x108E, 0x109E, 0x10AE, 0x10BE),
    general!("subd", Bits16, 0x83, 0x93, 0xA3, 0xB3),
    // Stores
    memory!("sta", 0x97, 0xA7, 0xB7),
    memory!("stb", 0xD7, 0xE7, 0xF7),
    memory!("std", 0xDD, 0xED, 0xFD),
    memory!("sts", 0x10DF, 0x10EF, 0x10FF),
    memory!("stu", 0xDF, 0xEF, 0xFF),
    memory!("stx", 0x9F, 0xAF, 0xBF),
    memory!("sty", 0x109F, 0x10AF, 0x10BF),
    // Read-modify-write and jumps
    memory!("asl", 0x08, 0x68, 0x78),
    memory!("asr", 0x07, 0x67, 0x77),
    memory!("clr", 0x0F, 0x6F, 0x7F),
    memory!("com", 0x03, 0x63, 0x73),
    memory!("dec", 0x0A, 0x6A, 0x7A),
    memory!("inc", 0x0C, 0x6C, 0x7C),
    memory!("jmp", 0x0E, 0x6E, 0x7E),
    memory!("jsr", 0x9D, 0xAD, 0xBD),
    memory!("lsl", 0x08, 0x68, 0x78),
    memory!("lsr", 0x04, 0x64, 0x74),
    memory!("neg", 0x00, 0x60, 0x70),
    memory!("rol", 0x09, 0x69, 0x79),
    memory!("ror", 0x06, 0x66, 0x76),
    memory!("tst", 0x0D, 0x6D, 0x7D),
    // Condition codes
    immediate!("andcc", Bits8, 0x1C),
    immediate!("orcc", Bits8, 0x1A),
    immediate!("cwai", Bits8, 0x3C),
    // Effective address
    lea!("leax", 0x30),
    lea!("leay", 0x31),
    lea!("leas", 0x32),
    lea!("leau", 0x33),
    // Register transfers and stacks
    register_pair!("exg", 0x1E),
    register_pair!("tfr", 0x1F),
    register_list!("pshs", 0x34, S),
    register_list!("puls", 0x35, S),
    register_list!("pshu", 0x36, U),
    register_list!("pulu", 0x37, U),
    // Branches
    branch!("bra", 0x20, 0x16, Short),
    branch!("brn", 0x21, 0x1021, Short),
    branch!("bhi", 0x22, 0x1022, Short),
    branch!("bls", 0x23, 0x1023, Short),
    branch!("bcc", 0x24, 0x1024, Short),
    branch!("bhs", 0x24, 0x1024, Short),
    branch!("bcs", 0x25, 0x1025, Short),
    branch!("blo", 0x25, 0x1025, Short),
    branch!("bne", 0x26, 0x1026, Short),
    branch!("beq", 0x27, 0x1027, Short),
    branch!("bvc", 0x28, 0x1028, Short),
    branch!("bvs", 0x29, 0x1029, Short),
    branch!("bpl", 0x2A, 0x102A, Short),
    branch!("bmi", 0x2B, 0x102B, Short),
    branch!("bge", 0x2C, 0x102C, Short),
    branch!("blt", 0x2D, 0x102D, Short),
    branch!("bgt", 0x2E, 0x102E, Short),
    branch!("ble", 0x2F, 0x102F, Short),
    branch!("bsr", 0x8D, 0x17, Short),
    branch!("lbra", 0x20, 0x16, Long),
    branch!("lbrn", 0x21, 0x1021, Long),
    branch!("lbhi", 0x22, 0x1022, Long),
    branch!("lbls", 0x23, 0x1023, Long),
    branch!("lbcc", 0x24, 0x1024, Long),
    branch!("lbhs", 0x24, 0x1024, Long),
    branch!("lbcs", 0x25, 0x1025, Long),
    branch!("lblo", 0x25, 0x1025, Long),
    branch!("lbne", 0x26, 0x1026, Long),
    branch!("lbeq", 0x27, 0x1027, Long),
    branch!("lbvc", 0x28, 0x1028, Long),
    branch!("lbvs", 0x29, 0x1029, Long),
    branch!("lbpl", 0x2A, 0x102A, Long),
    branch!("lbmi", 0x2B, 0x102B, Long),
    branch!("lbge", 0x2C, 0x102C, Long),
    branch!("lblt", 0x2D, 0x102D, Long),
    branch!("lbgt", 0x2E, 0x102E, Long),
    branch!("lble", 0x2F, 0x102F, Long),
    branch!("lbsr", 0x8D, 0x17, Long),
];

pub fn has_mnemonic(mnemonic: &str) -> bool {
    BASE_TABLE
        .iter()
        .any(|entry| entry.mnemonic.eq_ignore_ascii_case(mnemonic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::OpcodeSet;
    use std::collections::HashSet;

    #[test]
    fn mnemonics_are_unique_and_lowercase() {
        let mut seen = HashSet::new();
        for entry in BASE_TABLE {
            assert_eq!(entry.mnemonic, entry.mnemonic.to_ascii_lowercase());
            assert!(seen.insert(entry.mnemonic), "duplicate {}", entry.mnemonic);
            assert!(entry.flags.is_empty());
        }
        assert!(has_mnemonic("LBRA"));
        assert!(!has_mnemonic("sexw"));
    }

    #[test]
    fn aliases_share_opcodes() {
        let find = |name: &str| {
            BASE_TABLE
                .iter()
                .find(|entry| entry.mnemonic == name)
                .map(|entry| entry.opcodes)
        };
        assert_eq!(find("lsl"), find("asl"));
        assert_eq!(find("lsla"), find("asla"));
        assert!(matches!(
            find("bhs"),
            Some(OpcodeSet::Relative { short: Some(0x24), .. })
        ));
    }
}
