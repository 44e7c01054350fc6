// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! 6800 source compatibility: renamed mnemonics and the 6800 instructions
//! the 6809 lacks, expanded to equivalent 6809 sequences.

use crate::core::registry::{InsnFlags, InstructionDescriptor};

use super::table::{general, memory, sequence};

const COMPAT: InsnFlags = InsnFlags::REQUIRES_6800;

pub static COMPAT_TABLE: &[InstructionDescriptor] = &[
    general!("ldaa", Bits8, 0x86, 0x96, 0xA6, 0xB6, COMPAT),
    general!("ldab", Bits8, 0xC6, 0xD6, 0xE6, 0xF6, COMPAT),
    general!("oraa", Bits8, 0x8A, 0x9A, 0xAA, 0xBA, COMPAT),
    general!("orab", Bits8, 0xCA, 0xDA, 0xEA, 0xFA, COMPAT),
    general!("cpx", Bits16, 0x8C, 0x9C, 0xAC, 0xBC, COMPAT),
    memory!("staa", 0x97, 0xA7, 0xB7, COMPAT),
    memory!("stab", 0xD7, 0xE7, 0xF7, COMPAT),
    // pshs b / op ,s+
    sequence!("aba", [0x34, 0x04, 0xAB, 0xE0], COMPAT),
    sequence!("cba", [0x34, 0x04, 0xA1, 0xE0], COMPAT),
    sequence!("sba", [0x34, 0x04, 0xA0, 0xE0], COMPAT),
    // transfer plus a test of the destination to set the flags
    sequence!("tab", [0x1F, 0x89, 0x5D], COMPAT),
    sequence!("tba", [0x1F, 0x98, 0x4D], COMPAT),
    sequence!("tap", [0x1F, 0x8A], COMPAT),
    sequence!("tpa", [0x1F, 0xA8], COMPAT),
    sequence!("tsx", [0x1F, 0x41], COMPAT),
    sequence!("txs", [0x1F, 0x14], COMPAT),
    sequence!("clc", [0x1C, 0xFE], COMPAT),
    sequence!("cli", [0x1C, 0xEF], COMPAT),
    sequence!("clv", [0x1C, 0xFD], COMPAT),
    sequence!("sec", [0x1A, 0x01], COMPAT),
    sequence!("sei", [0x1A, 0x10], COMPAT),
    sequence!("sev", [0x1A, 0x02], COMPAT),
    sequence!("des", [0x32, 0x7F], COMPAT),
    sequence!("dex", [0x30, 0x1F], COMPAT),
    sequence!("ins", [0x32, 0x61], COMPAT),
    sequence!("inx", [0x30, 0x01], COMPAT),
    sequence!("psha", [0x34, 0x02], COMPAT),
    sequence!("pshb", [0x34, 0x04], COMPAT),
    sequence!("pula", [0x35, 0x02], COMPAT),
    sequence!("pulb", [0x35, 0x04], COMPAT),
    sequence!("wai", [0x3C, 0xFF], COMPAT),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cpu::CpuVariant;
    use crate::core::registry::OpcodeSet;

    #[test]
    fn compat_entries_are_gated_to_6800_mode() {
        for entry in COMPAT_TABLE {
            assert!(CpuVariant::M6800Compat.allows(entry.flags), "{}", entry.mnemonic);
            assert!(!CpuVariant::M6809.allows(entry.flags), "{}", entry.mnemonic);
            assert!(!CpuVariant::HD6309.allows(entry.flags), "{}", entry.mnemonic);
        }
    }

    #[test]
    fn inx_is_leax_one() {
        let inx = COMPAT_TABLE
            .iter()
            .find(|entry| entry.mnemonic == "inx")
            .expect("inx");
        assert_eq!(inx.opcodes, OpcodeSet::Sequence(&[0x30, 0x01]));
    }
}
