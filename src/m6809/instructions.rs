// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! 6809 convenience mnemonics for D-register operations the 6809 has no
//! opcode for. The 6309 implements them natively.

use crate::core::registry::{InsnFlags, InstructionDescriptor};
use crate::families::m6800::table::sequence;

const CONVENIENCE: InsnFlags = InsnFlags::REQUIRES_6809.union(InsnFlags::CONVENIENCE);

pub static CONVENIENCE_TABLE: &[InstructionDescriptor] = &[
    sequence!("asld", [0x58, 0x49], CONVENIENCE),
    sequence!("lsld", [0x58, 0x49], CONVENIENCE),
    sequence!("asrd", [0x47, 0x56], CONVENIENCE),
    sequence!("clrd", [0x4F, 0x5F], CONVENIENCE),
    sequence!("comd", [0x43, 0x53], CONVENIENCE),
    sequence!("lsrd", [0x44, 0x56], CONVENIENCE),
    // nega / negb / sbca #0
    sequence!("negd", [0x40, 0x50, 0x82, 0x00], CONVENIENCE),
    sequence!("rold", [0x59, 0x49], CONVENIENCE),
    sequence!("rord", [0x46, 0x56], CONVENIENCE),
];

pub fn has_mnemonic(mnemonic: &str) -> bool {
    CONVENIENCE_TABLE
        .iter()
        .any(|entry| entry.mnemonic.eq_ignore_ascii_case(mnemonic))
}
