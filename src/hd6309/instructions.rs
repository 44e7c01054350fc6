// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! HD6309 CPU extension instruction table.

use crate::core::registry::{InsnFlags, InstructionDescriptor, OpcodeSet};
use crate::families::m6800::table::{general, immediate, inherent, memory, register_pair};

use super::handler::{BitTransferOps, BlockTransferOps, MemoryImmediateOps};

const HD6309: InsnFlags = InsnFlags::REQUIRES_6309;

macro_rules! memory_immediate {
    ($mnemonic:literal, $dir:expr, $idx:expr, $ext:expr) => {
        InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: OpcodeSet::MemoryImmediate {
                direct: $dir,
                indexed: $idx,
                extended: $ext,
            },
            ops: &MemoryImmediateOps,
            flags: HD6309,
        }
    };
}

macro_rules! bit_transfer {
    ($mnemonic:literal, $opcode:expr) => {
        InstructionDescriptor {
            mnemonic: $mnemonic,
            opcodes: OpcodeSet::BitTransfer($opcode),
            ops: &BitTransferOps,
            flags: HD6309,
        }
    };
}

pub static CPU_INSTRUCTION_TABLE: &[InstructionDescriptor] = &[
    // Native D operations
    inherent!("asld", 0x1048, HD6309),
    inherent!("lsld", 0x1048, HD6309),
    inherent!("asrd", 0x1047, HD6309),
    inherent!("clrd", 0x104F, HD6309),
    inherent!("comd", 0x1043, HD6309),
    inherent!("decd", 0x104A, HD6309),
    inherent!("incd", 0x104C, HD6309),
    inherent!("lsrd", 0x1044, HD6309),
    inherent!("negd", 0x1040, HD6309),
    inherent!("rold", 0x1049, HD6309),
    inherent!("rord", 0x1046, HD6309),
    inherent!("tstd", 0x104D, HD6309),
    // W
    inherent!("clrw", 0x105F, HD6309),
    inherent!("comw", 0x1053, HD6309),
    inherent!("decw", 0x105A, HD6309),
    inherent!("incw", 0x105C, HD6309),
    inherent!("lsrw", 0x1054, HD6309),
    inherent!("rolw", 0x1059, HD6309),
    inherent!("rorw", 0x1056, HD6309),
    inherent!("tstw", 0x105D, HD6309),
    // E and F
    inherent!("clre", 0x114F, HD6309),
    inherent!("come", 0x1143, HD6309),
    inherent!("dece", 0x114A, HD6309),
    inherent!("ince", 0x114C, HD6309),
    inherent!("tste", 0x114D, HD6309),
    inherent!("clrf", 0x115F, HD6309),
    inherent!("comf", 0x1153, HD6309),
    inherent!("decf", 0x115A, HD6309),
    inherent!("incf", 0x115C, HD6309),
    inherent!("tstf", 0x115D, HD6309),
    inherent!("sexw", 0x14, HD6309),
    inherent!("pshsw", 0x1038, HD6309),
    inherent!("pulsw", 0x1039, HD6309),
    inherent!("pshuw", 0x103A, HD6309),
    inherent!("puluw", 0x103B, HD6309),
    // 8-bit E/F operations
    general!("adde", Bits8, 0x118B, 0x119B, 0x11AB, 0x11BB, HD6309),
    general!("addf", Bits8, 0x11CB, 0x11DB, 0x11EB, 0x11FB, HD6309),
    general!("cmpe", Bits8, 0x1181, 0x1191, 0x11A1, 0x11B1, HD6309),
    general!("cmpf", Bits8, 0x11C1, 0x11D1, 0x11E1, 0x11F1, HD6309),
    general!("lde", Bits8, 0x1186, 0x1196, 0x11A6, 0x11B6, HD6309),
    general!("ldf", Bits8, 0x11C6, 0x11D6, 0x11E6, 0x11F6, HD6309),
    general!("sube", Bits8, 0x1180, 0x1190, 0x11A0, 0x11B0, HD6309),
    general!("subf", Bits8, 0x11C0, 0x11D0, 0x11E0, 0x11F0, HD6309),
    memory!("ste", 0x1197, 0x11A7, 0x11B7, HD6309),
    memory!("stf", 0x11D7, 0x11E7, 0x11F7, HD6309),
    // 16-bit D/W operations
    general!("adcd", Bits16, 0x1089, 0x1099, 0x10A9, 0x10B9, HD6309),
    general!("addw", Bits16, 0x108B, 0x109B, 0x10AB, 0x10BB, HD6309),
    general!("andd", Bits16, 0x1084, 0x1094, 0x10A4, 0x10B4, HD6309),
    general!("bitd", Bits16, 0x1085, 0x1095, 0x10A5, 0x10B5, HD6309),
    general!("cmpw", Bits16, 0x1081, 0x1091, 0x10A1, 0x10B1, HD6309),
    general!("eord", Bits16, 0x1088, 0x1098, 0x10A8, 0x10B8, HD6309),
    general!("ldw", Bits16, 0x1086, 0x1096, 0x10A6, 0x10B6, HD6309),
    general!("ord", Bits16, 0x108A, 0x109A, 0x10AA, 0x10BA, HD6309),
    general!("sbcd", Bits16, 0x1082, 0x1092, 0x10A2, 0x10B2, HD6309),
    general!("subw", Bits16, 0x1080, 0x1090, 0x10A0, 0x10B0, HD6309),
    memory!("stw", 0x1097, 0x10A7, 0x10B7, HD6309),
    // Q
    general!("ldq", Bits32, 0xCD, 0x10DC, 0x10EC, 0x10FC, HD6309),
    memory!("stq", 0x10DD, 0x10ED, 0x10FD, HD6309),
    // Multiply and divide
    general!("divd", Bits8, 0x118D, 0x119D, 0x11AD, 0x11BD, HD6309),
    general!("divq", Bits16, 0x118E, 0x119E, 0x11AE, 0x11BE, HD6309),
    general!("muld", Bits16, 0x118F, 0x119F, 0x11AF, 0x11BF, HD6309),
    // Mode register
    immediate!("bitmd", Bits8, 0x113C, HD6309),
    immediate!("ldmd", Bits8, 0x113D, HD6309),
    // Register to register
    register_pair!("addr", 0x1030, HD6309),
    register_pair!("adcr", 0x1031, HD6309),
    register_pair!("subr", 0x1032, HD6309),
    register_pair!("sbcr", 0x1033, HD6309),
    register_pair!("andr", 0x1034, HD6309),
    register_pair!("orr", 0x1035, HD6309),
    register_pair!("eorr", 0x1036, HD6309),
    register_pair!("cmpr", 0x1037, HD6309),
    // Memory with immediate mask
    memory_immediate!("oim", 0x01, 0x61, 0x71),
    memory_immediate!("aim", 0x02, 0x62, 0x72),
    memory_immediate!("eim", 0x05, 0x65, 0x75),
    memory_immediate!("tim", 0x0B, 0x6B, 0x7B),
    // Register bit transfer
    bit_transfer!("band", 0x1130),
    bit_transfer!("biand", 0x1131),
    bit_transfer!("bor", 0x1132),
    bit_transfer!("bior", 0x1133),
    bit_transfer!("beor", 0x1134),
    bit_transfer!("bieor", 0x1135),
    bit_transfer!("ldbt", 0x1136),
    bit_transfer!("stbt", 0x1137),
    InstructionDescriptor {
        mnemonic: "tfm",
        opcodes: OpcodeSet::BlockTransfer(0x1138),
        ops: &BlockTransferOps,
        flags: HD6309,
    },
];

pub fn has_mnemonic(mnemonic: &str) -> bool {
    CPU_INSTRUCTION_TABLE
        .iter()
        .any(|entry| entry.mnemonic.eq_ignore_ascii_case(mnemonic))
}
