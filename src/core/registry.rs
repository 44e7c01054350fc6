// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction descriptor registry and the parse/resolve/emit protocol.
//!
//! The registry has no knowledge of concrete instruction sets. Modules
//! register static descriptor tables; each descriptor pairs a mnemonic with
//! its opcode alternatives, a capability flag set and the operation object
//! that implements its addressing-mode family. Pseudo-operations are ordinary
//! descriptors with an empty opcode set.

use std::collections::HashMap;
use std::fmt;

use bitflags::bitflags;

use crate::core::assembler::conditional::ConditionalAction;
use crate::core::assembler::context::AsmContext;
use crate::core::assembler::error::AsmError;
use crate::core::cpu::CpuVariant;
use crate::core::line::{LineRecord, Relocation};
use crate::core::operand::ParsedOperand;
use crate::core::source_map::SourceOrigin;

pub type Opcode = u16;

bitflags! {
    /// Capability flags attached to a descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InsnFlags: u16 {
        const REQUIRES_6309 = 1 << 0;
        const REQUIRES_6800 = 1 << 1;
        const REQUIRES_6809 = 1 << 2;
        const CONVENIENCE = 1 << 3;
        const DEFINES_SYMBOL = 1 << 4;
        const CONDITIONAL = 1 << 5;
        const STRUCT_OPEN = 1 << 6;
        const STRUCT_CLOSE = 1 << 7;
        const RESERVES_DATA = 1 << 8;
        const MACRO_END = 1 << 9;
        const MACRO_START = 1 << 10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandWidth {
    Bits8,
    Bits16,
    Bits32,
}

impl OperandWidth {
    pub fn bytes(self) -> u32 {
        match self {
            OperandWidth::Bits8 => 1,
            OperandWidth::Bits16 => 2,
            OperandWidth::Bits32 => 4,
        }
    }
}

/// Which branch form the source spelled (`bra` vs `lbra`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchForm {
    Short,
    Long,
}

/// Opcode alternatives, keyed by the addressing-mode family that uses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeSet {
    None,
    Inherent(Opcode),
    General {
        direct: Option<Opcode>,
        indexed: Option<Opcode>,
        extended: Option<Opcode>,
        immediate: Option<Opcode>,
        width: OperandWidth,
    },
    Immediate {
        opcode: Opcode,
        width: OperandWidth,
    },
    Indexed(Opcode),
    Relative {
        short: Option<Opcode>,
        long: Opcode,
        written: BranchForm,
    },
    Register(Opcode),
    RegisterList {
        opcode: Opcode,
        stack: StackRegister,
    },
    MemoryImmediate {
        direct: Opcode,
        indexed: Opcode,
        extended: Opcode,
    },
    BitTransfer(Opcode),
    BlockTransfer(Opcode),
    Sequence(&'static [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackRegister {
    S,
    U,
}

/// Number of bytes an opcode occupies: page-prefixed opcodes take two.
pub fn opcode_len(opcode: Opcode) -> u32 {
    if opcode > 0xFF {
        2
    } else {
        1
    }
}

pub fn push_opcode(bytes: &mut Vec<u8>, opcode: Opcode) {
    if opcode > 0xFF {
        bytes.push((opcode >> 8) as u8);
    }
    bytes.push((opcode & 0xFF) as u8);
}

/// Input to the parse hook for one line.
#[derive(Debug, Clone, Copy)]
pub struct ParseRequest<'a> {
    pub mnemonic: &'a str,
    pub label: Option<&'a str>,
    /// Raw text after the mnemonic, comment included.
    pub operand: &'a str,
    /// Zero-based column of `operand` in the source line.
    pub operand_col: usize,
    pub origin: &'a SourceOrigin,
    /// Set while an enclosing conditional block is false.
    pub skipping: bool,
}

#[derive(Debug, Clone)]
pub struct Parsed {
    pub operand: ParsedOperand,
    /// Initial length estimate.
    pub size: u32,
}

impl Parsed {
    pub fn new(operand: ParsedOperand, size: u32) -> Self {
        Self { operand, size }
    }

    pub fn empty() -> Self {
        Self::new(ParsedOperand::None, 0)
    }
}

#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Line(Parsed),
    /// Start capturing a macro body under this name.
    BeginMacro(String),
    Conditional(ConditionalAction),
    /// Stop reading input after this line.
    EndInput(Parsed),
}

/// Length computed by a resolve hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    /// The length is a direct function of the current state.
    Exact(u32),
    /// Shortest valid length; subject to the relaxation floor.
    Relaxed(u32),
}

/// Bytes produced by the emit hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Emission {
    pub bytes: Vec<u8>,
    /// Space reserved without contents (`rmb`).
    pub reserved: u32,
    pub relocations: Vec<Relocation>,
}

impl Emission {
    pub fn bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            ..Self::default()
        }
    }

    pub fn reserve(count: u32) -> Self {
        Self {
            reserved: count,
            ..Self::default()
        }
    }

    pub fn len(&self) -> u32 {
        self.bytes.len() as u32 + self.reserved
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The three-phase operation interface shared by one addressing-mode family.
pub trait InstructionOps: Sync {
    fn parse(
        &self,
        desc: &InstructionDescriptor,
        req: &ParseRequest<'_>,
        ctx: &mut AsmContext,
    ) -> Result<ParseOutcome, AsmError>;

    /// Apply the line's effect on run state (origin, section, direct page,
    /// symbol values). Called on every resolve and emit pass, before the
    /// line receives its address.
    fn apply(
        &self,
        _desc: &InstructionDescriptor,
        _line: &LineRecord,
        _ctx: &mut AsmContext,
    ) -> Result<(), AsmError> {
        Ok(())
    }

    /// Recompute the line length for the current pass. `None` keeps the
    /// length chosen at parse time.
    fn resolve(
        &self,
        _desc: &InstructionDescriptor,
        _line: &LineRecord,
        _ctx: &mut AsmContext,
    ) -> Result<Option<Sizing>, AsmError> {
        Ok(None)
    }

    fn emit(
        &self,
        _desc: &InstructionDescriptor,
        _line: &LineRecord,
        _ctx: &mut AsmContext,
    ) -> Result<Emission, AsmError> {
        Ok(Emission::default())
    }
}

pub struct InstructionDescriptor {
    pub mnemonic: &'static str,
    pub opcodes: OpcodeSet,
    pub ops: &'static dyn InstructionOps,
    pub flags: InsnFlags,
}

impl fmt::Debug for InstructionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionDescriptor")
            .field("mnemonic", &self.mnemonic)
            .field("opcodes", &self.opcodes)
            .field("flags", &self.flags)
            .finish()
    }
}

impl InstructionDescriptor {
    pub fn has(&self, flag: InsnFlags) -> bool {
        self.flags.contains(flag)
    }
}

/// A named table of descriptors registered as one unit.
pub trait InstructionModule: Send + Sync {
    fn module_id(&self) -> &'static str;
    fn descriptors(&self) -> &'static [InstructionDescriptor];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateModule(&'static str),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateModule(id) => write!(f, "module '{id}' is already registered"),
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    Unknown,
    /// The mnemonic exists, but only for these variants.
    CpuMismatch(Vec<CpuVariant>),
}

/// Case-insensitive mnemonic to descriptor mapping.
#[derive(Default)]
pub struct InstructionRegistry {
    modules: Vec<&'static str>,
    mnemonics: HashMap<String, Vec<&'static InstructionDescriptor>>,
}

impl InstructionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_module(&mut self, module: &dyn InstructionModule) -> Result<(), RegistryError> {
        let id = module.module_id();
        if self.modules.contains(&id) {
            return Err(RegistryError::DuplicateModule(id));
        }
        self.modules.push(id);
        for desc in module.descriptors() {
            self.mnemonics
                .entry(normalize_mnemonic(desc.mnemonic))
                .or_default()
                .push(desc);
        }
        Ok(())
    }

    /// Find the first descriptor for `mnemonic` available under `cpu`.
    pub fn lookup(
        &self,
        mnemonic: &str,
        cpu: CpuVariant,
    ) -> Result<&'static InstructionDescriptor, LookupError> {
        let candidates = self
            .mnemonics
            .get(&normalize_mnemonic(mnemonic))
            .ok_or(LookupError::Unknown)?;
        if let Some(desc) = candidates
            .iter()
            .copied()
            .find(|desc| cpu.allows(desc.flags))
        {
            return Ok(desc);
        }
        let mut supported: Vec<CpuVariant> = Vec::new();
        for desc in candidates {
            for variant in CpuVariant::supporting(desc.flags) {
                if !supported.contains(&variant) {
                    supported.push(variant);
                }
            }
        }
        Err(LookupError::CpuMismatch(supported))
    }

    pub fn contains(&self, mnemonic: &str) -> bool {
        self.mnemonics.contains_key(&normalize_mnemonic(mnemonic))
    }

    pub fn module_ids(&self) -> &[&'static str] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.mnemonics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mnemonics.is_empty()
    }
}

fn normalize_mnemonic(mnemonic: &str) -> String {
    mnemonic.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NopOps;

    impl InstructionOps for NopOps {
        fn parse(
            &self,
            _desc: &InstructionDescriptor,
            _req: &ParseRequest<'_>,
            _ctx: &mut AsmContext,
        ) -> Result<ParseOutcome, AsmError> {
            Ok(ParseOutcome::Line(Parsed::empty()))
        }
    }

    static TABLE: [InstructionDescriptor; 3] = [
        InstructionDescriptor {
            mnemonic: "clrd",
            opcodes: OpcodeSet::Sequence(&[0x4F, 0x5F]),
            ops: &NopOps,
            flags: InsnFlags::REQUIRES_6809.union(InsnFlags::CONVENIENCE),
        },
        InstructionDescriptor {
            mnemonic: "clrd",
            opcodes: OpcodeSet::Inherent(0x104F),
            ops: &NopOps,
            flags: InsnFlags::REQUIRES_6309,
        },
        InstructionDescriptor {
            mnemonic: "sexw",
            opcodes: OpcodeSet::Inherent(0x14),
            ops: &NopOps,
            flags: InsnFlags::REQUIRES_6309,
        },
    ];

    struct TestModule;

    impl InstructionModule for TestModule {
        fn module_id(&self) -> &'static str {
            "test"
        }

        fn descriptors(&self) -> &'static [InstructionDescriptor] {
            &TABLE
        }
    }

    fn registry() -> InstructionRegistry {
        let mut registry = InstructionRegistry::new();
        registry.register_module(&TestModule).expect("register");
        registry
    }

    #[test]
    fn lookup_is_case_insensitive_and_gated_by_cpu() {
        let registry = registry();
        let desc = registry.lookup("CLRD", CpuVariant::M6809).expect("6809 clrd");
        assert_eq!(desc.opcodes, OpcodeSet::Sequence(&[0x4F, 0x5F]));
        let desc = registry.lookup("clrd", CpuVariant::HD6309).expect("6309 clrd");
        assert_eq!(desc.opcodes, OpcodeSet::Inherent(0x104F));
    }

    #[test]
    fn lookup_reports_cpu_mismatch_and_unknown() {
        let registry = registry();
        assert_eq!(
            registry.lookup("sexw", CpuVariant::M6809).unwrap_err(),
            LookupError::CpuMismatch(vec![CpuVariant::HD6309])
        );
        assert_eq!(
            registry.lookup("frob", CpuVariant::M6809).unwrap_err(),
            LookupError::Unknown
        );
    }

    #[test]
    fn duplicate_module_is_rejected() {
        let mut registry = registry();
        assert_eq!(
            registry.register_module(&TestModule),
            Err(RegistryError::DuplicateModule("test"))
        );
    }

    #[test]
    fn opcode_helpers_handle_page_prefixes() {
        assert_eq!(opcode_len(0x00), 1);
        assert_eq!(opcode_len(0x108E), 2);
        let mut bytes = Vec::new();
        push_opcode(&mut bytes, 0x113F);
        push_opcode(&mut bytes, 0x12);
        assert_eq!(bytes, vec![0x11, 0x3F, 0x12]);
    }
}
