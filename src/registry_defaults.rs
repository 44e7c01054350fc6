// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Shared default registry construction.

use crate::assembler::DirectiveModule;
use crate::core::registry::{InstructionRegistry, RegistryError};
use crate::families::m6800::module::{M6800CompatModule, M6800FamilyModule};
use crate::hd6309::module::HD6309Module;
use crate::m6809::module::M6809Module;

/// Build the registry holding every instruction set and the pseudo-ops.
///
/// Registration order matters where a mnemonic appears in more than one
/// module: lookup returns the first entry the selected CPU allows.
pub fn build_default_registry() -> Result<InstructionRegistry, RegistryError> {
    let mut registry = InstructionRegistry::new();
    registry.register_module(&M6800FamilyModule)?;
    registry.register_module(&M6809Module)?;
    registry.register_module(&HD6309Module)?;
    registry.register_module(&M6800CompatModule)?;
    registry.register_module(&DirectiveModule)?;
    Ok(registry)
}
