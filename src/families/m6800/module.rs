// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Motorola 6800 lineage instruction modules.

use crate::core::registry::{InstructionDescriptor, InstructionModule};

use super::compat::COMPAT_TABLE;
use super::table::BASE_TABLE;

pub const FAMILY_MODULE_ID: &str = "motorola6800";
pub const COMPAT_MODULE_ID: &str = "m6800-compat";

/// The 6809 instruction set shared by every variant.
pub struct M6800FamilyModule;

impl InstructionModule for M6800FamilyModule {
    fn module_id(&self) -> &'static str {
        FAMILY_MODULE_ID
    }

    fn descriptors(&self) -> &'static [InstructionDescriptor] {
        BASE_TABLE
    }
}

/// 6800 source-compatibility mnemonics.
pub struct M6800CompatModule;

impl InstructionModule for M6800CompatModule {
    fn module_id(&self) -> &'static str {
        COMPAT_MODULE_ID
    }

    fn descriptors(&self) -> &'static [InstructionDescriptor] {
        COMPAT_TABLE
    }
}
