// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Hitachi HD6309 CPU module.

use crate::core::registry::{InstructionDescriptor, InstructionModule};

use super::instructions::CPU_INSTRUCTION_TABLE;

pub const MODULE_ID: &str = "hd6309";

pub struct HD6309Module;

impl InstructionModule for HD6309Module {
    fn module_id(&self) -> &'static str {
        MODULE_ID
    }

    fn descriptors(&self) -> &'static [InstructionDescriptor] {
        CPU_INSTRUCTION_TABLE
    }
}
