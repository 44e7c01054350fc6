// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Motorola 6809 CPU module.

use crate::core::registry::{InstructionDescriptor, InstructionModule};

use super::instructions::CONVENIENCE_TABLE;

pub const MODULE_ID: &str = "m6809";

pub struct M6809Module;

impl InstructionModule for M6809Module {
    fn module_id(&self) -> &'static str {
        MODULE_ID
    }

    fn descriptors(&self) -> &'static [InstructionDescriptor] {
        CONVENIENCE_TABLE
    }
}
