// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Motorola 6800 lineage: shared 6809 operand syntax, encoders and tables.

pub mod compat;
pub mod handler;
pub mod indexed;
pub mod module;
pub mod operand;
pub mod relative;
pub mod table;

pub use module::{M6800CompatModule, M6800FamilyModule};

pub fn is_register(name: &str) -> bool {
    matches!(
        name.to_ascii_uppercase().as_str(),
        "A" | "B" | "CC" | "DP" | "D" | "X" | "Y" | "U" | "S" | "PC" | "E" | "F" | "W" | "V" | "MD"
    )
}
