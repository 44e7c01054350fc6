// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Multi-pass assembler core for the 6809 family.
//!
//! Source lines flow through a preprocessing front end (conditionals, macros,
//! structs), are parsed once into [`core::line::LineRecord`]s, resolved
//! repeatedly until every variable-length encoding reaches a fixed point, and
//! finally emitted as bytes plus relocations for an external linker.

pub mod assembler;
pub mod core;
pub mod families;
pub mod hd6309;
pub mod m6809;
pub mod registry_defaults;

pub use crate::assembler::{Assembler, AssemblerConfig, Assembly};
pub use crate::core::assembler::error::{AsmError, AsmErrorKind, AsmRunError, AsmRunReport};
pub use crate::core::cpu::CpuVariant;
