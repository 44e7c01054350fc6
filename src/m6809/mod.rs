// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Motorola 6809 CPU support module.

pub mod instructions;
pub mod module;

pub use module::M6809Module;
