// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Hitachi HD6309 CPU extension module.

pub mod handler;
pub mod instructions;
pub mod module;

pub use module::HD6309Module;
