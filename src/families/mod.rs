// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU family implementations.
//!
//! Family modules hold the operand syntax and encoders shared by a group of
//! related CPUs, along with the instruction tables common to all of them.

pub mod m6800;
