// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Per-run assembler state shared by the phase hooks.
//!
//! - [`context`] - The run context handed to parse/resolve/emit
//! - [`conditional`] - Conditional assembly state machine
//! - [`section`] - Section and origin tracking
//! - [`structs`] - Struct definitions and their field offsets
//! - [`listing`] - Listing file generation
//! - [`error`] - Error types and diagnostics

pub mod conditional;
pub mod context;
pub mod error;
pub mod listing;
pub mod section;
pub mod structs;
