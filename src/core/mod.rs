// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU-neutral building blocks shared by every instruction family.

pub mod assembler;
pub mod cpu;
pub mod expr;
pub mod line;
pub mod macro_processor;
pub mod operand;
pub mod parser;
pub mod registry;
pub mod report;
pub mod source_map;
pub mod symbol_table;
pub mod text_utils;
pub mod tokenizer;
