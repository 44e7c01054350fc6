// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use asm6x09::assembler::Assembly;
use asm6x09::{Assembler, AssemblerConfig, AsmRunError, CpuVariant};

pub fn config(cpu: CpuVariant) -> AssemblerConfig {
    AssemblerConfig {
        cpu,
        ..AssemblerConfig::default()
    }
}

pub fn assemble_with(config: AssemblerConfig, text: &str) -> Result<Assembly, AsmRunError> {
    Assembler::new(config)
        .expect("default registry")
        .assemble_text(Some("scenario.asm"), text)
}

pub fn assemble(cpu: CpuVariant, text: &str) -> Result<Assembly, AsmRunError> {
    assemble_with(config(cpu), text)
}

/// Assemble and panic with every diagnostic if the run fails.
pub fn assemble_ok(cpu: CpuVariant, text: &str) -> Assembly {
    match assemble(cpu, text) {
        Ok(assembly) => assembly,
        Err(err) => {
            let diags: Vec<String> = err.diagnostics().iter().map(|d| d.format()).collect();
            panic!("assembly failed: {err}\n{}", diags.join("\n"));
        }
    }
}

pub fn emitted_bytes(assembly: &Assembly) -> Vec<u8> {
    assembly
        .output
        .lines
        .iter()
        .flat_map(|line| line.bytes.iter().copied())
        .collect()
}

/// Bytes emitted for source line `line` (1-based).
pub fn line_bytes(assembly: &Assembly, line: u32) -> Vec<u8> {
    assembly
        .output
        .lines
        .iter()
        .filter(|emitted| emitted.origin.line == line)
        .flat_map(|emitted| emitted.bytes.iter().copied())
        .collect()
}

/// Length and absolute target of an encoded `bra`/`lbra`/`beq`/`lbeq` at
/// `address`.
pub fn decode_branch(bytes: &[u8], address: u32) -> Option<(u32, i64)> {
    let at = i64::from(address);
    match bytes {
        [0x20 | 0x27, off] => Some((2, at + 2 + i64::from(*off as i8))),
        [0x16, hi, lo] => Some((3, at + 3 + i64::from(i16::from_be_bytes([*hi, *lo])))),
        [0x10, 0x27, hi, lo] => Some((4, at + 4 + i64::from(i16::from_be_bytes([*hi, *lo])))),
        _ => None,
    }
}

pub fn temp_dir(label: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("asm6x09-{label}-{now}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}
