// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Object output handed to the linker: per-line bytes and relocations, the
//! final symbol table and section sizes. Also renders listings and JSON.

use std::io::Write;

use serde_json::{json, Value as JsonValue};

use crate::core::assembler::context::AsmContext;
use crate::core::assembler::error::PassCounts;
use crate::core::assembler::listing::{ListingLine, ListingWriter};
use crate::core::expr::{RelocBase, Value};
use crate::core::line::{LineRecord, RelocTarget, Relocation};
use crate::core::operand::ParsedOperand;
use crate::core::source_map::SourceOrigin;
use crate::core::symbol_table::{SymbolKind, SymbolTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedLine {
    pub origin: SourceOrigin,
    pub source: String,
    pub section: Option<String>,
    pub address: u32,
    pub bytes: Vec<u8>,
    pub reserved: u32,
    pub relocations: Vec<Relocation>,
    /// Assigned value of an `equ`/`set` line.
    pub value: Option<i64>,
}

impl EmittedLine {
    pub fn len(&self) -> u32 {
        self.bytes.len() as u32 + self.reserved
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct ObjectOutput {
    pub lines: Vec<EmittedLine>,
    pub symbols: SymbolTable,
    /// Named relocatable sections and their sizes.
    pub sections: Vec<(String, u32)>,
    pub entry: Option<Value>,
}

impl ObjectOutput {
    pub(crate) fn collect(lines: &[LineRecord], ctx: &AsmContext) -> Self {
        let lines = lines
            .iter()
            .map(|line| {
                let value = match (&line.operand, &line.label) {
                    (ParsedOperand::Assignment(_), Some(label)) => {
                        ctx.symbols.lookup(label).and_then(|v| v.absolute())
                    }
                    _ => None,
                };
                EmittedLine {
                    origin: line.origin.clone(),
                    source: line.text.clone(),
                    section: line.section.clone(),
                    address: line.address,
                    bytes: line.bytes.clone(),
                    reserved: line.reserved,
                    relocations: line.relocations.clone(),
                    value,
                }
            })
            .collect();
        Self {
            lines,
            symbols: ctx.symbols.clone(),
            sections: ctx
                .sections
                .sizes()
                .map(|(name, size)| (name.to_string(), size))
                .collect(),
            entry: ctx.entry.clone(),
        }
    }

    pub fn symbol(&self, name: &str) -> Option<Value> {
        self.symbols.lookup(name)
    }

    /// Bytes emitted in total, reserved space excluded.
    pub fn total_bytes(&self) -> usize {
        self.lines.iter().map(|line| line.bytes.len()).sum()
    }

    /// Every relocation paired with the line that carries it.
    pub fn relocations(&self) -> impl Iterator<Item = (&EmittedLine, &Relocation)> {
        self.lines
            .iter()
            .flat_map(|line| line.relocations.iter().map(move |reloc| (line, reloc)))
    }

    /// Flatten one section (`None` is the absolute section) into its lowest
    /// address and a contiguous byte image. Gaps and reserved space are
    /// zero.
    pub fn image(&self, section: Option<&str>) -> Option<(u32, Vec<u8>)> {
        let in_section: Vec<&EmittedLine> = self
            .lines
            .iter()
            .filter(|line| line.section.as_deref() == section && !line.is_empty())
            .collect();
        let base = in_section.iter().map(|line| line.address).min()?;
        let end = in_section
            .iter()
            .map(|line| line.address + line.len())
            .max()?;
        let mut image = vec![0u8; (end - base) as usize];
        for line in in_section {
            let start = (line.address - base) as usize;
            image[start..start + line.bytes.len()].copy_from_slice(&line.bytes);
        }
        Some((base, image))
    }

    pub fn to_json(&self) -> JsonValue {
        let lines: Vec<JsonValue> = self
            .lines
            .iter()
            .filter(|line| !line.is_empty())
            .map(|line| {
                json!({
                    "file": line.origin.file_name(),
                    "line": line.origin.line,
                    "address": line.address,
                    "section": line.section,
                    "bytes": line.bytes,
                    "reserved": line.reserved,
                    "relocations": line.relocations.iter().map(relocation_json).collect::<Vec<_>>(),
                })
            })
            .collect();
        let symbols: Vec<JsonValue> = self
            .symbols
            .entries()
            .filter(|entry| entry.kind != SymbolKind::Referenced)
            .map(|entry| {
                let (value, section) = match entry.value() {
                    Some(Value::Absolute(v)) => (Some(v), None),
                    Some(Value::Relocatable {
                        base: RelocBase::Section(name),
                        offset,
                    }) => (Some(offset), Some(name)),
                    Some(Value::Relocatable { .. }) | None => (None, None),
                };
                json!({
                    "name": entry.name,
                    "kind": entry.kind.as_str(),
                    "value": value,
                    "section": section,
                    "exported": entry.exported,
                    "imported": entry.kind == SymbolKind::External,
                })
            })
            .collect();
        let sections: Vec<JsonValue> = self
            .sections
            .iter()
            .map(|(name, size)| json!({ "name": name, "size": size }))
            .collect();
        json!({
            "lines": lines,
            "symbols": symbols,
            "sections": sections,
            "entry": self.entry.as_ref().map(value_json),
        })
    }

    pub fn write_listing<W: Write>(
        &self,
        out: W,
        title: &str,
        counts: &PassCounts,
    ) -> std::io::Result<()> {
        let mut listing = ListingWriter::new(out);
        listing.header(title)?;
        for line in &self.lines {
            listing.write_line(ListingLine {
                addr: line.address,
                bytes: &line.bytes,
                reserved: line.reserved,
                value: line.value,
                line_num: line.origin.line,
                source: &line.source,
                section: line.section.as_deref(),
            })?;
        }
        listing.footer(counts, &self.symbols, self.total_bytes())
    }
}

fn relocation_json(reloc: &Relocation) -> JsonValue {
    let mut out = json!({
        "offset": reloc.offset,
        "addend": reloc.addend,
        "kind": reloc.kind.as_str(),
    });
    match &reloc.target {
        RelocTarget::Symbol(name) => out["symbol"] = json!(name),
        RelocTarget::Section(name) => out["section"] = json!(name),
        RelocTarget::Absolute => out["absolute"] = json!(true),
    }
    out
}

fn value_json(value: &Value) -> JsonValue {
    match value {
        Value::Absolute(v) => json!({ "value": v }),
        Value::Relocatable {
            base: RelocBase::Section(name),
            offset,
        } => json!({ "section": name, "offset": offset }),
        Value::Relocatable {
            base: RelocBase::External(name),
            offset,
        } => json!({ "symbol": name, "offset": offset }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::line::RelocKind;

    fn emitted(address: u32, bytes: &[u8], reserved: u32, section: Option<&str>) -> EmittedLine {
        EmittedLine {
            origin: SourceOrigin::new(None, 1),
            source: String::new(),
            section: section.map(str::to_string),
            address,
            bytes: bytes.to_vec(),
            reserved,
            relocations: Vec::new(),
            value: None,
        }
    }

    fn output(lines: Vec<EmittedLine>) -> ObjectOutput {
        ObjectOutput {
            lines,
            symbols: SymbolTable::new(),
            sections: Vec::new(),
            entry: None,
        }
    }

    #[test]
    fn image_fills_gaps_and_reservations_with_zero() {
        let out = output(vec![
            emitted(0x10, &[0x12], 0, None),
            emitted(0x11, &[], 2, None),
            emitted(0x14, &[0x39], 0, None),
            emitted(0x00, &[0xAA], 0, Some("data")),
        ]);
        assert_eq!(
            out.image(None),
            Some((0x10, vec![0x12, 0x00, 0x00, 0x00, 0x39]))
        );
        assert_eq!(out.image(Some("data")), Some((0, vec![0xAA])));
        assert_eq!(out.image(Some("bss")), None);
    }

    #[test]
    fn json_names_relocation_targets() {
        let mut line = emitted(0, &[0xBD, 0x00, 0x00], 0, Some("code"));
        line.relocations.push(Relocation {
            offset: 1,
            target: RelocTarget::Symbol("putc".to_string()),
            addend: 0,
            kind: RelocKind::Abs16,
        });
        let json = output(vec![line]).to_json();
        let reloc = &json["lines"][0]["relocations"][0];
        assert_eq!(reloc["symbol"], "putc");
        assert_eq!(reloc["offset"], 1);
        assert_eq!(reloc["kind"], "abs16");
        assert_eq!(json["lines"][0]["section"], "code");
    }
}
