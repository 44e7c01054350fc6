// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Symbol table with forward-reference bookkeeping.
//!
//! Symbols are declared when their defining line is parsed and receive values
//! during resolve. A declared symbol without a value is a forward reference
//! that a later pass is expected to fill in.

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::core::expr::{RelocBase, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Address of a source line.
    Label,
    /// `equ` constant.
    Constant,
    /// `set` variable, may be reassigned.
    Variable,
    /// Imported from another module; resolved by the linker.
    External,
    /// Seen in an operand or `export` but not declared (yet).
    Referenced,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Label => "label",
            SymbolKind::Constant => "equ",
            SymbolKind::Variable => "set",
            SymbolKind::External => "extern",
            SymbolKind::Referenced => "undef",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableEntry {
    pub name: String,
    pub kind: SymbolKind,
    pub val: Option<Value>,
    pub exported: bool,
    pub references: u32,
}

impl SymbolTableEntry {
    pub fn is_defined(&self) -> bool {
        self.kind == SymbolKind::External || self.val.is_some()
    }

    pub fn is_mutable(&self) -> bool {
        self.kind == SymbolKind::Variable
    }

    /// Owning section of a relocatable symbol.
    pub fn section(&self) -> Option<&str> {
        self.val.as_ref().and_then(Value::section)
    }

    /// Value used when the symbol appears in an expression.
    pub fn value(&self) -> Option<Value> {
        if self.kind == SymbolKind::External {
            return Some(Value::Relocatable {
                base: RelocBase::External(self.name.clone()),
                offset: 0,
            });
        }
        self.val.clone()
    }
}

#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolTableResult {
    Ok,
    Duplicate,
    NotFound,
}

#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignResult {
    Unchanged,
    Changed,
    NotFound,
}

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    entries: BTreeMap<String, SymbolTableEntry>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` as a symbol of `kind`.
    ///
    /// A forward-referenced name is upgraded in place. Redeclaring a defined
    /// name is a duplicate, except that a `set` variable may be declared again.
    pub fn declare(&mut self, name: &str, kind: SymbolKind) -> SymbolTableResult {
        match self.entries.get_mut(name) {
            None => {
                self.entries.insert(
                    name.to_string(),
                    SymbolTableEntry {
                        name: name.to_string(),
                        kind,
                        val: None,
                        exported: false,
                        references: 0,
                    },
                );
                SymbolTableResult::Ok
            }
            Some(entry) if entry.kind == SymbolKind::Referenced => {
                entry.kind = kind;
                SymbolTableResult::Ok
            }
            Some(entry) if entry.kind == SymbolKind::Variable && kind == SymbolKind::Variable => {
                SymbolTableResult::Ok
            }
            Some(_) => SymbolTableResult::Duplicate,
        }
    }

    /// Store a value for a declared symbol.
    pub fn assign(&mut self, name: &str, value: Value) -> AssignResult {
        let Some(entry) = self.entries.get_mut(name) else {
            return AssignResult::NotFound;
        };
        if entry.val.as_ref() == Some(&value) {
            return AssignResult::Unchanged;
        }
        entry.val = Some(value);
        AssignResult::Changed
    }

    /// Count a use of `name` in an operand, creating a placeholder if needed.
    pub fn note_reference(&mut self, name: &str) {
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| SymbolTableEntry {
                name: name.to_string(),
                kind: SymbolKind::Referenced,
                val: None,
                exported: false,
                references: 0,
            });
        entry.references = entry.references.saturating_add(1);
    }

    pub fn mark_exported(&mut self, name: &str) -> SymbolTableResult {
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| SymbolTableEntry {
                name: name.to_string(),
                kind: SymbolKind::Referenced,
                val: None,
                exported: false,
                references: 0,
            });
        if entry.kind == SymbolKind::External {
            return SymbolTableResult::Duplicate;
        }
        entry.exported = true;
        SymbolTableResult::Ok
    }

    pub fn entry(&self, name: &str) -> Option<&SymbolTableEntry> {
        self.entries.get(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.entries.get(name).and_then(SymbolTableEntry::value)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .is_some_and(SymbolTableEntry::is_defined)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SymbolTableEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the table in listing format.
    pub fn dump(&self, out: &mut dyn Write) -> io::Result<()> {
        if self.entries.is_empty() {
            return writeln!(out, "(none)");
        }
        for entry in self.entries.values() {
            let value = match (&entry.kind, &entry.val) {
                (SymbolKind::External, _) => "extern".to_string(),
                (_, Some(Value::Absolute(v))) => format!("${:04X}", v & 0xFFFF_FFFF),
                (_, Some(Value::Relocatable { base, offset })) => match base {
                    RelocBase::Section(name) => format!("${:04X} ({name})", offset),
                    RelocBase::External(name) => format!("{name}+{offset}"),
                },
                (_, None) => "????".to_string(),
            };
            let flags = if entry.exported { " EXPORT" } else { "" };
            writeln!(
                out,
                "{:<24} {:<6} {:<20} refs {}{}",
                entry.name,
                entry.kind.as_str(),
                value,
                entry.references,
                flags
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_reference_is_upgraded_by_declaration() {
        let mut table = SymbolTable::new();
        table.note_reference("later");
        assert!(!table.is_defined("later"));
        assert_eq!(table.declare("later", SymbolKind::Label), SymbolTableResult::Ok);
        assert_eq!(table.assign("later", Value::Absolute(0x10)), AssignResult::Changed);
        assert_eq!(table.lookup("later"), Some(Value::Absolute(0x10)));
        assert_eq!(table.entry("later").map(|e| e.references), Some(1));
    }

    #[test]
    fn duplicate_labels_are_rejected_but_variables_may_repeat() {
        let mut table = SymbolTable::new();
        assert_eq!(table.declare("a", SymbolKind::Label), SymbolTableResult::Ok);
        assert_eq!(table.declare("a", SymbolKind::Constant), SymbolTableResult::Duplicate);
        assert_eq!(table.declare("v", SymbolKind::Variable), SymbolTableResult::Ok);
        assert_eq!(table.declare("v", SymbolKind::Variable), SymbolTableResult::Ok);
    }

    #[test]
    fn assign_reports_changes() {
        let mut table = SymbolTable::new();
        assert_eq!(table.assign("x", Value::Absolute(1)), AssignResult::NotFound);
        let _ = table.declare("x", SymbolKind::Constant);
        assert_eq!(table.assign("x", Value::Absolute(1)), AssignResult::Changed);
        assert_eq!(table.assign("x", Value::Absolute(1)), AssignResult::Unchanged);
        assert_eq!(table.assign("x", Value::Absolute(2)), AssignResult::Changed);
    }

    #[test]
    fn externals_evaluate_relocatable() {
        let mut table = SymbolTable::new();
        let _ = table.declare("putc", SymbolKind::External);
        assert!(table.is_defined("putc"));
        assert_eq!(
            table.lookup("putc"),
            Some(Value::Relocatable {
                base: RelocBase::External("putc".to_string()),
                offset: 0,
            })
        );
        assert_eq!(table.mark_exported("putc"), SymbolTableResult::Duplicate);
    }

    #[test]
    fn symbols_are_case_sensitive() {
        let mut table = SymbolTable::new();
        let _ = table.declare("Loop", SymbolKind::Label);
        assert!(table.entry("loop").is_none());
    }

    #[test]
    fn dump_lists_symbols() {
        let mut table = SymbolTable::new();
        let _ = table.declare("start", SymbolKind::Label);
        let _ = table.assign("start", Value::Absolute(0x1234));
        let _ = table.mark_exported("start");
        let mut out = Vec::new();
        table.dump(&mut out).expect("dump");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("start"));
        assert!(text.contains("$1234"));
        assert!(text.contains("EXPORT"));
    }
}
