// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Section and origin tracking.
//!
//! The absolute section is addressed through `org`; named sections are
//! relocatable and each keeps its own cursor, starting at zero. Cursors are
//! reset at the start of every resolve pass and every emit pass.

use std::collections::BTreeMap;

use crate::core::expr::{RelocBase, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    /// `org` inside a relocatable section.
    OrgInSection(String),
    /// `reorg` without a preceding `org`.
    NothingToRestore,
    /// `endsection` while already in the absolute section.
    NotInSection,
    /// A line extends past the 64K address space; holds its end address.
    AddressOverflow(u32),
}

/// Size of the 16-bit address space.
pub const ADDRESS_SPACE: u32 = 0x1_0000;

impl SectionError {
    pub fn message(&self) -> String {
        match self {
            SectionError::OrgInSection(name) => {
                format!("org is not allowed inside relocatable section {name}")
            }
            SectionError::NothingToRestore => "reorg without a preceding org".to_string(),
            SectionError::NotInSection => "endsection outside of a section".to_string(),
            SectionError::AddressOverflow(end) => {
                format!("Code extends past $FFFF (ends at ${end:X})")
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SectionTracker {
    /// `None` is the absolute section.
    current: Option<String>,
    absolute_pc: u32,
    saved_org: Option<u32>,
    cursors: BTreeMap<String, u32>,
    /// Highest offset reached in each named section.
    sizes: BTreeMap<String, u32>,
}

impl SectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewind every cursor for a new pass.
    pub fn reset(&mut self) {
        self.current = None;
        self.absolute_pc = 0;
        self.saved_org = None;
        for cursor in self.cursors.values_mut() {
            *cursor = 0;
        }
        for size in self.sizes.values_mut() {
            *size = 0;
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Offset of the next byte in the current section.
    pub fn cursor(&self) -> u32 {
        match &self.current {
            Some(name) => self.cursors.get(name).copied().unwrap_or(0),
            None => self.absolute_pc,
        }
    }

    pub fn here(&self) -> Value {
        let offset = self.cursor() as i64;
        match &self.current {
            Some(name) => Value::Relocatable {
                base: RelocBase::Section(name.clone()),
                offset,
            },
            None => Value::Absolute(offset),
        }
    }

    pub fn set_origin(&mut self, address: u32) -> Result<(), SectionError> {
        if let Some(name) = &self.current {
            return Err(SectionError::OrgInSection(name.clone()));
        }
        self.saved_org = Some(self.absolute_pc);
        self.absolute_pc = address;
        Ok(())
    }

    pub fn restore_origin(&mut self) -> Result<(), SectionError> {
        if let Some(name) = &self.current {
            return Err(SectionError::OrgInSection(name.clone()));
        }
        let saved = self.saved_org.take().ok_or(SectionError::NothingToRestore)?;
        self.absolute_pc = saved;
        Ok(())
    }

    pub fn enter(&mut self, name: &str) {
        self.cursors.entry(name.to_string()).or_insert(0);
        self.sizes.entry(name.to_string()).or_insert(0);
        self.current = Some(name.to_string());
    }

    pub fn leave(&mut self) -> Result<(), SectionError> {
        self.current.take().map(|_| ()).ok_or(SectionError::NotInSection)
    }

    /// Move the cursor past a line of `bytes`. The cursor still advances
    /// when the line runs off the end of the address space.
    pub fn advance(&mut self, bytes: u32) -> Result<(), SectionError> {
        let end = match &self.current {
            Some(name) => {
                let cursor = self.cursors.entry(name.clone()).or_insert(0);
                *cursor = cursor.saturating_add(bytes);
                let end = *cursor;
                let size = self.sizes.entry(name.clone()).or_insert(0);
                *size = (*size).max(end);
                end
            }
            None => {
                self.absolute_pc = self.absolute_pc.saturating_add(bytes);
                self.absolute_pc
            }
        };
        if end > ADDRESS_SPACE {
            return Err(SectionError::AddressOverflow(end));
        }
        Ok(())
    }

    pub fn sizes(&self) -> impl Iterator<Item = (&str, u32)> {
        self.sizes.iter().map(|(name, size)| (name.as_str(), *size))
    }

    pub fn is_section(&self, name: &str) -> bool {
        self.cursors.contains_key(name)
    }
}
