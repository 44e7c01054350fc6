// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Struct definitions and their field offsets.

use std::collections::HashMap;

use crate::core::operand::StructField;
use crate::core::source_map::SourceOrigin;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub name: String,
    pub size: u32,
    pub fields: Vec<StructField>,
}

/// A struct whose body is still being read.
#[derive(Debug, Clone)]
pub struct StructBuilder {
    pub name: String,
    pub origin: SourceOrigin,
    offset: u32,
    fields: Vec<StructField>,
}

impl StructBuilder {
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Reserve `size` bytes, optionally naming them. Returns the field offset.
    pub fn add_field(&mut self, name: Option<&str>, size: u32) -> u32 {
        let offset = self.offset;
        if let Some(name) = name {
            self.fields.push(StructField {
                name: name.to_string(),
                offset,
            });
        }
        self.offset = self.offset.saturating_add(size);
        offset
    }

    /// Embed another struct; its fields appear as `name.field`.
    pub fn add_nested(&mut self, name: Option<&str>, def: &StructDef) -> u32 {
        let offset = self.offset;
        if let Some(name) = name {
            self.fields.push(StructField {
                name: name.to_string(),
                offset,
            });
            for field in &def.fields {
                self.fields.push(StructField {
                    name: format!("{name}.{}", field.name),
                    offset: offset + field.offset,
                });
            }
        }
        self.offset = self.offset.saturating_add(def.size);
        offset
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructError {
    AlreadyOpen(String),
    NotOpen,
    Duplicate(String),
}

impl StructError {
    pub fn message(&self) -> String {
        match self {
            StructError::AlreadyOpen(name) => {
                format!("struct definitions cannot nest (inside {name})")
            }
            StructError::NotOpen => "endstruct without struct".to_string(),
            StructError::Duplicate(name) => format!("struct {name} is already defined"),
        }
    }
}

#[derive(Debug, Default)]
pub struct StructTable {
    defs: HashMap<String, StructDef>,
    open: Option<StructBuilder>,
}

impl StructTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, name: &str, origin: SourceOrigin) -> Result<(), StructError> {
        if let Some(open) = &self.open {
            return Err(StructError::AlreadyOpen(open.name.clone()));
        }
        if self.defs.contains_key(name) {
            return Err(StructError::Duplicate(name.to_string()));
        }
        self.open = Some(StructBuilder {
            name: name.to_string(),
            origin,
            offset: 0,
            fields: Vec::new(),
        });
        Ok(())
    }

    pub fn open(&self) -> Option<&StructBuilder> {
        self.open.as_ref()
    }

    pub fn open_mut(&mut self) -> Option<&mut StructBuilder> {
        self.open.as_mut()
    }

    pub fn in_definition(&self) -> bool {
        self.open.is_some()
    }

    pub fn finish(&mut self) -> Result<StructDef, StructError> {
        let builder = self.open.take().ok_or(StructError::NotOpen)?;
        let def = StructDef {
            name: builder.name,
            size: builder.offset,
            fields: builder.fields,
        };
        self.defs.insert(def.name.clone(), def.clone());
        Ok(def)
    }

    pub fn get(&self, name: &str) -> Option<&StructDef> {
        self.defs.get(name)
    }
}
