// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Macro definitions and text-substitution expansion.
//!
//! A macro body is captured verbatim between `name macro` and `endm`. An
//! invocation replaces `\1`..`\9` with the comma-separated arguments, `\*`
//! with the whole argument list and `\@` with a number unique to the
//! expansion, then hands the resulting lines back to the front end.

use std::collections::HashMap;

use crate::core::source_map::SourceOrigin;

#[derive(Debug, Clone)]
pub struct MacroError {
    message: String,
    line: Option<u32>,
}

impl MacroError {
    pub fn new(message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }
}

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub body: Vec<String>,
    pub origin: SourceOrigin,
}

#[derive(Debug)]
pub struct MacroProcessor {
    macros: HashMap<String, MacroDef>,
    capture: Option<MacroDef>,
    expansions: u32,
}

impl Default for MacroProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroProcessor {
    pub fn new() -> Self {
        Self {
            macros: HashMap::new(),
            capture: None,
            expansions: 0,
        }
    }

    /// Start capturing the body of `name`.
    pub fn begin(&mut self, name: &str, origin: SourceOrigin) -> Result<(), MacroError> {
        if let Some(open) = &self.capture {
            return Err(MacroError::new(
                format!("Macro definitions cannot nest (inside {})", open.name),
                Some(origin.line),
            ));
        }
        if self.macros.contains_key(&normalize(name)) {
            return Err(MacroError::new(
                format!("Macro {name} is already defined"),
                Some(origin.line),
            ));
        }
        self.capture = Some(MacroDef {
            name: name.to_string(),
            body: Vec::new(),
            origin,
        });
        Ok(())
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// The definition still being captured, if any.
    pub fn open_definition(&self) -> Option<&MacroDef> {
        self.capture.as_ref()
    }

    pub fn capture_line(&mut self, text: &str) {
        if let Some(def) = self.capture.as_mut() {
            def.body.push(text.to_string());
        }
    }

    pub fn finish(&mut self, line: u32) -> Result<&MacroDef, MacroError> {
        let def = self
            .capture
            .take()
            .ok_or_else(|| MacroError::new("endm without macro", Some(line)))?;
        let key = normalize(&def.name);
        Ok(self.macros.entry(key).or_insert(def))
    }

    pub fn lookup(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(&normalize(name))
    }

    /// Expand `name` with the raw argument text of an invocation.
    pub fn expand(&mut self, name: &str, args_text: &str, line: u32) -> Result<Vec<String>, MacroError> {
        let args = parse_macro_args(args_text, line)?;
        self.expansions += 1;
        let unique = self.expansions;
        let def = self
            .macros
            .get(&normalize(name))
            .ok_or_else(|| MacroError::new(format!("Unknown macro {name}"), Some(line)))?;
        let full_list = args.join(",");
        Ok(def
            .body
            .iter()
            .map(|body_line| substitute_line(body_line, &args, &full_list, unique))
            .collect())
    }
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Split invocation arguments at top-level commas.
pub fn parse_macro_args(text: &str, line_num: u32) -> Result<Vec<String>, MacroError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for part in split_params(text) {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            return Err(MacroError::new(
                "Macro argument cannot be empty",
                Some(line_num),
            ));
        }
        out.push(trimmed.to_string());
    }
    Ok(out)
}

fn split_params(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_double = false;
    let mut depth = 0usize;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => in_double = !in_double,
            '\'' if !in_double => {
                // Character constant: keep the next character verbatim.
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                continue;
            }
            '(' | '[' if !in_double => depth += 1,
            ')' | ']' if !in_double => depth = depth.saturating_sub(1),
            ',' if !in_double && depth == 0 => {
                out.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    out.push(current);
    out
}

fn substitute_line(line: &str, args: &[String], full_list: &str, unique: u32) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some(d @ '1'..='9') => {
                chars.next();
                let idx = d as usize - '1' as usize;
                out.push_str(args.get(idx).map(String::as_str).unwrap_or(""));
            }
            Some('*') => {
                chars.next();
                out.push_str(full_list);
            }
            Some('@') => {
                chars.next();
                out.push_str(&format!("{unique:04}"));
            }
            _ => out.push(c),
        }
    }
    out
}
