// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Run context handed to every parse, resolve and emit hook.
//!
//! One context lives for exactly one assembly run. It owns the symbol table,
//! the section tracker and the struct table, and carries the per-line state
//! (current address, direct page) that the pass driver sets before calling a
//! hook.

use std::fmt;
use std::str::FromStr;

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::assembler::section::SectionTracker;
use crate::core::assembler::structs::StructTable;
use crate::core::cpu::CpuVariant;
use crate::core::expr::{eval_expr, EvalContext, RelocBase, SymbolLookup, Value};
use crate::core::parser::Expr;
use crate::core::symbol_table::{AssignResult, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parse,
    Resolve,
    Emit,
}

/// How relative branches pick between short and long forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchPolicy {
    /// Both `bxx` and `lbxx` shrink to the shortest form that reaches.
    #[default]
    Relax,
    /// `bxx` is always short and `lbxx` always long.
    Explicit,
}

impl fmt::Display for BranchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchPolicy::Relax => f.write_str("relax"),
            BranchPolicy::Explicit => f.write_str("explicit"),
        }
    }
}

impl FromStr for BranchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relax" => Ok(BranchPolicy::Relax),
            "explicit" => Ok(BranchPolicy::Explicit),
            other => Err(format!("Unknown branch policy: {other} (expected relax or explicit)")),
        }
    }
}

#[derive(Debug)]
pub struct AsmContext {
    pub cpu: CpuVariant,
    pub branch_policy: BranchPolicy,
    pub symbols: SymbolTable,
    pub sections: SectionTracker,
    pub structs: StructTable,
    pub phase: Phase,
    pub pass: u32,
    /// Direct page in effect for the current line.
    pub dp: u8,
    pub initial_dp: u8,
    /// Address of the current line (`*`).
    pub here: Option<Value>,
    /// Entry point recorded by `end`.
    pub entry: Option<Value>,
    changed_symbols: Vec<String>,
    warnings: Vec<AsmError>,
}

impl AsmContext {
    pub fn new(cpu: CpuVariant, branch_policy: BranchPolicy, initial_dp: u8) -> Self {
        Self {
            cpu,
            branch_policy,
            symbols: SymbolTable::new(),
            sections: SectionTracker::new(),
            structs: StructTable::new(),
            phase: Phase::Parse,
            pass: 0,
            dp: initial_dp,
            initial_dp,
            here: None,
            entry: None,
            changed_symbols: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Rewind per-pass state before a resolve or emit traversal.
    pub fn begin_pass(&mut self, phase: Phase, pass: u32) {
        self.phase = phase;
        self.pass = pass;
        self.sections.reset();
        self.dp = self.initial_dp;
        self.here = None;
        self.changed_symbols.clear();
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, AsmError> {
        eval_expr(expr, self).map_err(AsmError::from)
    }

    /// Evaluate an expression that must not depend on a relocatable base.
    pub fn eval_absolute(&self, expr: &Expr, what: &str) -> Result<i64, AsmError> {
        match self.eval(expr)? {
            Value::Absolute(v) => Ok(v),
            Value::Relocatable { .. } => Err(AsmError::new(
                AsmErrorKind::Syntax,
                "Value must be absolute",
                Some(what),
            )
            .with_column(Some(expr.span().col_start))),
        }
    }

    /// Evaluate an expression whose value must already be known at parse time.
    pub fn eval_now(&self, expr: &Expr, what: &str) -> Result<i64, AsmError> {
        self.eval_absolute(expr, what).map_err(|err| {
            if err.is_pending() {
                AsmError::new(
                    AsmErrorKind::Syntax,
                    "Value must be defined before use",
                    Some(what),
                )
                .with_column(err.column())
            } else {
                err
            }
        })
    }

    /// Store a value for a declared symbol, tracking changes to constants.
    pub fn define_symbol(&mut self, name: &str, value: Value) -> Result<(), AsmError> {
        if let Value::Relocatable {
            base: RelocBase::External(ext),
            ..
        } = &value
        {
            return Err(AsmError::new(
                AsmErrorKind::Syntax,
                "Cannot define a symbol relative to external",
                Some(ext.as_str()),
            ));
        }
        match self.symbols.assign(name, value) {
            AssignResult::Unchanged => Ok(()),
            AssignResult::Changed => {
                let mutable = self.symbols.entry(name).is_some_and(|e| e.is_mutable());
                if !mutable {
                    self.changed_symbols.push(name.to_string());
                }
                Ok(())
            }
            AssignResult::NotFound => Err(AsmError::new(
                AsmErrorKind::Internal,
                "Symbol assigned before declaration",
                Some(name),
            )),
        }
    }

    pub fn changed_symbols(&self) -> &[String] {
        &self.changed_symbols
    }

    pub fn warn(&mut self, warning: AsmError) {
        self.warnings.push(warning);
    }

    pub fn take_warnings(&mut self) -> Vec<AsmError> {
        std::mem::take(&mut self.warnings)
    }

    /// Current address, or an error if no line is being processed.
    pub fn current(&self) -> Result<Value, AsmError> {
        self.here.clone().ok_or_else(|| {
            AsmError::new(AsmErrorKind::Internal, "Current address is not set", None)
        })
    }
}

impl EvalContext for AsmContext {
    fn lookup_symbol(&self, name: &str) -> SymbolLookup {
        match self.symbols.entry(name).and_then(|entry| entry.value()) {
            Some(value) => SymbolLookup::Value(value),
            None if self.phase == Phase::Emit => SymbolLookup::Undefined,
            None => SymbolLookup::Pending,
        }
    }

    fn current_address(&self) -> Option<Value> {
        self.here.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_expr;
    use crate::core::symbol_table::SymbolKind;

    fn expr(text: &str) -> Expr {
        parse_expr(text, 1, 0).expect("parse")
    }

    #[test]
    fn unknown_symbols_are_pending_until_emit() {
        let mut ctx = AsmContext::new(CpuVariant::M6809, BranchPolicy::Relax, 0);
        ctx.phase = Phase::Resolve;
        assert!(ctx.eval(&expr("later")).unwrap_err().is_pending());
        ctx.phase = Phase::Emit;
        let err = ctx.eval(&expr("later")).unwrap_err();
        assert!(!err.is_pending());
        assert_eq!(err.kind(), AsmErrorKind::UndefinedSymbol);
    }

    #[test]
    fn constant_changes_are_tracked_but_variables_are_not() {
        let mut ctx = AsmContext::new(CpuVariant::M6809, BranchPolicy::Relax, 0);
        let _ = ctx.symbols.declare("k", SymbolKind::Constant);
        let _ = ctx.symbols.declare("v", SymbolKind::Variable);
        ctx.define_symbol("k", Value::Absolute(1)).unwrap();
        ctx.define_symbol("v", Value::Absolute(1)).unwrap();
        ctx.define_symbol("v", Value::Absolute(2)).unwrap();
        assert_eq!(ctx.changed_symbols(), ["k".to_string()]);
        ctx.begin_pass(Phase::Resolve, 2);
        ctx.define_symbol("k", Value::Absolute(1)).unwrap();
        assert!(ctx.changed_symbols().is_empty());
    }

    #[test]
    fn eval_now_rejects_forward_references() {
        let ctx = AsmContext::new(CpuVariant::M6809, BranchPolicy::Relax, 0);
        let err = ctx.eval_now(&expr("later+1"), "if").unwrap_err();
        assert_eq!(err.kind(), AsmErrorKind::Syntax);
        assert_eq!(ctx.eval_now(&expr("2*3"), "if").unwrap(), 6);
    }

    #[test]
    fn branch_policy_parses() {
        assert_eq!("Explicit".parse::<BranchPolicy>(), Ok(BranchPolicy::Explicit));
        assert!("fast".parse::<BranchPolicy>().is_err());
    }
}
