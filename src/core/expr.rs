// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression evaluation over absolute and relocatable values.
//!
//! A value is either an absolute number or an offset from a base that only
//! the linker can place: a relocatable section or an external symbol.
//! Evaluation distinguishes symbols that are merely not known *yet* (pending,
//! resolved by a later pass) from symbols that will never be known.

use std::fmt;

use crate::core::parser::{BinaryOp, Expr, UnaryOp};
use crate::core::tokenizer::Span;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelocBase {
    Section(String),
    External(String),
}

impl fmt::Display for RelocBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelocBase::Section(name) => write!(f, "section {name}"),
            RelocBase::External(name) => write!(f, "extern {name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Absolute(i64),
    Relocatable { base: RelocBase, offset: i64 },
}

impl Value {
    pub fn absolute(&self) -> Option<i64> {
        match self {
            Value::Absolute(v) => Some(*v),
            Value::Relocatable { .. } => None,
        }
    }

    pub fn is_relocatable(&self) -> bool {
        matches!(self, Value::Relocatable { .. })
    }

    /// The numeric part of the value: the absolute value or the base offset.
    pub fn offset(&self) -> i64 {
        match self {
            Value::Absolute(v) => *v,
            Value::Relocatable { offset, .. } => *offset,
        }
    }

    pub fn section(&self) -> Option<&str> {
        match self {
            Value::Relocatable {
                base: RelocBase::Section(name),
                ..
            } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absolute(v) => write!(f, "${:04X}", v),
            Value::Relocatable { base, offset } => write!(f, "{base}+${:04X}", offset),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// A symbol has no value yet; a later pass may supply one.
    Pending,
    /// A symbol is not defined and never will be.
    Undefined,
    Invalid,
}

/// Error returned from expression evaluation.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(kind: EvalErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.kind == EvalErrorKind::Pending
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Result of looking a symbol up during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolLookup {
    Value(Value),
    Pending,
    Undefined,
}

/// Context for expression evaluation.
pub trait EvalContext {
    fn lookup_symbol(&self, name: &str) -> SymbolLookup;

    /// Address of the line being processed (`*`).
    fn current_address(&self) -> Option<Value>;
}

/// Evaluate an expression to a value.
pub fn eval_expr(expr: &Expr, ctx: &dyn EvalContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(text, span) => parse_number(text).map(Value::Absolute).ok_or_else(|| {
            EvalError::with_span(
                EvalErrorKind::Invalid,
                format!("Invalid number: {}", text),
                *span,
            )
        }),

        Expr::Identifier(name, span) => match ctx.lookup_symbol(name) {
            SymbolLookup::Value(value) => Ok(value),
            SymbolLookup::Pending => Err(EvalError::with_span(
                EvalErrorKind::Pending,
                format!("Symbol not yet defined: {}", name),
                *span,
            )),
            SymbolLookup::Undefined => Err(EvalError::with_span(
                EvalErrorKind::Undefined,
                format!("Undefined symbol: {}", name),
                *span,
            )),
        },

        Expr::CurrentAddress(span) => ctx.current_address().ok_or_else(|| {
            EvalError::with_span(
                EvalErrorKind::Pending,
                "Current address (*) not available here",
                *span,
            )
        }),

        Expr::String(bytes, span) => match bytes.as_slice() {
            [b] => Ok(Value::Absolute(*b as i64)),
            [hi, lo] => Ok(Value::Absolute(((*hi as i64) << 8) | (*lo as i64))),
            [] => Err(EvalError::with_span(
                EvalErrorKind::Invalid,
                "Empty string not allowed in expression",
                *span,
            )),
            _ => Err(EvalError::with_span(
                EvalErrorKind::Invalid,
                "Multi-character string not allowed in expression",
                *span,
            )),
        },

        Expr::Unary { op, expr, span } => {
            let val = eval_expr(expr, ctx)?;
            match (op, val) {
                (UnaryOp::Plus, val) => Ok(val),
                (_, Value::Absolute(v)) => Ok(Value::Absolute(apply_unary(*op, v))),
                _ => Err(relocation_misuse(*span)),
            }
        }

        Expr::Binary {
            op,
            left,
            right,
            span,
        } => {
            let l = eval_expr(left, ctx)?;
            let r = eval_expr(right, ctx)?;
            combine(*op, l, r, *span)
        }
    }
}

fn relocation_misuse(span: Span) -> EvalError {
    EvalError::with_span(
        EvalErrorKind::Invalid,
        "Invalid operation on relocatable value",
        span,
    )
}

/// Combine two values, enforcing the relocatable arithmetic rules.
pub fn combine(op: BinaryOp, l: Value, r: Value, span: Span) -> Result<Value, EvalError> {
    match (op, l, r) {
        (_, Value::Absolute(a), Value::Absolute(b)) => {
            apply_binary(op, a, b, span).map(Value::Absolute)
        }
        (BinaryOp::Add, Value::Relocatable { base, offset }, Value::Absolute(b))
        | (BinaryOp::Add, Value::Absolute(b), Value::Relocatable { base, offset }) => {
            Ok(Value::Relocatable {
                base,
                offset: offset.wrapping_add(b),
            })
        }
        (BinaryOp::Subtract, Value::Relocatable { base, offset }, Value::Absolute(b)) => {
            Ok(Value::Relocatable {
                base,
                offset: offset.wrapping_sub(b),
            })
        }
        (
            BinaryOp::Subtract,
            Value::Relocatable {
                base: left_base,
                offset: a,
            },
            Value::Relocatable {
                base: right_base,
                offset: b,
            },
        ) if left_base == right_base => Ok(Value::Absolute(a.wrapping_sub(b))),
        _ => Err(relocation_misuse(span)),
    }
}

/// Apply a unary operator to a value.
pub fn apply_unary(op: UnaryOp, val: i64) -> i64 {
    match op {
        UnaryOp::Plus => val,
        UnaryOp::Minus => val.wrapping_neg(),
        UnaryOp::BitNot => !val,
        UnaryOp::LogicNot => (val == 0) as i64,
    }
}

fn shift_count(r: i64, span: Span) -> Result<u32, EvalError> {
    match u32::try_from(r) {
        Ok(n) if n < 64 => Ok(n),
        _ => Err(EvalError::with_span(
            EvalErrorKind::Invalid,
            format!("Shift count out of range: {r}"),
            span,
        )),
    }
}

/// Apply a binary operator to two values.
pub fn apply_binary(op: BinaryOp, l: i64, r: i64, span: Span) -> Result<i64, EvalError> {
    Ok(match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Subtract => l.wrapping_sub(r),
        BinaryOp::Multiply => l.wrapping_mul(r),
        BinaryOp::Divide => {
            if r == 0 {
                return Err(EvalError::with_span(
                    EvalErrorKind::Invalid,
                    "Division by zero",
                    span,
                ));
            }
            l / r
        }
        BinaryOp::Mod => {
            if r == 0 {
                return Err(EvalError::with_span(
                    EvalErrorKind::Invalid,
                    "Modulo by zero",
                    span,
                ));
            }
            l % r
        }
        BinaryOp::BitAnd => l & r,
        BinaryOp::BitOr => l | r,
        BinaryOp::BitXor => l ^ r,
        BinaryOp::Shl => shift_count(r, span).map(|n| l << n)?,
        BinaryOp::Shr => shift_count(r, span).map(|n| ((l as u64) >> n) as i64)?,
        BinaryOp::Eq => (l == r) as i64,
        BinaryOp::Ne => (l != r) as i64,
        BinaryOp::Lt => (l < r) as i64,
        BinaryOp::Le => (l <= r) as i64,
        BinaryOp::Gt => (l > r) as i64,
        BinaryOp::Ge => (l >= r) as i64,
        BinaryOp::LogicAnd => ((l != 0) && (r != 0)) as i64,
        BinaryOp::LogicOr => ((l != 0) || (r != 0)) as i64,
    })
}

/// Parse a number literal.
///
/// Supports:
/// - Decimal: `42`, `&42`, `42d`
/// - Hex: `$2A`, `0x2A`, `2Ah`
/// - Binary: `%101010`, `0b101010`, `101010b`
/// - Octal: `@52`, `0o52`, `52o`, `52q`
pub fn parse_number(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (is_neg, text) = if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else {
        (false, text)
    };

    let text: String = text.chars().filter(|&c| c != '_').collect();
    let text = text.as_str();

    // Prefix forms win over suffix heuristics so `$BB` stays hex.
    let val = if let Some(hex) = text.strip_prefix('$') {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = text.strip_prefix('%') {
        i64::from_str_radix(bin, 2).ok()?
    } else if let Some(oct) = text.strip_prefix('@') {
        i64::from_str_radix(oct, 8).ok()?
    } else if let Some(dec) = text.strip_prefix('&') {
        dec.parse::<i64>().ok()?
    } else if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        i64::from_str_radix(oct, 8).ok()?
    } else if text.ends_with('h') || text.ends_with('H') {
        i64::from_str_radix(&text[..text.len() - 1], 16).ok()?
    } else if let Some(bin) = text
        .strip_prefix("0b")
        .or_else(|| text.strip_prefix("0B"))
        .filter(|bin| !bin.is_empty() && bin.chars().all(|c| c == '0' || c == '1'))
    {
        i64::from_str_radix(bin, 2).ok()?
    } else if text.ends_with('b') || text.ends_with('B') {
        let inner = &text[..text.len() - 1];
        if inner.chars().all(|c| c == '0' || c == '1') {
            i64::from_str_radix(inner, 2).ok()?
        } else {
            return None;
        }
    } else if text.ends_with('o')
        || text.ends_with('O')
        || text.ends_with('q')
        || text.ends_with('Q')
    {
        i64::from_str_radix(&text[..text.len() - 1], 8).ok()?
    } else if text.ends_with('d') || text.ends_with('D') {
        text[..text.len() - 1].parse::<i64>().ok()?
    } else {
        text.parse::<i64>().ok()?
    };

    Some(if is_neg { -val } else { val })
}

/// Returns true if the value fits in a signed or unsigned 8-bit byte (-128..=255).
pub fn value_fits_byte(value: i64) -> bool {
    (-128..=0xff).contains(&value)
}

/// Returns true if the value fits in a signed or unsigned 16-bit word (-32768..=65535).
pub fn value_fits_word(value: i64) -> bool {
    (-32768..=0xffff).contains(&value)
}

/// Render a value for a diagnostic: hex when non-negative, signed decimal
/// otherwise.
pub fn display_value(value: i64) -> String {
    if value < 0 {
        value.to_string()
    } else {
        format!("${value:X}")
    }
}

/// Returns true if the value fits a signed 8-bit displacement.
pub fn fits_i8(value: i64) -> bool {
    (-128..=127).contains(&value)
}

/// Returns true if the value fits a signed 5-bit indexed offset.
pub fn fits_i5(value: i64) -> bool {
    (-16..=15).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_expr;
    use proptest::prelude::*;
    use std::collections::HashMap;

    struct MapContext {
        symbols: HashMap<&'static str, Value>,
        here: Option<Value>,
    }

    impl EvalContext for MapContext {
        fn lookup_symbol(&self, name: &str) -> SymbolLookup {
            match self.symbols.get(name) {
                Some(v) => SymbolLookup::Value(v.clone()),
                None if name.starts_with("later") => SymbolLookup::Pending,
                None => SymbolLookup::Undefined,
            }
        }

        fn current_address(&self) -> Option<Value> {
            self.here.clone()
        }
    }

    fn ctx() -> MapContext {
        let mut symbols = HashMap::new();
        symbols.insert("ten", Value::Absolute(10));
        symbols.insert(
            "code",
            Value::Relocatable {
                base: RelocBase::Section("code".to_string()),
                offset: 0x20,
            },
        );
        symbols.insert(
            "code2",
            Value::Relocatable {
                base: RelocBase::Section("code".to_string()),
                offset: 0x28,
            },
        );
        symbols.insert(
            "ext",
            Value::Relocatable {
                base: RelocBase::External("ext".to_string()),
                offset: 0,
            },
        );
        MapContext {
            symbols,
            here: Some(Value::Absolute(0x100)),
        }
    }

    fn eval(text: &str) -> Result<Value, EvalError> {
        let expr = parse_expr(text, 1, 0).expect("parse");
        eval_expr(&expr, &ctx())
    }

    #[test]
    fn parse_number_forms() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("&42"), Some(42));
        assert_eq!(parse_number("$2A"), Some(42));
        assert_eq!(parse_number("0x2a"), Some(42));
        assert_eq!(parse_number("2Ah"), Some(42));
        assert_eq!(parse_number("%101010"), Some(42));
        assert_eq!(parse_number("101010b"), Some(42));
        assert_eq!(parse_number("@52"), Some(42));
        assert_eq!(parse_number("52q"), Some(42));
        assert_eq!(parse_number("$BB"), Some(0xBB));
        assert_eq!(parse_number("1_000"), Some(1000));
        assert_eq!(parse_number("12z"), None);
    }

    #[test]
    fn arithmetic_and_current_address() {
        assert_eq!(eval("ten*2+1").unwrap(), Value::Absolute(21));
        assert_eq!(eval("*+2").unwrap(), Value::Absolute(0x102));
        assert_eq!(eval("'A+1").unwrap(), Value::Absolute(0x42));
        assert_eq!(eval("1<<4|1").unwrap(), Value::Absolute(17));
    }

    #[test]
    fn diagnostic_values_keep_their_sign() {
        assert_eq!(display_value(0x7F), "$7F");
        assert_eq!(display_value(-129), "-129");
    }

    #[test]
    fn shift_counts_must_fit_the_value_width() {
        assert_eq!(eval("1<<32").unwrap(), Value::Absolute(1 << 32));
        assert_eq!(eval("$8000>>15").unwrap(), Value::Absolute(1));
        let err = eval("1<<70").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::Invalid);
        assert!(err.message.contains("70"));
        assert!(eval("4>>64").is_err());
        assert!(eval("1<<-1").is_err());
    }

    #[test]
    fn relocatable_arithmetic_rules() {
        assert_eq!(
            eval("code+4").unwrap(),
            Value::Relocatable {
                base: RelocBase::Section("code".to_string()),
                offset: 0x24,
            }
        );
        assert_eq!(eval("code2-code").unwrap(), Value::Absolute(8));
        assert_eq!(
            eval("ext-2").unwrap(),
            Value::Relocatable {
                base: RelocBase::External("ext".to_string()),
                offset: -2,
            }
        );
        assert_eq!(eval("code*2").unwrap_err().kind, EvalErrorKind::Invalid);
        assert_eq!(eval("ext-code").unwrap_err().kind, EvalErrorKind::Invalid);
        assert_eq!(eval("-ext").unwrap_err().kind, EvalErrorKind::Invalid);
    }

    #[test]
    fn pending_and_undefined_are_distinguished() {
        assert_eq!(eval("later_label+1").unwrap_err().kind, EvalErrorKind::Pending);
        assert_eq!(eval("nowhere").unwrap_err().kind, EvalErrorKind::Undefined);
    }

    #[test]
    fn division_by_zero() {
        let span = Span::default();
        assert!(apply_binary(BinaryOp::Divide, 10, 0, span).is_err());
        assert!(apply_binary(BinaryOp::Mod, 10, 0, span).is_err());
    }

    #[test]
    fn range_helpers() {
        assert!(value_fits_byte(255) && value_fits_byte(-128) && !value_fits_byte(256));
        assert!(value_fits_word(-32768) && !value_fits_word(65536));
        assert!(fits_i8(-128) && !fits_i8(128));
        assert!(fits_i5(-16) && fits_i5(15) && !fits_i5(16));
    }

    proptest! {
        #[test]
        fn parse_number_decimal_round_trip_u32(value in any::<u32>()) {
            prop_assert_eq!(parse_number(&value.to_string()), Some(value as i64));
        }

        #[test]
        fn parse_number_dollar_hex_round_trip_u32(value in any::<u32>()) {
            let text = format!("${:X}", value);
            prop_assert_eq!(parse_number(&text), Some(value as i64));
        }

        #[test]
        fn parse_number_percent_binary_round_trip_u16(value in any::<u16>()) {
            let text = format!("%{:b}", value);
            prop_assert_eq!(parse_number(&text), Some(value as i64));
        }
    }
}
