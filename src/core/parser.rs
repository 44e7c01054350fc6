// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression AST and recursive-descent expression parser.

use std::fmt;

use crate::core::tokenizer::{OperatorKind, Span, Token, TokenKind, Tokenizer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(String, Span),
    Identifier(String, Span),
    /// Character constant bytes (`'A`).
    String(Vec<u8>, Span),
    /// `*` (or a lone `$`): the address of the current line.
    CurrentAddress(Span),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    LogicNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    LogicAnd,
    LogicOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number(_, span)
            | Expr::Identifier(_, span)
            | Expr::String(_, span)
            | Expr::CurrentAddress(span) => *span,
            Expr::Unary { span, expr, .. } => span.join(expr.span()),
            Expr::Binary { left, right, .. } => left.span().join(right.span()),
        }
    }

    /// Visit every symbol name referenced by the expression.
    pub fn visit_identifiers(&self, f: &mut dyn FnMut(&str)) {
        match self {
            Expr::Identifier(name, _) => f(name),
            Expr::Unary { expr, .. } => expr.visit_identifiers(f),
            Expr::Binary { left, right, .. } => {
                left.visit_identifiers(f);
                right.visit_identifiers(f);
            }
            Expr::Number(..) | Expr::String(..) | Expr::CurrentAddress(_) => {}
        }
    }

    /// Returns the symbol name if the expression is a bare identifier.
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expr::Identifier(name, _) => Some(name),
            _ => None,
        }
    }
}

/// Error produced while parsing operand text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a complete expression from `text`.
///
/// `line` and `base_col` locate `text` in the source for error spans.
pub fn parse_expr(text: &str, line: u32, base_col: usize) -> Result<Expr, ParseError> {
    let tokens = Tokenizer::new(text, line, base_col).tokenize()?;
    let mut parser = ExprParser { tokens, index: 0 };
    if parser.at_end() {
        return Err(ParseError::new(
            "Expected expression",
            Span::new(line, base_col, base_col + 1),
        ));
    }
    let expr = parser.parse_logical_or()?;
    match parser.peek() {
        Some(token) if token.kind != TokenKind::End => Err(ParseError::new(
            "Unexpected trailing text in expression",
            token.span,
        )),
        _ => Ok(expr),
    }
}

struct ExprParser {
    tokens: Vec<Token>,
    index: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn at_end(&self) -> bool {
        self.peek().map_or(true, |token| token.kind == TokenKind::End)
    }

    fn peek_operator_kind(&self) -> Option<OperatorKind> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Operator(op),
                ..
            }) => Some(*op),
            _ => None,
        }
    }

    fn prev_span(&self) -> Span {
        self.index
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .map(|token| token.span)
            .unwrap_or_default()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn binary_level(
        &mut self,
        ops: &[(OperatorKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut node = next(self)?;
        loop {
            let Some(op) = self
                .peek_operator_kind()
                .and_then(|kind| ops.iter().find(|(k, _)| *k == kind).map(|(_, op)| *op))
            else {
                break;
            };
            self.index += 1;
            let op_span = self.prev_span();
            let right = next(self)?;
            node = Expr::Binary {
                op,
                left: Box::new(node),
                right: Box::new(right),
                span: op_span,
            };
        }
        Ok(node)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[(OperatorKind::LogicOr, BinaryOp::LogicOr)],
            Self::parse_logical_and,
        )
    }

    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[(OperatorKind::LogicAnd, BinaryOp::LogicAnd)],
            Self::parse_bit_or,
        )
    }

    fn parse_bit_or(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[(OperatorKind::BitOr, BinaryOp::BitOr)], Self::parse_bit_xor)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[(OperatorKind::BitXor, BinaryOp::BitXor)],
            Self::parse_bit_and,
        )
    }

    fn parse_bit_and(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[(OperatorKind::BitAnd, BinaryOp::BitAnd)],
            Self::parse_compare,
        )
    }

    fn parse_compare(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (OperatorKind::Eq, BinaryOp::Eq),
                (OperatorKind::Ne, BinaryOp::Ne),
                (OperatorKind::Lt, BinaryOp::Lt),
                (OperatorKind::Le, BinaryOp::Le),
                (OperatorKind::Gt, BinaryOp::Gt),
                (OperatorKind::Ge, BinaryOp::Ge),
            ],
            Self::parse_shift,
        )
    }

    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (OperatorKind::Shl, BinaryOp::Shl),
                (OperatorKind::Shr, BinaryOp::Shr),
            ],
            Self::parse_sum,
        )
    }

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (OperatorKind::Plus, BinaryOp::Add),
                (OperatorKind::Minus, BinaryOp::Subtract),
            ],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (OperatorKind::Multiply, BinaryOp::Multiply),
                (OperatorKind::Divide, BinaryOp::Divide),
                (OperatorKind::Mod, BinaryOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(op) = match self.peek_operator_kind() {
            Some(OperatorKind::Plus) => Some(UnaryOp::Plus),
            Some(OperatorKind::Minus) => Some(UnaryOp::Minus),
            Some(OperatorKind::BitNot) => Some(UnaryOp::BitNot),
            Some(OperatorKind::LogicNot) => Some(UnaryOp::LogicNot),
            _ => None,
        } {
            self.index += 1;
            let span = self.prev_span();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
                span,
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let fallback = self.prev_span();
        match self.next() {
            Some(Token {
                kind: TokenKind::Number(text),
                span,
            }) => Ok(Expr::Number(text, span)),
            Some(Token {
                kind: TokenKind::Identifier(name),
                span,
            }) => Ok(Expr::Identifier(name, span)),
            Some(Token {
                kind: TokenKind::Char(ch),
                span,
            }) => Ok(Expr::String(vec![ch], span)),
            Some(Token {
                kind: TokenKind::CurrentAddress,
                span,
            }) => Ok(Expr::CurrentAddress(span)),
            Some(Token {
                kind: TokenKind::OpenParen,
                span: open,
            }) => {
                let expr = self.parse_logical_or()?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::CloseParen,
                        ..
                    }) => Ok(expr),
                    Some(token) => Err(ParseError::new("Expected ')'", token.span)),
                    None => Err(ParseError::new("Expected ')'", open)),
                }
            }
            Some(Token {
                kind: TokenKind::End,
                span,
            }) => Err(ParseError::new("Unexpected end of expression", span)),
            Some(token) => Err(ParseError::new("Unexpected token in expression", token.span)),
            None => Err(ParseError::new("Unexpected end of expression", fallback)),
        }
    }
}
