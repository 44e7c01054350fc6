// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Tokenizer for operand expressions with spans.
//!
//! Several characters mean different things depending on whether an operand
//! or an operator is expected: `*` is the current address or multiplication,
//! `%` starts a binary literal or is modulo, `@` starts an octal literal, and
//! `&` starts a decimal literal or is bitwise and. The tokenizer tracks that
//! state so the parser sees unambiguous tokens.

use crate::core::parser::ParseError;
use crate::core::text_utils::{is_ident_char, is_ident_start, is_space};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub col_start: usize,
    pub col_end: usize,
}

impl Span {
    /// Build a span from zero-based byte offsets; columns are stored one-based.
    pub fn new(line: u32, start: usize, end: usize) -> Self {
        Self {
            line,
            col_start: start + 1,
            col_end: end + 1,
        }
    }

    pub fn join(self, other: Span) -> Span {
        Span {
            line: self.line,
            col_start: self.col_start.min(other.col_start),
            col_end: self.col_end.max(other.col_end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier(String),
    Number(String),
    Char(u8),
    CurrentAddress,
    OpenParen,
    CloseParen,
    Operator(OperatorKind),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Plus,
    Minus,
    Multiply,
    Divide,
    Mod,
    Shl,
    Shr,
    BitNot,
    LogicNot,
    BitAnd,
    BitOr,
    BitXor,
    LogicAnd,
    LogicOr,
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Tokenizer over one operand expression.
///
/// `base_col` is the zero-based column of the first byte of `text` within the
/// source line, so spans point back into the original line.
pub struct Tokenizer<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
    line: u32,
    base_col: usize,
    expect_operand: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str, line: u32, base_col: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            text,
            pos: 0,
            line,
            base_col,
            expect_operand: true,
        }
    }

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.line, self.base_col + start, self.base_col + end)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::End;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        while self.pos < self.bytes.len() && is_space(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let start = self.pos;
        let Some(c) = self.peek_at(0) else {
            return Ok(Token {
                kind: TokenKind::End,
                span: self.span(start, start),
            });
        };

        let kind = if self.expect_operand {
            self.operand_token(c)?
        } else {
            self.operator_token(c)?
        };
        let span = self.span(start, self.pos);
        self.expect_operand = matches!(kind, TokenKind::Operator(_) | TokenKind::OpenParen);
        Ok(Token { kind, span })
    }

    fn operand_token(&mut self, c: u8) -> Result<TokenKind, ParseError> {
        let next = self.peek_at(1);
        match c {
            b'0'..=b'9' => Ok(self.number(self.pos)),
            b'$' if next.is_some_and(|n| n.is_ascii_hexdigit()) => Ok(self.prefixed_number()),
            b'%' if next.is_some_and(|n| n == b'0' || n == b'1') => Ok(self.prefixed_number()),
            b'@' if next.is_some_and(|n| (b'0'..=b'7').contains(&n)) => Ok(self.prefixed_number()),
            b'&' if next.is_some_and(|n| n.is_ascii_digit()) => Ok(self.prefixed_number()),
            b'*' | b'$' => {
                self.pos += 1;
                Ok(TokenKind::CurrentAddress)
            }
            b'\'' => {
                let Some(ch) = next else {
                    return Err(self.error("Missing character after quote", self.pos, self.pos + 1));
                };
                self.pos += 2;
                if self.peek_at(0) == Some(b'\'') {
                    self.pos += 1;
                }
                Ok(TokenKind::Char(ch))
            }
            b'(' => {
                self.pos += 1;
                Ok(TokenKind::OpenParen)
            }
            b'-' => self.single(OperatorKind::Minus),
            b'+' => self.single(OperatorKind::Plus),
            b'~' => self.single(OperatorKind::BitNot),
            b'!' => self.single(OperatorKind::LogicNot),
            _ if is_ident_start(c) => {
                let start = self.pos;
                self.pos += 1;
                while self.pos < self.bytes.len() && is_ident_char(self.bytes[self.pos]) {
                    self.pos += 1;
                }
                Ok(TokenKind::Identifier(self.text[start..self.pos].to_string()))
            }
            _ => Err(self.error(
                &format!("Unexpected character '{}'", c as char),
                self.pos,
                self.pos + 1,
            )),
        }
    }

    fn operator_token(&mut self, c: u8) -> Result<TokenKind, ParseError> {
        let next = self.peek_at(1);
        let two = |kind| -> Result<TokenKind, ParseError> { Ok(TokenKind::Operator(kind)) };
        match (c, next) {
            (b'<', Some(b'<')) => {
                self.pos += 2;
                two(OperatorKind::Shl)
            }
            (b'>', Some(b'>')) => {
                self.pos += 2;
                two(OperatorKind::Shr)
            }
            (b'<', Some(b'=')) => {
                self.pos += 2;
                two(OperatorKind::Le)
            }
            (b'>', Some(b'=')) => {
                self.pos += 2;
                two(OperatorKind::Ge)
            }
            (b'=', Some(b'=')) => {
                self.pos += 2;
                two(OperatorKind::Eq)
            }
            (b'!', Some(b'=')) | (b'<', Some(b'>')) => {
                self.pos += 2;
                two(OperatorKind::Ne)
            }
            (b'&', Some(b'&')) => {
                self.pos += 2;
                two(OperatorKind::LogicAnd)
            }
            (b'|', Some(b'|')) => {
                self.pos += 2;
                two(OperatorKind::LogicOr)
            }
            (b'+', _) => self.single(OperatorKind::Plus),
            (b'-', _) => self.single(OperatorKind::Minus),
            (b'*', _) => self.single(OperatorKind::Multiply),
            (b'/', _) => self.single(OperatorKind::Divide),
            (b'%', _) => self.single(OperatorKind::Mod),
            (b'&', _) => self.single(OperatorKind::BitAnd),
            (b'|', _) => self.single(OperatorKind::BitOr),
            (b'^', _) => self.single(OperatorKind::BitXor),
            (b'=', _) => self.single(OperatorKind::Eq),
            (b'<', _) => self.single(OperatorKind::Lt),
            (b'>', _) => self.single(OperatorKind::Gt),
            (b')', _) => {
                self.pos += 1;
                Ok(TokenKind::CloseParen)
            }
            _ => Err(self.error(
                &format!("Expected operator, found '{}'", c as char),
                self.pos,
                self.pos + 1,
            )),
        }
    }

    fn single(&mut self, kind: OperatorKind) -> Result<TokenKind, ParseError> {
        self.pos += 1;
        Ok(TokenKind::Operator(kind))
    }

    fn prefixed_number(&mut self) -> TokenKind {
        let start = self.pos;
        self.pos += 1;
        self.number(start)
    }

    fn number(&mut self, start: usize) -> TokenKind {
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        TokenKind::Number(self.text[start..self.pos].to_string())
    }

    fn error(&self, message: &str, start: usize, end: usize) -> ParseError {
        ParseError::new(message, self.span(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        Tokenizer::new(text, 1, 0)
            .tokenize()
            .expect("tokenize")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn star_is_address_in_operand_position_and_multiply_otherwise() {
        assert_eq!(
            kinds("*+2*3"),
            vec![
                TokenKind::CurrentAddress,
                TokenKind::Operator(OperatorKind::Plus),
                TokenKind::Number("2".to_string()),
                TokenKind::Operator(OperatorKind::Multiply),
                TokenKind::Number("3".to_string()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn percent_is_binary_prefix_or_modulo() {
        assert_eq!(
            kinds("%101%7"),
            vec![
                TokenKind::Number("%101".to_string()),
                TokenKind::Operator(OperatorKind::Mod),
                TokenKind::Number("7".to_string()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn char_constants_accept_optional_closing_quote() {
        assert_eq!(kinds("'A")[0], TokenKind::Char(b'A'));
        assert_eq!(kinds("'A'")[0], TokenKind::Char(b'A'));
        assert_eq!(kinds("',")[0], TokenKind::Char(b','));
    }

    #[test]
    fn spans_are_offset_by_base_column() {
        let tokens = Tokenizer::new("foo+1", 7, 10).tokenize().expect("tokenize");
        assert_eq!(tokens[0].span, Span { line: 7, col_start: 11, col_end: 14 });
    }
}
