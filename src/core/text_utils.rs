// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source line splitting and operand-field scanning helpers.

/// Check if a byte can start a symbol name.
#[inline]
pub fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || matches!(c, b'_' | b'.' | b'@' | b'?')
}

/// Check if a byte is a valid symbol continuation character.
#[inline]
pub fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'.' | b'$' | b'@' | b'?')
}

/// Check if a byte is whitespace (space or tab).
#[inline]
pub fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

pub fn is_valid_symbol(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.first() {
        Some(&first) => is_ident_start(first) && bytes[1..].iter().all(|&c| is_ident_char(c)),
        None => false,
    }
}

/// One source line broken into its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitLine<'a> {
    pub label: Option<&'a str>,
    pub mnemonic: Option<&'a str>,
    /// Everything after the mnemonic, comments included.
    pub operand: &'a str,
    /// Zero-based column of `operand` within the line.
    pub operand_col: usize,
}

/// Split a line into label, mnemonic and the raw operand text.
///
/// Returns `None` for blank and comment-only lines. A label must start in
/// column one; a leading `*` or `;` marks the whole line as a comment.
pub fn split_line(text: &str) -> Option<SplitLine<'_>> {
    let bytes = text.as_bytes();
    let first = *bytes.first()?;
    if first == b'*' || first == b';' {
        return None;
    }
    let mut pos = 0usize;
    let mut label = None;
    if !is_space(first) {
        while pos < bytes.len() && !is_space(bytes[pos]) && bytes[pos] != b':' {
            pos += 1;
        }
        label = Some(&text[..pos]);
        if pos < bytes.len() && bytes[pos] == b':' {
            pos += 1;
        }
    }
    while pos < bytes.len() && is_space(bytes[pos]) {
        pos += 1;
    }
    if pos >= bytes.len() || bytes[pos] == b';' {
        if label.is_none() {
            return None;
        }
        return Some(SplitLine {
            label,
            mnemonic: None,
            operand: "",
            operand_col: pos,
        });
    }
    let mnemonic_start = pos;
    while pos < bytes.len() && !is_space(bytes[pos]) {
        pos += 1;
    }
    let mnemonic = &text[mnemonic_start..pos];
    while pos < bytes.len() && is_space(bytes[pos]) {
        pos += 1;
    }
    Some(SplitLine {
        label,
        mnemonic: Some(mnemonic),
        operand: text[pos..].trim_end(),
        operand_col: pos,
    })
}

/// Return the leading operand field of `rest`: text up to the first
/// whitespace or `;` that is not inside quotes, parentheses or brackets.
pub fn operand_field(rest: &str) -> &str {
    let bytes = rest.as_bytes();
    let mut depth = 0usize;
    let mut in_double = false;
    let mut idx = 0usize;
    while idx < bytes.len() {
        let c = bytes[idx];
        if in_double {
            if c == b'"' {
                in_double = false;
            }
            idx += 1;
            continue;
        }
        match c {
            b'"' => in_double = true,
            b'\'' => {
                idx += 2;
                continue;
            }
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b';' => break,
            _ if is_space(c) && depth == 0 => break,
            _ => {}
        }
        idx += 1;
    }
    &rest[..idx.min(bytes.len())]
}

/// Split an operand field at top-level commas. Each part is returned with its
/// byte offset within `field`.
pub fn split_operands(field: &str) -> Vec<(&str, usize)> {
    let bytes = field.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_double = false;
    let mut start = 0usize;
    let mut idx = 0usize;
    while idx < bytes.len() {
        let c = bytes[idx];
        if in_double {
            if c == b'"' {
                in_double = false;
            }
            idx += 1;
            continue;
        }
        match c {
            b'"' => in_double = true,
            b'\'' => {
                idx += 2;
                continue;
            }
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                parts.push((&field[start..idx], start));
                start = idx + 1;
            }
            _ => {}
        }
        idx += 1;
    }
    parts.push((&field[start.min(bytes.len())..], start.min(bytes.len())));
    parts
}

/// Parse a delimited string such as `/text/` or `"text"`. The first
/// non-blank character is the delimiter. Returns the bytes and the number of
/// bytes of `rest` consumed.
pub fn parse_delimited(rest: &str) -> Result<(Vec<u8>, usize), &'static str> {
    let bytes = rest.as_bytes();
    let mut pos = 0usize;
    while pos < bytes.len() && is_space(bytes[pos]) {
        pos += 1;
    }
    let Some(&delim) = bytes.get(pos) else {
        return Err("Missing string operand");
    };
    let start = pos + 1;
    let Some(len) = bytes[start..].iter().position(|&c| c == delim) else {
        return Err("Unterminated string");
    };
    Ok((bytes[start..start + len].to_vec(), start + len + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_line_handles_label_mnemonic_and_operand() {
        let line = split_line("loop: bra loop  ; spin").expect("line");
        assert_eq!(line.label, Some("loop"));
        assert_eq!(line.mnemonic, Some("bra"));
        assert_eq!(operand_field(line.operand), "loop");
        assert_eq!(line.operand_col, 10);
    }

    #[test]
    fn split_line_skips_comments_and_blank_lines() {
        assert!(split_line("* full line comment").is_none());
        assert!(split_line("; another").is_none());
        assert!(split_line("").is_none());
        assert!(split_line("    ").is_none());
    }

    #[test]
    fn label_only_line_has_no_mnemonic() {
        let line = split_line("start").expect("line");
        assert_eq!(line.label, Some("start"));
        assert_eq!(line.mnemonic, None);
    }

    #[test]
    fn operand_field_stops_at_whitespace_outside_brackets() {
        assert_eq!(operand_field("[ 5 , x] comment"), "[ 5 , x]");
        assert_eq!(operand_field("#' ,x rest"), "#' ,x");
    }

    #[test]
    fn split_operands_respects_nesting() {
        let parts: Vec<&str> = split_operands("(1,2),[a,b],c")
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(parts, vec!["(1,2)", "[a,b]", "c"]);
        assert_eq!(split_operands(",x")[1], ("x", 1));
    }

    #[test]
    fn parse_delimited_uses_first_character_as_delimiter() {
        assert_eq!(
            parse_delimited(" /hi there/ trailing"),
            Ok((b"hi there".to_vec(), 11))
        );
        assert!(parse_delimited("\"open").is_err());
    }
}
