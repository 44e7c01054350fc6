// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source excerpt highlighting for diagnostics and listings.

/// Render `line` with the character at one-based `column` marked.
///
/// With colour enabled the character is wrapped in ANSI red; otherwise the
/// line is returned unchanged and callers draw their own caret.
pub fn highlight_line(line: &str, column: Option<usize>, use_color: bool) -> String {
    match column {
        Some(col) if col > 0 && use_color => {
            let idx = col - 1;
            if idx >= line.len() || !line.is_char_boundary(idx) {
                return format!("{line}\x1b[31m^\x1b[0m");
            }
            let (head, tail) = line.split_at(idx);
            let ch = tail.chars().next().unwrap_or(' ');
            let rest = &tail[ch.len_utf8()..];
            format!("{head}\x1b[31m{ch}\x1b[0m{rest}")
        }
        _ => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::highlight_line;

    #[test]
    fn plain_output_leaves_line_untouched() {
        assert_eq!(highlight_line("  lda #1", Some(3), false), "  lda #1");
    }

    #[test]
    fn colour_wraps_the_marked_character() {
        assert_eq!(
            highlight_line("ab", Some(2), true),
            "a\x1b[31mb\x1b[0m"
        );
        assert_eq!(highlight_line("ab", Some(9), true), "ab\x1b[31m^\x1b[0m");
    }
}
