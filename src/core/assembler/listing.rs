// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Listing file generation.

use std::io::Write;

use crate::core::symbol_table::SymbolTable;

use super::error::PassCounts;

/// Data for a single listing line.
pub struct ListingLine<'a> {
    pub addr: u32,
    pub bytes: &'a [u8],
    pub reserved: u32,
    /// Value shown for `equ`/`set` lines instead of an address.
    pub value: Option<i64>,
    pub line_num: u32,
    pub source: &'a str,
    pub section: Option<&'a str>,
}

/// Writer for listing file output.
pub struct ListingWriter<W: Write> {
    out: W,
}

/// Bytes shown on one listing row; longer lines continue on extra rows.
const BYTES_PER_ROW: usize = 7;

impl<W: Write> ListingWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn header(&mut self, title: &str) -> std::io::Result<()> {
        writeln!(self.out, "{title}")?;
        writeln!(self.out, "ADDR    BYTES                    LINE  SOURCE")?;
        writeln!(self.out, "------  -----------------------  ----  ------")?;
        Ok(())
    }

    pub fn write_line(&mut self, line: ListingLine<'_>) -> std::io::Result<()> {
        let (loc, bytes_col) = if let Some(value) = line.value {
            (String::new(), format!("= {}", format_addr((value & 0xFFFF_FFFF) as u32)))
        } else if line.reserved > 0 {
            (
                format_addr(line.addr),
                format!("+{}", format_addr(line.reserved)),
            )
        } else if line.bytes.is_empty() {
            (String::new(), String::new())
        } else {
            let head = &line.bytes[..line.bytes.len().min(BYTES_PER_ROW)];
            (format_addr(line.addr), format_bytes(head))
        };

        let loc = if loc.is_empty() {
            "----".to_string()
        } else {
            loc
        };
        let section_suffix = line
            .section
            .map(|name| format!("  ; [section {name}]"))
            .unwrap_or_default();

        writeln!(
            self.out,
            "{:<6}  {:<23}  {:>4}  {}{}",
            loc, bytes_col, line.line_num, line.source, section_suffix
        )?;

        if line.value.is_none() && line.bytes.len() > BYTES_PER_ROW {
            for (idx, chunk) in line.bytes[BYTES_PER_ROW..]
                .chunks(BYTES_PER_ROW)
                .enumerate()
            {
                let addr = line
                    .addr
                    .wrapping_add(((idx + 1) * BYTES_PER_ROW) as u32);
                writeln!(self.out, "{:<6}  {}", format_addr(addr), format_bytes(chunk))?;
            }
        }
        Ok(())
    }

    pub fn footer(
        &mut self,
        counts: &PassCounts,
        symbols: &SymbolTable,
        total_mem: usize,
    ) -> std::io::Result<()> {
        writeln!(
            self.out,
            "\nLines: {}  Errors: {}  Warnings: {}",
            counts.lines, counts.errors, counts.warnings
        )?;
        writeln!(self.out, "\nSYMBOL TABLE\n")?;
        symbols.dump(&mut self.out)?;
        writeln!(self.out, "\nTotal memory is {} bytes", total_mem)?;
        Ok(())
    }
}

fn format_addr(addr: u32) -> String {
    if addr <= 0xFFFF {
        format!("{addr:04X}")
    } else if addr <= 0xFF_FFFF {
        format!("{addr:06X}")
    } else {
        format!("{addr:08X}")
    }
}

/// Format bytes as hex string for listing.
pub fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{ListingLine, ListingWriter};
    use crate::core::assembler::error::PassCounts;
    use crate::core::symbol_table::{SymbolKind, SymbolTable};
    use crate::core::expr::Value;

    fn render(line: ListingLine<'_>) -> String {
        let mut out = Vec::new();
        ListingWriter::new(&mut out)
            .write_line(line)
            .expect("write listing line");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn equ_lines_show_value_instead_of_address() {
        let text = render(ListingLine {
            addr: 0,
            bytes: &[],
            reserved: 0,
            value: Some(0x1234),
            line_num: 1,
            source: "size equ $1234",
            section: None,
        });
        assert!(text.starts_with("----"));
        assert!(text.contains("= 1234"));
    }

    #[test]
    fn reserve_lines_show_reserved_count() {
        let text = render(ListingLine {
            addr: 0x0200,
            bytes: &[],
            reserved: 0x10,
            value: None,
            line_num: 2,
            source: "buf rmb 16",
            section: Some("bss"),
        });
        assert!(text.starts_with("0200"));
        assert!(text.contains("+0010"));
        assert!(text.contains("[section bss]"));
    }

    #[test]
    fn long_byte_runs_wrap_onto_continuation_rows() {
        let bytes: Vec<u8> = (0..10).collect();
        let text = render(ListingLine {
            addr: 0x1000,
            bytes: &bytes,
            reserved: 0,
            value: None,
            line_num: 3,
            source: " fcb 0,1,2,3,4,5,6,7,8,9",
            section: None,
        });
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("1000    00 01 02 03 04 05 06"));
        assert_eq!(rows[1], "1007    07 08 09");
    }

    #[test]
    fn footer_dumps_symbols() {
        let mut symbols = SymbolTable::new();
        let _ = symbols.declare("start", SymbolKind::Label);
        let _ = symbols.assign("start", Value::Absolute(0x8000));
        let mut out = Vec::new();
        ListingWriter::new(&mut out)
            .footer(&PassCounts { lines: 3, errors: 0, warnings: 1 }, &symbols, 12)
            .expect("footer");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("Lines: 3  Errors: 0  Warnings: 1"));
        assert!(text.contains("start"));
        assert!(text.contains("Total memory is 12 bytes"));
    }
}
