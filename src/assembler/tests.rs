// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::{Assembler, AssemblerConfig, Assembly};
use crate::core::assembler::context::BranchPolicy;
use crate::core::assembler::error::{AsmErrorKind, AsmRunError, Severity};
use crate::core::cpu::CpuVariant;
use crate::core::expr::{RelocBase, Value};
use crate::core::line::{RelocKind, RelocTarget, Relocation};
use crate::core::source_map::SourceLine;

fn config(cpu: CpuVariant) -> AssemblerConfig {
    AssemblerConfig {
        cpu,
        ..AssemblerConfig::default()
    }
}

fn run_with(config: AssemblerConfig, lines: &[&str]) -> Result<Assembly, AsmRunError> {
    let assembler = Assembler::new(config).expect("registry");
    assembler.assemble_text(Some("test.asm"), &lines.join("\n"))
}

fn run(cpu: CpuVariant, lines: &[&str]) -> Assembly {
    match run_with(config(cpu), lines) {
        Ok(assembly) => assembly,
        Err(err) => {
            let messages: Vec<String> = err.diagnostics().iter().map(|d| d.format()).collect();
            panic!("assembly failed: {err}\n{}", messages.join("\n"));
        }
    }
}

fn bytes(cpu: CpuVariant, lines: &[&str]) -> Vec<u8> {
    let assembly = run(cpu, lines);
    assembly
        .output
        .lines
        .iter()
        .flat_map(|line| line.bytes.iter().copied())
        .collect()
}

fn bytes_6809(lines: &[&str]) -> Vec<u8> {
    bytes(CpuVariant::M6809, lines)
}

fn failure(cpu: CpuVariant, lines: &[&str]) -> AsmRunError {
    match run_with(config(cpu), lines) {
        Ok(_) => panic!("expected assembly to fail"),
        Err(err) => err,
    }
}

fn line_bytes(assembly: &Assembly, line: u32) -> Vec<u8> {
    assembly
        .output
        .lines
        .iter()
        .find(|emitted| emitted.origin.line == line)
        .map(|emitted| emitted.bytes.clone())
        .unwrap_or_default()
}

#[test]
fn branch_to_itself_is_two_bytes() {
    assert_eq!(bytes_6809(&["loop bra loop"]), vec![0x20, 0xFE]);
}

#[test]
fn forward_branch_shrinks_to_short_form() {
    let assembly = run(CpuVariant::M6809, &[" bra done", " nop", "done rts"]);
    assert_eq!(line_bytes(&assembly, 1), vec![0x20, 0x01]);
    assert_eq!(assembly.output.symbol("done"), Some(Value::Absolute(3)));
    assert!(assembly.passes >= 2);
}

#[test]
fn distant_targets_keep_the_long_form() {
    let assembly = run(
        CpuVariant::M6809,
        &[" bra far", " beq far", " rmb 200", "far rts"],
    );
    assert_eq!(line_bytes(&assembly, 1), vec![0x16, 0x00, 0xCC]);
    assert_eq!(line_bytes(&assembly, 2), vec![0x10, 0x27, 0x00, 0xC8]);
    assert_eq!(assembly.output.symbol("far"), Some(Value::Absolute(207)));
}

#[test]
fn backward_branch_at_the_short_limit() {
    let mut source = vec!["top nop"];
    source.extend(std::iter::repeat(" nop").take(125));
    source.push(" bra top");
    let assembly = run(CpuVariant::M6809, &source);
    assert_eq!(line_bytes(&assembly, 127), vec![0x20, 0x80]);

    source.insert(1, " nop");
    let assembly = run(CpuVariant::M6809, &source);
    assert_eq!(line_bytes(&assembly, 128), vec![0x16, 0xFF, 0x7E]);
}

#[test]
fn long_mnemonics_relax_unless_policy_is_explicit() {
    let source = [" lbra next", "next nop"];
    assert_eq!(bytes_6809(&source), vec![0x20, 0x00, 0x12]);

    let explicit = AssemblerConfig {
        branch_policy: BranchPolicy::Explicit,
        ..AssemblerConfig::default()
    };
    let assembly = run_with(explicit, &source).expect("explicit");
    assert_eq!(line_bytes(&assembly, 1), vec![0x16, 0x00, 0x00]);

    let err = run_with(explicit, &[" bra far", " rmb 200", "far rts"]).unwrap_err();
    assert!(err.has_kind(AsmErrorKind::Range));
}

#[test]
fn direct_page_selects_the_short_address_mode() {
    assert_eq!(bytes_6809(&[" lda $10"]), vec![0x96, 0x10]);
    assert_eq!(bytes_6809(&[" lda $1234"]), vec![0xB6, 0x12, 0x34]);
    assert_eq!(
        bytes_6809(&[" setdp $12", " lda $1234"]),
        vec![0x96, 0x34]
    );
    assert_eq!(bytes_6809(&[" lda >$10"]), vec![0xB6, 0x00, 0x10]);
    assert_eq!(bytes_6809(&[" lda <$1234"]), vec![0x96, 0x34]);
}

#[test]
fn forward_equ_shrinks_extended_to_direct() {
    let assembly = run(CpuVariant::M6809, &[" lda val", " rts", "val equ $20"]);
    assert_eq!(line_bytes(&assembly, 1), vec![0x96, 0x20]);
    assert_eq!(assembly.output.symbol("val"), Some(Value::Absolute(0x20)));
    assert_eq!(assembly.output.lines[2].value, Some(0x20));
}

#[test]
fn equ_may_use_the_location_counter() {
    assert_eq!(
        bytes_6809(&[" ldx #table", " rts", "table fdb size", "size equ *-table"]),
        vec![0x8E, 0x00, 0x04, 0x39, 0x00, 0x02]
    );
}

#[test]
fn set_symbols_may_be_reassigned() {
    assert_eq!(
        bytes_6809(&["n set 1", " fcb n", "n set n+1", " fcb n"]),
        vec![0x01, 0x02]
    );
    let err = failure(CpuVariant::M6809, &["k equ 1", "k equ 2"]);
    assert!(err.has_kind(AsmErrorKind::Redefinition));
}

#[test]
fn immediate_and_indexed_operands() {
    assert_eq!(
        bytes_6809(&[
            " ldd #$1234",
            " ldx #0",
            " lda ,x",
            " lda 5,y",
            " lda 100,u",
            " lda [,s++]",
            " leax 1,x",
        ]),
        vec![
            0xCC, 0x12, 0x34, 0x8E, 0x00, 0x00, 0xA6, 0x84, 0xA6, 0x25, 0xA6, 0xC8, 0x64, 0xA6,
            0xF1, 0x30, 0x01,
        ]
    );
}

#[test]
fn pc_relative_offsets_relax() {
    assert_eq!(
        bytes_6809(&[" leax msg,pcr", " rts", "msg fcb 0"]),
        vec![0x30, 0x8C, 0x01, 0x39, 0x00]
    );
}

#[test]
fn register_operands() {
    assert_eq!(
        bytes_6809(&[" tfr a,b", " exg d,x", " pshs a,b,x", " puls pc"]),
        vec![0x1F, 0x89, 0x1E, 0x01, 0x34, 0x16, 0x35, 0x80]
    );
}

#[test]
fn external_references_become_relocations() {
    let assembly = run(
        CpuVariant::M6809,
        &[
            " section code",
            " extern putc",
            " jsr putc",
            " lbsr putc",
            " endsection",
        ],
    );
    assert_eq!(line_bytes(&assembly, 3), vec![0xBD, 0x00, 0x00]);
    assert_eq!(line_bytes(&assembly, 4), vec![0x17, 0xFF, 0xFE]);
    let relocs: Vec<&Relocation> = assembly.output.relocations().map(|(_, r)| r).collect();
    assert_eq!(
        relocs,
        vec![
            &Relocation {
                offset: 1,
                target: RelocTarget::Symbol("putc".to_string()),
                addend: 0,
                kind: RelocKind::Abs16,
            },
            &Relocation {
                offset: 1,
                target: RelocTarget::Symbol("putc".to_string()),
                addend: -2,
                kind: RelocKind::PcRel16,
            },
        ]
    );
    assert_eq!(assembly.output.sections, vec![("code".to_string(), 6)]);
}

#[test]
fn section_references_use_section_relative_values() {
    let assembly = run(
        CpuVariant::M6809,
        &[
            " section code",
            "start lda data1",
            " rts",
            " endsection",
            " section data",
            "data1 fcb 1,2",
            " endsection",
            " section code",
            " bra start",
            " endsection",
        ],
    );
    assert_eq!(line_bytes(&assembly, 2), vec![0xB6, 0x00, 0x00]);
    assert_eq!(line_bytes(&assembly, 9), vec![0x20, 0xFA]);
    let (_, reloc) = assembly.output.relocations().next().expect("relocation");
    assert_eq!(reloc.target, RelocTarget::Section("data".to_string()));
    assert_eq!(
        assembly.output.symbol("start"),
        Some(Value::Relocatable {
            base: RelocBase::Section("code".to_string()),
            offset: 0,
        })
    );
    assert_eq!(
        assembly.output.sections,
        vec![("code".to_string(), 6), ("data".to_string(), 2)]
    );
}

#[test]
fn exports_must_be_defined() {
    let assembly = run(
        CpuVariant::M6809,
        &[" section code", " export entry", "entry rts", " endsection"],
    );
    let entry = assembly.output.symbols.entry("entry").expect("entry");
    assert!(entry.exported);

    let err = failure(CpuVariant::M6809, &[" export ghost"]);
    assert!(err.has_kind(AsmErrorKind::UndefinedSymbol));
}

#[test]
fn undefined_symbols_are_reported_at_emit() {
    let err = failure(CpuVariant::M6809, &[" jmp nowhere", " nop"]);
    assert_eq!(err.kind(), AsmErrorKind::UndefinedSymbol);
    assert_eq!(err.diagnostics()[0].line(), 1);
}

#[test]
fn cpu_gating_rejects_other_variants() {
    assert_eq!(
        bytes(CpuVariant::HD6309, &[" ldq #1"]),
        vec![0xCD, 0x00, 0x00, 0x00, 0x01]
    );
    let err = failure(CpuVariant::M6809, &[" ldq #1"]);
    assert_eq!(err.kind(), AsmErrorKind::CpuMode);
    let diag = &err.diagnostics()[0];
    assert!(diag.help().iter().any(|help| help.contains("6309")));

    assert_eq!(bytes(CpuVariant::M6800Compat, &[" inx"]), vec![0x30, 0x01]);
    assert!(failure(CpuVariant::M6809, &[" inx"]).has_kind(AsmErrorKind::CpuMode));
}

#[test]
fn convenience_sequences_follow_the_cpu() {
    assert_eq!(bytes_6809(&[" clrd"]), vec![0x4F, 0x5F]);
    assert_eq!(bytes(CpuVariant::HD6309, &[" clrd"]), vec![0x10, 0x4F]);
    assert_eq!(
        bytes(CpuVariant::M6800Compat, &[" ldaa #1", " tab", " staa $20"]),
        vec![0x86, 0x01, 0x1F, 0x89, 0x5D, 0x97, 0x20]
    );
}

#[test]
fn hd6309_extensions() {
    assert_eq!(
        bytes(
            CpuVariant::HD6309,
            &[" ldw #$1234", " lda ,w++", " addr a,b", " ldmd #1"],
        ),
        vec![0x10, 0x86, 0x12, 0x34, 0xA6, 0xCF, 0x10, 0x30, 0x89, 0x11, 0x3D, 0x01]
    );
}

#[test]
fn conditionals_select_blocks() {
    assert_eq!(
        bytes_6809(&[
            "debug equ 1",
            " if debug",
            " nop",
            " else",
            " rts",
            " endc",
            " ifdef missing",
            " swi",
            " if 1",
            " swi",
            " endc",
            " endc",
            " ifndef missing",
            " sync",
            " endif",
        ]),
        vec![0x12, 0x13]
    );
}

#[test]
fn skipped_blocks_ignore_unknown_mnemonics() {
    assert_eq!(
        bytes_6809(&[" if 0", " bogus operand", "dup nop", "dup nop", " endc", " nop"]),
        vec![0x12]
    );
}

#[test]
fn unbalanced_conditionals_are_errors() {
    let err = failure(CpuVariant::M6809, &[" if 1", " nop"]);
    assert_eq!(err.kind(), AsmErrorKind::Conditional);
    let err = failure(CpuVariant::M6809, &[" nop", " endc"]);
    assert!(err.has_kind(AsmErrorKind::Conditional));
    let err = failure(CpuVariant::M6809, &[" if later", " endc", "later equ 1"]);
    assert!(err.has_kind(AsmErrorKind::Syntax));
}

#[test]
fn macros_substitute_arguments() {
    assert_eq!(
        bytes_6809(&[
            "store macro",
            " lda #\\1",
            " sta \\2",
            " endm",
            " store 5,$40",
        ]),
        vec![0x86, 0x05, 0x97, 0x40]
    );
}

#[test]
fn macro_unique_labels_do_not_collide() {
    assert_eq!(
        bytes_6809(&["wait macro", "l\\@ bra l\\@", " endm", " wait", " wait"]),
        vec![0x20, 0xFE, 0x20, 0xFE]
    );
}

#[test]
fn runaway_macro_recursion_is_fatal() {
    let config = AssemblerConfig {
        max_macro_depth: 8,
        ..AssemblerConfig::default()
    };
    let err = run_with(config, &["again macro", " again", " endm", " again"]).unwrap_err();
    assert_eq!(err.kind(), AsmErrorKind::Macro);
}

#[test]
fn macro_definitions_are_checked() {
    let err = failure(CpuVariant::M6809, &["body macro", " nop"]);
    assert_eq!(err.kind(), AsmErrorKind::Macro);
    let err = failure(CpuVariant::M6809, &["lda macro", " nop", " endm"]);
    assert!(err.has_kind(AsmErrorKind::Macro));
}

#[test]
fn structs_define_sizes_offsets_and_instances() {
    let assembly = run(
        CpuVariant::M6809,
        &[
            "point struct",
            "x rmb 1",
            "y rmb 2",
            " endstruct",
            " ldd #point",
            " lda #point.y",
            "p1 point",
            " lda p1.y",
        ],
    );
    assert_eq!(assembly.output.symbol("point"), Some(Value::Absolute(3)));
    assert_eq!(assembly.output.symbol("point.y"), Some(Value::Absolute(1)));
    assert_eq!(assembly.output.symbol("p1.y"), Some(Value::Absolute(6)));
    let emitted: Vec<u8> = assembly
        .output
        .lines
        .iter()
        .flat_map(|line| line.bytes.iter().copied())
        .collect();
    assert_eq!(emitted, vec![0xCC, 0x00, 0x03, 0x86, 0x01, 0x96, 0x06]);
    assert_eq!(assembly.output.image(None).map(|(_, image)| image.len()), Some(10));
}

#[test]
fn nested_structs_flatten_field_names() {
    let assembly = run(
        CpuVariant::M6809,
        &[
            "pos struct",
            "x rmb 2",
            "y rmb 2",
            " endstruct",
            "sprite struct",
            "id rmb 1",
            "at pos",
            " endstruct",
        ],
    );
    assert_eq!(assembly.output.symbol("sprite"), Some(Value::Absolute(5)));
    assert_eq!(assembly.output.symbol("sprite.at.y"), Some(Value::Absolute(3)));
}

#[test]
fn struct_bodies_only_take_reservations() {
    let err = failure(CpuVariant::M6809, &["bad struct", " nop", " endstruct"]);
    assert!(err.has_kind(AsmErrorKind::Directive));
    let err = failure(CpuVariant::M6809, &["open struct", "a rmb 1"]);
    assert_eq!(err.kind(), AsmErrorKind::Directive);
}

#[test]
fn data_directives() {
    assert_eq!(
        bytes_6809(&[
            " fcb 1,-1,'A'",
            " fdb $1234,-1",
            " fqb 1",
            " fcc \"HI\"",
            " fcs /HI/",
            " fcn \"OK\"",
            " zmb 2",
            " fill $AA,3",
        ]),
        vec![
            0x01, 0xFF, 0x41, 0x12, 0x34, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x01, 0x48, 0x49, 0x48,
            0xC9, 0x4F, 0x4B, 0x00, 0x00, 0x00, 0xAA, 0xAA, 0xAA,
        ]
    );
    assert!(failure(CpuVariant::M6809, &[" fcb 256"]).has_kind(AsmErrorKind::Range));
}

#[test]
fn reservations_take_space_without_bytes() {
    let assembly = run(CpuVariant::M6809, &[" rmb 4", "after rmd 2", "end1 nop"]);
    assert_eq!(assembly.output.symbol("after"), Some(Value::Absolute(4)));
    assert_eq!(assembly.output.symbol("end1"), Some(Value::Absolute(8)));
    assert_eq!(assembly.output.total_bytes(), 1);
    assert_eq!(assembly.output.lines[0].reserved, 4);
}

#[test]
fn origins_and_alignment() {
    let assembly = run(
        CpuVariant::M6809,
        &[
            " org $1000",
            " nop",
            " org $2000",
            " rts",
            " reorg",
            "back nop",
            " align 4,$FF",
            "aligned swi",
        ],
    );
    assert_eq!(assembly.output.symbol("back"), Some(Value::Absolute(0x1001)));
    assert_eq!(assembly.output.symbol("aligned"), Some(Value::Absolute(0x1004)));
    assert_eq!(line_bytes(&assembly, 7), vec![0xFF, 0xFF]);
    assert_eq!(
        assembly.output.image(None),
        Some((0x1000, {
            let mut image = vec![0u8; 0x1001];
            image[0] = 0x12;
            image[1] = 0x12;
            image[2] = 0xFF;
            image[3] = 0xFF;
            image[4] = 0x3F;
            image[0x1000] = 0x39;
            image
        }))
    );
}

#[test]
fn end_stops_input_and_records_the_entry() {
    let assembly = run(
        CpuVariant::M6809,
        &[" org $100", "start nop", " end start", " this is never read"],
    );
    assert_eq!(assembly.output.entry, Some(Value::Absolute(0x100)));
    assert_eq!(assembly.output.total_bytes(), 1);
}

#[test]
fn labels_are_checked() {
    let err = failure(CpuVariant::M6809, &["dup nop", "dup nop"]);
    assert_eq!(err.kind(), AsmErrorKind::Redefinition);
    let err = failure(CpuVariant::M6809, &["x nop"]);
    assert!(err.has_kind(AsmErrorKind::Syntax));
    let err = failure(CpuVariant::M6809, &[" frobnicate"]);
    assert!(err.has_kind(AsmErrorKind::Syntax));
}

#[test]
fn every_bad_line_is_reported() {
    let err = failure(CpuVariant::M6809, &[" frob", " nop", " ldq #1", " blah"]);
    let lines: Vec<u32> = err
        .diagnostics()
        .iter()
        .filter(|diag| diag.severity() == Severity::Error)
        .map(|diag| diag.line())
        .collect();
    assert_eq!(lines, vec![1, 3, 4]);
    assert!(err.error().message().contains("3 error"));
}

#[test]
fn warning_directive_does_not_fail_the_run() {
    let assembly = run(CpuVariant::M6809, &[" warning \"check me\"", " nop"]);
    assert_eq!(assembly.report.warning_count(), 1);
    assert_eq!(assembly.report.diagnostics()[0].message(), "check me");

    let err = failure(CpuVariant::M6809, &[" error \"stop here\""]);
    assert_eq!(err.kind(), AsmErrorKind::Directive);
}

#[test]
fn oscillating_layout_hits_the_pass_budget() {
    let err = failure(
        CpuVariant::M6809,
        &[" bra target", " rmb pad", "target nop", "pad equ 200-target"],
    );
    assert_eq!(err.kind(), AsmErrorKind::Oscillation);
    assert!(err.error().message().contains("32"));
    let moving = err
        .diagnostics()
        .iter()
        .find(|diag| diag.message() == "Line length still changing")
        .expect("per-line diagnostic");
    assert!(moving.notes().iter().any(|note| note.contains("of 32")));
}

#[test]
fn tiny_pass_budget_reports_oscillation() {
    let config = AssemblerConfig {
        max_passes: 1,
        ..AssemblerConfig::default()
    };
    let err = run_with(config, &[" bra done", " nop", "done rts"]).unwrap_err();
    assert_eq!(err.kind(), AsmErrorKind::Oscillation);
}

#[test]
fn converged_layout_is_stable_under_another_pass() {
    let assembler = Assembler::new(AssemblerConfig::default()).expect("registry");
    let source = SourceLine::parse_text(
        None,
        " bra fwd\n beq back\nback nop\n lda val\n rmb 130\nfwd lbsr back\nval equ $40\n",
    );
    let mut driver = assembler.driver();
    driver.parse(&source).expect("parse");
    driver.resolve_to_fixed_point().expect("converge");
    let sizes: Vec<u32> = driver.lines().iter().map(|line| line.size).collect();
    let summary = driver.resolve_pass().expect("extra pass");
    assert!(summary.is_stable());
    let again: Vec<u32> = driver.lines().iter().map(|line| line.size).collect();
    assert_eq!(sizes, again);

    driver.emit().expect("emit");
    assert_eq!(driver.error_count(), 0);
    for line in driver.lines() {
        assert_eq!(line.bytes.len() as u32 + line.reserved, line.size, "{}", line.text);
    }
}

#[test]
fn runs_do_not_share_state() {
    let assembler = Assembler::new(AssemblerConfig::default()).expect("registry");
    let first = assembler.assemble_text(None, "one nop").expect("first");
    let second = assembler.assemble_text(None, "one rts").expect("second");
    assert_eq!(first.output.total_bytes(), 1);
    assert_eq!(second.output.lines[0].bytes, vec![0x39]);
}

#[test]
fn listing_shows_addresses_bytes_and_symbols() {
    let assembly = run(CpuVariant::M6809, &[" org $400", "start lda #1", " rts"]);
    let mut out = Vec::new();
    let counts = crate::core::assembler::error::PassCounts {
        lines: 3,
        errors: 0,
        warnings: 0,
    };
    assembly
        .output
        .write_listing(&mut out, "test.asm", &counts)
        .expect("listing");
    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("0400"));
    assert!(text.contains("86 01"));
    assert!(text.contains("start"));
}

#[test]
fn json_output_describes_the_object() {
    let assembly = run(
        CpuVariant::M6809,
        &[" section code", " extern putc", "go jsr putc", " export go", " endsection"],
    );
    let json = assembly.output.to_json();
    assert_eq!(json["lines"][0]["bytes"], serde_json::json!([0xBD, 0, 0]));
    assert_eq!(json["lines"][0]["relocations"][0]["symbol"], "putc");
    assert_eq!(json["sections"][0]["name"], "code");
    let symbols = json["symbols"].as_array().expect("symbols");
    assert!(symbols
        .iter()
        .any(|sym| sym["name"] == "go" && sym["exported"] == true));
    assert!(symbols
        .iter()
        .any(|sym| sym["name"] == "putc" && sym["imported"] == true));
}
