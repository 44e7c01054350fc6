// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for asm6x09.

use std::fs::{self, File};
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::Path;

use clap::Parser;
use serde_json::json;

use asm6x09::assembler::cli::{validate_cli, Cli, CliConfig, OutputFormat};
use asm6x09::assembler::{Assembler, Assembly};
use asm6x09::core::assembler::error::{
    AsmError, AsmErrorKind, AsmRunError, Diagnostic, PassCounts, Severity,
};

fn severity_to_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

fn format_diagnostic_line(
    diag: &Diagnostic,
    source_lines: Option<&[String]>,
    use_color: bool,
    format: OutputFormat,
) -> String {
    if format == OutputFormat::Json {
        json!({
            "code": diag.code(),
            "severity": severity_to_str(diag.severity()),
            "message": diag.message(),
            "file": diag.file(),
            "line": diag.line(),
            "column": diag.column(),
            "notes": diag.notes(),
            "help": diag.help(),
        })
        .to_string()
    } else {
        diag.format_with_context(source_lines, use_color)
    }
}

fn emit_diagnostics(diagnostics: &[Diagnostic], source_lines: &[String], format: OutputFormat) {
    let use_color = format == OutputFormat::Text && io::stderr().is_terminal();
    let mut stderr = io::stderr().lock();
    for diag in diagnostics {
        let _ = writeln!(
            stderr,
            "{}",
            format_diagnostic_line(diag, Some(source_lines), use_color, format)
        );
    }
}

fn io_error(path: &Path, err: io::Error) -> AsmRunError {
    AsmRunError::new(
        AsmError::new(
            AsmErrorKind::Io,
            &err.to_string(),
            Some(&path.display().to_string()),
        ),
        Vec::new(),
        Vec::new(),
    )
}

fn write_outputs(config: &CliConfig, assembly: &Assembly) -> Result<(), AsmRunError> {
    if let Some(path) = config.output.as_deref() {
        let text = serde_json::to_string_pretty(&assembly.output.to_json())
            .map_err(|err| io_error(path, err.into()))?;
        fs::write(path, text + "\n").map_err(|err| io_error(path, err))?;
    }
    if let Some(path) = config.list.as_deref() {
        let file = File::create(path).map_err(|err| io_error(path, err))?;
        let counts = PassCounts {
            lines: assembly.output.lines.len() as u32,
            errors: 0,
            warnings: assembly.report.warning_count() as u32,
        };
        let title = config.input.display().to_string();
        let mut out = BufWriter::new(file);
        assembly
            .output
            .write_listing(&mut out, &title, &counts)
            .and_then(|()| out.flush())
            .map_err(|err| io_error(path, err))?;
    }
    Ok(())
}

fn run(config: &CliConfig) -> Result<Assembly, AsmRunError> {
    let text = fs::read_to_string(&config.input).map_err(|err| io_error(&config.input, err))?;
    let assembler = Assembler::new(config.assembler).map_err(|err| {
        AsmRunError::new(
            AsmError::new(AsmErrorKind::Internal, &err.to_string(), None),
            Vec::new(),
            Vec::new(),
        )
    })?;
    let file = config.input.display().to_string();
    let assembly = assembler.assemble_text(Some(&file), &text)?;
    write_outputs(config, &assembly)?;
    Ok(assembly)
}

fn main() {
    let cli = Cli::parse();
    let config = match validate_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(io::stderr)
        .init();

    match run(&config) {
        Ok(assembly) => {
            emit_diagnostics(
                assembly.report.diagnostics(),
                assembly.report.source_lines(),
                config.format,
            );
        }
        Err(err) => {
            emit_diagnostics(err.diagnostics(), err.source_lines(), config.format);
            if config.format == OutputFormat::Json {
                eprintln!(
                    "{}",
                    json!({
                        "code": err.kind().code(),
                        "severity": "error",
                        "message": err.error().message(),
                    })
                );
            } else {
                eprintln!("{err}");
            }
            std::process::exit(1);
        }
    }
}
