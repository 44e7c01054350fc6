// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::env;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::Level;

use crate::core::assembler::context::BranchPolicy;
use crate::core::assembler::error::{AsmError, AsmErrorKind, AsmRunError};
use crate::core::cpu::CpuVariant;

use super::{AssemblerConfig, DEFAULT_MACRO_DEPTH, DEFAULT_MAX_PASSES};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "Multi-pass assembler for the Motorola 6809, Hitachi HD6309 and 6800-compatible instruction sets.

Branches and other variable-length encodings are relaxed to their shortest form that
reaches. Output is relocatable: references to sections and external symbols are left
as relocations for a linker.
Outputs are opt-in: -o writes the object as JSON, -l writes a listing.
--cpu, --max-passes and --macro-depth fall back to ASM6X09_CPU, ASM6X09_MAX_PASSES and
ASM6X09_MACRO_DEPTH when omitted.";

#[derive(Parser, Debug)]
#[command(
    name = "asm6x09",
    version = VERSION,
    about = "Relaxing 6809/6309 assembler with macros, structs and relocatable sections",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(value_name = "FILE", long_help = "Assembly source file to read.")]
    pub input: PathBuf,
    #[arg(
        long = "cpu",
        value_name = "CPU",
        long_help = "Target CPU: 6809 (default), 6309 or 6800 (6809 with the 6800 compatibility mnemonics)."
    )]
    pub cpu: Option<String>,
    #[arg(
        long = "max-passes",
        value_name = "N",
        long_help = "Resolve passes allowed before the layout is reported as oscillating. Defaults to 32."
    )]
    pub max_passes: Option<usize>,
    #[arg(
        long = "macro-depth",
        value_name = "N",
        long_help = "Maximum nesting depth of macro expansions. Defaults to 64."
    )]
    pub macro_depth: Option<usize>,
    #[arg(
        long = "branch-policy",
        value_enum,
        default_value_t = BranchPolicyArg::Relax,
        long_help = "relax lets bxx and lbxx both take the shortest form that reaches; explicit keeps bxx short and lbxx long."
    )]
    pub branch_policy: BranchPolicyArg,
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        long_help = "Write the object (bytes, relocations, symbols and sections) to FILE as JSON."
    )]
    pub output: Option<PathBuf>,
    #[arg(
        short = 'l',
        long = "list",
        value_name = "FILE",
        long_help = "Write a listing with addresses, bytes and the symbol table to FILE."
    )]
    pub list: Option<PathBuf>,
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Diagnostic output format. text is default; json prints one object per run on stderr."
    )]
    pub format: OutputFormat,
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value_t = Level::WARN,
        long_help = "Maximum tracing level written to stderr: error, warn, info, debug or trace."
    )]
    pub log_level: Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BranchPolicyArg {
    #[default]
    Relax,
    Explicit,
}

impl From<BranchPolicyArg> for BranchPolicy {
    fn from(arg: BranchPolicyArg) -> Self {
        match arg {
            BranchPolicyArg::Relax => BranchPolicy::Relax,
            BranchPolicyArg::Explicit => BranchPolicy::Explicit,
        }
    }
}

/// Validated command-line configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub input: PathBuf,
    pub assembler: AssemblerConfig,
    pub output: Option<PathBuf>,
    pub list: Option<PathBuf>,
    pub format: OutputFormat,
    pub log_level: Level,
}

fn cli_error(message: impl Into<String>) -> AsmRunError {
    AsmRunError::new(
        AsmError::new(AsmErrorKind::Cli, &message.into(), None),
        Vec::new(),
        Vec::new(),
    )
}

fn parse_env_usize(var_name: &str) -> Result<Option<usize>, AsmRunError> {
    let Some(value) = parse_env_string(var_name)? else {
        return Ok(None);
    };
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|_| cli_error(format!("Invalid integer value for {var_name}: {value}")))
}

fn parse_env_string(var_name: &str) -> Result<Option<String>, AsmRunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_string();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(value))
}

fn positive(value: usize, what: &str) -> Result<usize, AsmRunError> {
    if value == 0 {
        return Err(cli_error(format!("{what} must be at least 1")));
    }
    Ok(value)
}

/// Validate CLI arguments and return parsed configuration.
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmRunError> {
    let env_cpu = parse_env_string("ASM6X09_CPU")?;
    let env_max_passes = parse_env_usize("ASM6X09_MAX_PASSES")?;
    let env_macro_depth = parse_env_usize("ASM6X09_MACRO_DEPTH")?;

    let cpu = match cli.cpu.clone().or(env_cpu) {
        Some(name) => name
            .parse::<CpuVariant>()
            .map_err(|err| cli_error(err.to_string()))?,
        None => CpuVariant::default(),
    };
    let max_passes = positive(
        cli.max_passes.or(env_max_passes).unwrap_or(DEFAULT_MAX_PASSES),
        "--max-passes",
    )?;
    let max_macro_depth = positive(
        cli.macro_depth
            .or(env_macro_depth)
            .unwrap_or(DEFAULT_MACRO_DEPTH),
        "--macro-depth",
    )?;

    if cli.output.is_some() && cli.output == cli.list {
        return Err(cli_error("--output and --list must name different files"));
    }

    Ok(CliConfig {
        input: cli.input.clone(),
        assembler: AssemblerConfig {
            cpu,
            max_passes,
            max_macro_depth,
            branch_policy: cli.branch_policy.into(),
            ..AssemblerConfig::default()
        },
        output: cli.output.clone(),
        list: cli.list.clone(),
        format: cli.format,
        log_level: cli.log_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};

    const ENV_VARS: [&str; 3] = ["ASM6X09_CPU", "ASM6X09_MAX_PASSES", "ASM6X09_MACRO_DEPTH"];

    fn with_env_vars(vars: &[(&str, Option<&str>)], test: impl FnOnce()) {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let _guard = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .expect("lock env mutex");

        let saved: Vec<(String, Option<OsString>)> = vars
            .iter()
            .map(|(key, _)| (key.to_string(), env::var_os(key)))
            .collect();

        for (key, value) in vars {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }

        test();

        for (key, value) in saved {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }

    fn clean_env(test: impl FnOnce()) {
        let vars: Vec<(&str, Option<&str>)> = ENV_VARS.iter().map(|var| (*var, None)).collect();
        with_env_vars(&vars, test);
    }

    #[test]
    fn cli_parses_outputs_and_options() {
        let cli = Cli::parse_from([
            "asm6x09",
            "prog.asm",
            "--cpu",
            "6309",
            "--branch-policy",
            "explicit",
            "-o",
            "prog.json",
            "-l",
            "prog.lst",
            "--format",
            "json",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.input, PathBuf::from("prog.asm"));
        assert_eq!(cli.cpu.as_deref(), Some("6309"));
        assert_eq!(cli.branch_policy, BranchPolicyArg::Explicit);
        assert_eq!(cli.output, Some(PathBuf::from("prog.json")));
        assert_eq!(cli.list, Some(PathBuf::from("prog.lst")));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.log_level, Level::DEBUG);
    }

    #[test]
    fn defaults_match_the_library_config() {
        clean_env(|| {
            let cli = Cli::parse_from(["asm6x09", "prog.asm"]);
            let config = validate_cli(&cli).expect("valid");
            assert_eq!(config.assembler, AssemblerConfig::default());
            assert_eq!(config.format, OutputFormat::Text);
            assert_eq!(config.log_level, Level::WARN);
            assert!(config.output.is_none());
            assert!(config.list.is_none());
        });
    }

    #[test]
    fn cpu_names_are_validated() {
        clean_env(|| {
            let cli = Cli::parse_from(["asm6x09", "prog.asm", "--cpu", "6800"]);
            let config = validate_cli(&cli).expect("valid");
            assert_eq!(config.assembler.cpu, CpuVariant::M6800Compat);

            let cli = Cli::parse_from(["asm6x09", "prog.asm", "--cpu", "z80"]);
            let err = validate_cli(&cli).unwrap_err();
            assert_eq!(err.kind(), AsmErrorKind::Cli);
            assert!(err.error().message().contains("z80"));
        });
    }

    #[test]
    fn environment_fills_in_missing_flags() {
        with_env_vars(
            &[
                ("ASM6X09_CPU", Some("hd6309")),
                ("ASM6X09_MAX_PASSES", Some("8")),
                ("ASM6X09_MACRO_DEPTH", Some("4")),
            ],
            || {
                let cli = Cli::parse_from(["asm6x09", "prog.asm"]);
                let config = validate_cli(&cli).expect("valid");
                assert_eq!(config.assembler.cpu, CpuVariant::HD6309);
                assert_eq!(config.assembler.max_passes, 8);
                assert_eq!(config.assembler.max_macro_depth, 4);

                let cli = Cli::parse_from(["asm6x09", "prog.asm", "--cpu", "6809", "--max-passes", "3"]);
                let config = validate_cli(&cli).expect("valid");
                assert_eq!(config.assembler.cpu, CpuVariant::M6809);
                assert_eq!(config.assembler.max_passes, 3);
            },
        );
    }

    #[test]
    fn invalid_environment_values_are_errors() {
        with_env_vars(
            &[
                ("ASM6X09_CPU", None),
                ("ASM6X09_MAX_PASSES", Some("many")),
                ("ASM6X09_MACRO_DEPTH", None),
            ],
            || {
                let cli = Cli::parse_from(["asm6x09", "prog.asm"]);
                let err = validate_cli(&cli).unwrap_err();
                assert_eq!(err.kind(), AsmErrorKind::Cli);
                assert!(err.error().message().contains("ASM6X09_MAX_PASSES"));
            },
        );
    }

    #[test]
    fn zero_limits_are_rejected() {
        clean_env(|| {
            let cli = Cli::parse_from(["asm6x09", "prog.asm", "--max-passes", "0"]);
            assert!(validate_cli(&cli).is_err());
            let cli = Cli::parse_from(["asm6x09", "prog.asm", "--macro-depth", "0"]);
            assert!(validate_cli(&cli).is_err());
        });
    }

    #[test]
    fn output_and_listing_must_differ() {
        clean_env(|| {
            let cli = Cli::parse_from(["asm6x09", "prog.asm", "-o", "out", "-l", "out"]);
            assert!(validate_cli(&cli).is_err());
        });
    }
}
