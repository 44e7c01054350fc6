// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembler run driver.
//!
//! An [`Assembler`] owns the descriptor registry and a run configuration.
//! Each call to [`Assembler::assemble`] builds a fresh [`PassDriver`], so
//! runs share no state.

mod directives;
mod directives_data;
mod directives_layout;
mod directives_symbols;
pub mod cli;
mod frontend;
pub mod output;
mod passes;
#[cfg(test)]
mod tests;

pub use directives::DirectiveModule;
pub use output::{EmittedLine, ObjectOutput};
pub use passes::{PassDriver, PassSummary};

use tracing::debug;

use crate::core::assembler::context::BranchPolicy;
use crate::core::assembler::error::{
    AsmError, AsmErrorKind, AsmRunError, AsmRunReport, Diagnostic, Severity,
};
use crate::core::cpu::CpuVariant;
use crate::core::registry::{InstructionRegistry, RegistryError};
use crate::core::source_map::SourceLine;
use crate::registry_defaults::build_default_registry;

/// Resolve passes allowed before a layout is declared oscillating.
pub const DEFAULT_MAX_PASSES: usize = 32;
pub const DEFAULT_MACRO_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerConfig {
    pub cpu: CpuVariant,
    pub max_passes: usize,
    pub max_macro_depth: usize,
    pub branch_policy: BranchPolicy,
    /// Direct page assumed before the first `setdp`.
    pub initial_dp: u8,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            cpu: CpuVariant::default(),
            max_passes: DEFAULT_MAX_PASSES,
            max_macro_depth: DEFAULT_MACRO_DEPTH,
            branch_policy: BranchPolicy::default(),
            initial_dp: 0,
        }
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct Assembly {
    pub output: ObjectOutput,
    /// Warnings and the source text they refer to.
    pub report: AsmRunReport,
    /// Resolve passes used to reach the fixed point.
    pub passes: u32,
}

pub struct Assembler {
    registry: InstructionRegistry,
    config: AssemblerConfig,
}

impl Assembler {
    pub fn new(config: AssemblerConfig) -> Result<Self, RegistryError> {
        Ok(Self {
            registry: build_default_registry()?,
            config,
        })
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn registry(&self) -> &InstructionRegistry {
        &self.registry
    }

    /// A driver for one run, for callers that step through the phases.
    pub fn driver(&self) -> PassDriver<'_> {
        PassDriver::new(&self.registry, self.config)
    }

    /// Parse, resolve to a fixed point and emit. Lines with per-line errors
    /// are all reported; the run stops after the first phase that had any.
    pub fn assemble(&self, source: &[SourceLine]) -> Result<Assembly, AsmRunError> {
        let source_lines: Vec<String> = source.iter().map(|line| line.text.clone()).collect();
        debug!(cpu = %self.config.cpu, lines = source.len(), "assembling");
        let mut driver = self.driver();

        if let Err(err) = driver.parse(source) {
            return Err(run_error(driver.take_diagnostics(), Some(err), source_lines));
        }
        if driver.error_count() > 0 {
            return Err(run_error(driver.take_diagnostics(), None, source_lines));
        }
        let passes = match driver.resolve_to_fixed_point() {
            Ok(passes) => passes,
            Err(err) => return Err(run_error(driver.take_diagnostics(), Some(err), source_lines)),
        };
        if let Err(err) = driver.emit() {
            return Err(run_error(driver.take_diagnostics(), Some(err), source_lines));
        }
        if driver.error_count() > 0 {
            return Err(run_error(driver.take_diagnostics(), None, source_lines));
        }
        Ok(Assembly {
            output: driver.output(),
            report: AsmRunReport::new(driver.take_diagnostics(), source_lines),
            passes,
        })
    }

    /// Split `text` into lines and assemble it.
    pub fn assemble_text(&self, file: Option<&str>, text: &str) -> Result<Assembly, AsmRunError> {
        self.assemble(&SourceLine::parse_text(file, text))
    }
}

/// Wrap the diagnostics of a failed run. Without a fatal error the summary
/// takes the kind of the first error reported.
fn run_error(
    diagnostics: Vec<Diagnostic>,
    fatal: Option<AsmError>,
    source_lines: Vec<String>,
) -> AsmRunError {
    let error = fatal.unwrap_or_else(|| {
        let errors: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|diag| diag.severity() == Severity::Error)
            .collect();
        let kind = errors
            .first()
            .map_or(AsmErrorKind::Internal, |diag| diag.kind());
        AsmError::new(
            kind,
            &format!("Assembly failed with {} error(s)", errors.len()),
            None,
        )
    });
    AsmRunError::new(error, diagnostics, source_lines)
}
