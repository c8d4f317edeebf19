//! Compilation of a single source file into an object.

use std::path::{Path, PathBuf};

use stager_targets::{FlagSet, ToolchainConfig};

use crate::error::BuildError;
use crate::invoke::{Tool, ToolInvocation, ToolRunner};

/// One compilation unit: a source, an optional forced-include overlay, and
/// the object it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileUnit {
    pub source: PathBuf,
    /// Header included ahead of the source's own includes.
    pub include: Option<PathBuf>,
    pub output: PathBuf,
}

impl CompileUnit {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            include: None,
            output: output.into(),
        }
    }

    pub fn with_include(mut self, header: impl Into<PathBuf>) -> Self {
        self.include = Some(header.into());
        self
    }
}

/// Describe the compiler call for `unit`:
/// `-c <source> [-include <header>] -o <output> <cflags...>`.
pub fn compile_invocation(
    toolchain: &ToolchainConfig,
    flags: &FlagSet,
    unit: &CompileUnit,
) -> ToolInvocation {
    let mut inv = ToolInvocation::new(Tool::Compiler, &toolchain.compiler)
        .arg("-c")
        .arg(&unit.source);
    if let Some(header) = &unit.include {
        inv = inv.arg("-include").arg(header);
    }
    inv.arg("-o").arg(&unit.output).args(&flags.cflags)
}

/// Compile one unit, returning the object path.
pub fn compile<'u>(
    runner: &dyn ToolRunner,
    toolchain: &ToolchainConfig,
    flags: &FlagSet,
    unit: &'u CompileUnit,
) -> Result<&'u Path, BuildError> {
    runner.run(&compile_invocation(toolchain, flags, unit))?;
    Ok(&unit.output)
}
