//! Linking a stage at a fixed load address.
//!
//! The linker is told the entry symbol explicitly, and the object defining it
//! is always passed first so the linker places it at the start of `.text`.
//! Neither guarantees the entry lands on the load address, so every link is
//! followed by a read-back of the produced ELF.

use std::ffi::OsString;
use std::path::PathBuf;

use stager_targets::{AddressLayout, FlagSet, ToolchainConfig};

use crate::error::BuildError;
use crate::invoke::{Tool, ToolInvocation, ToolRunner};
use crate::verify::check_entry_point;

/// One link: ordered objects placed at a fixed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkJob {
    /// Objects in link order. The first must define the entry symbol.
    pub objects: Vec<PathBuf>,
    /// Absolute `.text` address.
    pub load_address: u64,
    pub linker_script: PathBuf,
    pub output: PathBuf,
}

/// Describe the linker call for `job`:
/// `-o <output> -Ttext=0x<addr> <objects...> <ldflags...> -e <entry> -T<script>`.
pub fn link_invocation(
    toolchain: &ToolchainConfig,
    flags: &FlagSet,
    job: &LinkJob,
) -> ToolInvocation {
    let mut script = OsString::from("-T");
    script.push(&job.linker_script);

    ToolInvocation::new(Tool::Linker, &toolchain.linker)
        .arg("-o")
        .arg(&job.output)
        .arg(AddressLayout::text_arg(job.load_address))
        .args(&job.objects)
        .args(&flags.ldflags)
        .arg("-e")
        .arg(&flags.entry_symbol)
        .arg(script)
}

/// Link `job` and check that the entry symbol sits at the load address.
pub fn link(
    runner: &dyn ToolRunner,
    toolchain: &ToolchainConfig,
    flags: &FlagSet,
    job: &LinkJob,
) -> Result<(), BuildError> {
    if job.objects.is_empty() {
        return Err(BuildError::Config {
            message: format!("no objects to link into {}", job.output.display()),
        });
    }

    runner.run(&link_invocation(toolchain, flags, job))?;
    check_entry_point(&job.output, &flags.entry_symbol, job.load_address)
}
