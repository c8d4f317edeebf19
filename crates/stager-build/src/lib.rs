//! Compile, link, and flat-binary pipeline for the stager payload builder.
//!
//! Builds the two payload stages for each platform:
//! hook compile -> hook link -> hook extract -> hook wrap ->
//! shellcode compile -> shellcode link -> shellcode extract.
//!
//! The hook's flat binary is converted back into a relocatable object and
//! linked straight into the shellcode, so the shellcode carries the hook's
//! bytes without loading anything at runtime.

pub mod compile;
pub mod error;
pub mod extract;
pub mod graph;
pub mod invoke;
pub mod link;
pub mod pipeline;
pub mod report;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use compile::{compile, CompileUnit};
pub use error::BuildError;
pub use extract::{binary_symbol_stem, extract_flat, wrap_flat};
pub use graph::{Artifact, ExecutionPlan, StageState, Task, TaskGraph, TaskKind};
pub use invoke::{ProcessRunner, Tool, ToolInvocation, ToolRunner};
pub use link::{link, LinkJob};
pub use pipeline::PipelineOrchestrator;
pub use report::{ArtifactRecord, BuildReport};
