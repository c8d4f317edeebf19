//! Pipeline errors.

use std::path::PathBuf;
use std::process::ExitStatus;

use stager_targets::TargetError;
use thiserror::Error;

use crate::graph::StageState;
use crate::invoke::Tool;

/// Errors that can occur while building the payload stages.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to launch {tool} ({}): {source}", program.display())]
    ToolLaunch {
        tool: Tool,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} ({}) exited with {status}", program.display())]
    ToolFailed {
        tool: Tool,
        program: PathBuf,
        status: ExitStatus,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {message}", path.display())]
    ElfParse { path: PathBuf, message: String },

    #[error(
        "entry symbol '{symbol}' in {} is at 0x{actual:X}, expected load address 0x{expected:X}",
        path.display()
    )]
    EntryMisplaced {
        path: PathBuf,
        symbol: String,
        expected: u64,
        actual: u64,
    },

    #[error("entry symbol '{symbol}' is not defined in {}", path.display())]
    EntryMissing { path: PathBuf, symbol: String },

    #[error("wrapped object {} is invalid: {reason}", path.display())]
    WrappedObjectInvalid { path: PathBuf, reason: String },

    #[error("hook bytes embedded in {} do not match {}: {reason}", elf.display(), flat.display())]
    EmbeddingMismatch {
        elf: PathBuf,
        flat: PathBuf,
        reason: String,
    },

    #[error("hook image is {size} bytes but only {capacity} bytes fit below the shellcode")]
    HookTooLarge { size: u64, capacity: u64 },

    #[error("invalid task graph: {message}")]
    InvalidTaskGraph { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("platform {platform} failed after reaching {state}: {source}")]
    Platform {
        platform: String,
        state: StageState,
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
