//! The immutable build configuration threaded through every pipeline stage.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout::AddressLayout;
use crate::platform::Platform;

/// Compiler and linker flags shared by every compilation unit and link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlagSet {
    /// Flags appended to every compile invocation.
    pub cflags: Vec<String>,
    /// Flags appended to every link invocation, before the entry and script flags.
    pub ldflags: Vec<String>,
    /// Symbol the linker is told to use as the entry point.
    pub entry_symbol: String,
    /// Object format requested when re-wrapping a flat binary.
    pub object_format: String,
}

impl Default for FlagSet {
    fn default() -> Self {
        Self {
            cflags: [
                "-Wall",
                "-Wno-long-long",
                "-Wno-multichar",
                "-Os",
                "-march=armv6",
                "-fcall-used-r9",
                "-ffunction-sections",
            ]
            .map(String::from)
            .to_vec(),
            ldflags: vec!["-nostdlib".to_string()],
            entry_symbol: "_start".to_string(),
            object_format: "elf32-littlearm".to_string(),
        }
    }
}

/// Source files shared by every platform, relative to the project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceSet {
    /// Hook startup stub; must define the entry symbol.
    pub hook_start: PathBuf,
    /// Hook body.
    pub hook: PathBuf,
    /// Shellcode body; must define the entry symbol.
    pub shellcode: PathBuf,
    /// Freestanding support library linked into the shellcode.
    pub support: PathBuf,
    /// Linker script used by both links.
    pub linker_script: PathBuf,
}

impl Default for SourceSet {
    fn default() -> Self {
        Self {
            hook_start: PathBuf::from("hook_start.S"),
            hook: PathBuf::from("hook.c"),
            shellcode: PathBuf::from("shellcode.S"),
            support: PathBuf::from("libc.c"),
            linker_script: PathBuf::from("linker.ld"),
        }
    }
}

impl SourceSet {
    /// Every source path, in build order, paired with a short role name.
    pub fn entries(&self) -> [(&'static str, &Path); 5] {
        [
            ("hook startup stub", self.hook_start.as_path()),
            ("hook body", self.hook.as_path()),
            ("shellcode body", self.shellcode.as_path()),
            ("support library", self.support.as_path()),
            ("linker script", self.linker_script.as_path()),
        ]
    }
}

/// Complete configuration for one build run.
///
/// Constructed once at startup and never mutated; every component reads from
/// the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Platforms to build, in order.
    pub platforms: Vec<Platform>,
    /// Directory holding one overlay directory per platform.
    pub config_root: PathBuf,
    /// Directory receiving one build directory per platform.
    pub build_root: PathBuf,
    /// Stage load addresses.
    pub layout: AddressLayout,
    /// Compiler/linker flags.
    pub flags: FlagSet,
    /// Shared source files.
    pub sources: SourceSet,
}

impl BuildConfig {
    /// The built-in configuration: every enumerated platform, the fixed
    /// address layout, and the fixed flag set.
    pub fn builtin() -> Self {
        Self {
            platforms: Platform::builtin(),
            config_root: PathBuf::from("configs"),
            build_root: PathBuf::from("build"),
            layout: AddressLayout::default(),
            flags: FlagSet::default(),
            sources: SourceSet::default(),
        }
    }

    /// Replace the platform list.
    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.platforms = platforms;
        self
    }

    /// Replace the address layout.
    pub fn with_layout(mut self, layout: AddressLayout) -> Self {
        self.layout = layout;
        self
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::builtin()
    }
}
