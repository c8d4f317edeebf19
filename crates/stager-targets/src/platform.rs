//! Hardware platform variants the payload is built for.
//!
//! Each platform is identified by the SoC tag used for its `configs/<tag>`
//! overlay directory and its `build/<tag>` output directory.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Built-in platform identifiers, in build order.
pub const BUILTIN_PLATFORMS: &[(&str, &str)] = &[
    ("s5l8723", "S5L8723 bootrom (EFI firmware volume layout)"),
    ("s5l8443", "S5L8443 bootrom"),
];

/// A target hardware platform variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Platform {
    /// Platform identifier (e.g., "s5l8723").
    pub name: String,
}

impl Platform {
    /// Construct a platform with an arbitrary identifier.
    ///
    /// Used for substituted configurations; the CLI only ever builds
    /// [`Platform::builtin`].
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The S5L8723 platform.
    pub fn s5l8723() -> Self {
        Self::new("s5l8723")
    }

    /// The S5L8443 platform.
    pub fn s5l8443() -> Self {
        Self::new("s5l8443")
    }

    /// Every built-in platform, in build order.
    pub fn builtin() -> Vec<Self> {
        BUILTIN_PLATFORMS
            .iter()
            .map(|(tag, _)| Self::new(*tag))
            .collect()
    }

    /// Human-readable description for built-in platforms.
    pub fn description(&self) -> Option<&'static str> {
        BUILTIN_PLATFORMS
            .iter()
            .find(|(tag, _)| *tag == self.name)
            .map(|(_, description)| *description)
    }

    /// Whether the identifier can be used as a single directory name.
    pub fn is_path_component(&self) -> bool {
        !self.name.is_empty()
            && self.name != "."
            && self.name != ".."
            && !self.name.contains(['/', '\\'])
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
