//! Cross-toolchain executable resolution.
//!
//! Tool paths are built by plain concatenation of a prefix and a fixed tool
//! name, the way GNU cross toolchains name their binaries
//! (`arm-none-eabi-gcc`, `arm-none-eabi-objcopy`). The prefix is kept as an
//! `OsString`, so any byte sequence the environment holds is honoured. Nothing
//! here checks that the resulting files exist; a bad prefix shows up as a
//! launch failure.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;

/// Environment variable overriding the toolchain prefix.
pub const PREFIX_ENV: &str = "GNUARM_PREFIX";

/// Prefix used when [`PREFIX_ENV`] is unset.
pub const DEFAULT_PREFIX: &str =
    "/opt/arm-gnu-toolchain-13.3.rel1-darwin-arm64-arm-none-eabi/bin/arm-none-eabi-";

const COMPILER: &str = "gcc";
// The compiler driver doubles as the linker.
const LINKER: &str = "gcc";
const OBJCOPY: &str = "objcopy";

/// Where a toolchain prefix came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixSource {
    /// [`DEFAULT_PREFIX`].
    Default,
    /// The [`PREFIX_ENV`] variable.
    Environment,
    /// Passed in directly by the caller.
    Explicit,
}

impl fmt::Display for PrefixSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixSource::Default => f.write_str("default"),
            PrefixSource::Environment => write!(f, "from {PREFIX_ENV}"),
            PrefixSource::Explicit => f.write_str("explicit"),
        }
    }
}

/// Resolved toolchain executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainConfig {
    /// Prefix the tool names were appended to.
    pub prefix: OsString,
    pub source: PrefixSource,
    /// C/assembly compiler driver.
    pub compiler: PathBuf,
    /// Linker driver.
    pub linker: PathBuf,
    /// Object format converter.
    pub objcopy: PathBuf,
}

fn tool_path(prefix: &OsStr, tool: &str) -> PathBuf {
    let mut path = prefix.to_os_string();
    path.push(tool);
    PathBuf::from(path)
}

impl ToolchainConfig {
    fn with_source(prefix: OsString, source: PrefixSource) -> Self {
        Self {
            compiler: tool_path(&prefix, COMPILER),
            linker: tool_path(&prefix, LINKER),
            objcopy: tool_path(&prefix, OBJCOPY),
            prefix,
            source,
        }
    }

    /// Build tool paths from an explicit prefix.
    pub fn from_prefix(prefix: impl Into<OsString>) -> Self {
        Self::with_source(prefix.into(), PrefixSource::Explicit)
    }

    /// Resolve from the value of [`PREFIX_ENV`], falling back to
    /// [`DEFAULT_PREFIX`] when it is unset.
    pub fn resolve(prefix_override: Option<OsString>) -> Self {
        match prefix_override {
            Some(prefix) => Self::with_source(prefix, PrefixSource::Environment),
            None => Self::with_source(DEFAULT_PREFIX.into(), PrefixSource::Default),
        }
    }

    /// Resolve from the process environment. Reads [`PREFIX_ENV`] once.
    pub fn from_env() -> Self {
        let prefix_override = std::env::var_os(PREFIX_ENV);
        if let Some(prefix) = &prefix_override {
            log::debug!(
                "{PREFIX_ENV} overrides toolchain prefix: {}",
                prefix.to_string_lossy()
            );
        }
        Self::resolve(prefix_override)
    }

    /// Whether the prefix was supplied rather than defaulted.
    pub fn is_overridden(&self) -> bool {
        self.source != PrefixSource::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefix_paths() {
        let tc = ToolchainConfig::resolve(None);
        assert_eq!(tc.prefix, DEFAULT_PREFIX);
        assert_eq!(
            tc.compiler,
            PathBuf::from(format!("{DEFAULT_PREFIX}gcc"))
        );
        assert_eq!(tc.linker, tc.compiler);
        assert_eq!(
            tc.objcopy,
            PathBuf::from(format!("{DEFAULT_PREFIX}objcopy"))
        );
        assert_eq!(tc.source, PrefixSource::Default);
        assert!(!tc.is_overridden());
    }

    #[test]
    fn override_is_concatenated_verbatim() {
        let tc = ToolchainConfig::resolve(Some("/usr/bin/arm-none-eabi-".into()));
        assert_eq!(tc.compiler, PathBuf::from("/usr/bin/arm-none-eabi-gcc"));
        assert_eq!(tc.objcopy, PathBuf::from("/usr/bin/arm-none-eabi-objcopy"));
        assert!(tc.is_overridden());
    }

    #[test]
    fn override_equal_to_default_still_counts() {
        let tc = ToolchainConfig::resolve(Some(DEFAULT_PREFIX.into()));
        assert_eq!(tc.compiler, ToolchainConfig::resolve(None).compiler);
        assert_eq!(tc.source, PrefixSource::Environment);
        assert!(tc.is_overridden());
        assert_eq!(tc.source.to_string(), "from GNUARM_PREFIX");
    }

    #[test]
    fn empty_override_means_path_lookup() {
        let tc = ToolchainConfig::resolve(Some(OsString::new()));
        assert_eq!(tc.compiler, PathBuf::from("gcc"));
        assert_eq!(tc.objcopy, PathBuf::from("objcopy"));
    }

    // The only test that touches the process environment.
    #[test]
    fn reads_prefix_from_environment() {
        std::env::set_var(PREFIX_ENV, "/env/arm-none-eabi-");
        let set = ToolchainConfig::from_env();
        assert_eq!(set.compiler, PathBuf::from("/env/arm-none-eabi-gcc"));
        assert_eq!(set.objcopy, PathBuf::from("/env/arm-none-eabi-objcopy"));
        assert_eq!(set.source, PrefixSource::Environment);

        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStrExt;
            let raw = OsStr::from_bytes(b"/opt/t\xff/arm-none-eabi-");
            std::env::set_var(PREFIX_ENV, raw);
            let non_utf8 = ToolchainConfig::from_env();
            assert_eq!(non_utf8.prefix.as_os_str(), raw);
            assert_eq!(
                non_utf8.compiler.as_os_str().as_bytes(),
                b"/opt/t\xff/arm-none-eabi-gcc"
            );
            assert!(non_utf8.is_overridden());
        }

        std::env::remove_var(PREFIX_ENV);
        let unset = ToolchainConfig::from_env();
        assert_eq!(unset.prefix, DEFAULT_PREFIX);
        assert_eq!(unset.source, PrefixSource::Default);
    }
}
