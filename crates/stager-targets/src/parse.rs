//! TOML parsing, serialization, and validation for build configurations.

use std::collections::HashSet;

use crate::config::BuildConfig;
use crate::error::{Result, TargetError};

/// A validation issue found in a build configuration.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: "error",
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: "warning",
            message: message.into(),
        }
    }
}

/// Parse a build configuration from a TOML string.
pub fn parse_build_config(toml_str: &str) -> Result<BuildConfig> {
    let config: BuildConfig = toml::from_str(toml_str)?;
    Ok(config)
}

/// Serialize a build configuration to pretty TOML.
pub fn build_config_to_toml(config: &BuildConfig) -> Result<String> {
    let toml_str = toml::to_string_pretty(config)?;
    Ok(toml_str)
}

/// Validate a build configuration for structural correctness.
///
/// Returns `Ok(())` if valid, or `Err(issues)` with a list of problems.
/// Warnings alone do not make a configuration invalid.
pub fn validate_build_config(config: &BuildConfig) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    // 1. At least one platform
    if config.platforms.is_empty() {
        issues.push(ValidationIssue::error("platform list is empty"));
    }

    // 2. Platform names are unique directory names
    let mut seen = HashSet::new();
    for platform in &config.platforms {
        if !platform.is_path_component() {
            issues.push(ValidationIssue::error(format!(
                "platform '{}' is not a single directory name",
                platform.name
            )));
        }
        if !seen.insert(platform.name.as_str()) {
            issues.push(ValidationIssue::error(format!(
                "platform '{}' is listed more than once",
                platform.name
            )));
        }
    }

    // 3. Both load addresses fit a 32-bit address space
    let layout = &config.layout;
    for (stage, address) in [("shellcode", layout.shellcode_base), ("hook", layout.hook_base)] {
        if address > u64::from(u32::MAX) {
            issues.push(ValidationIssue::error(format!(
                "{stage} base 0x{address:X} does not fit a 32-bit address space"
            )));
        }
    }

    // 4. Hook sits below the shellcode
    if layout.hook_base >= layout.shellcode_base {
        issues.push(ValidationIssue::error(format!(
            "hook base 0x{:X} is not below shellcode base 0x{:X}",
            layout.hook_base, layout.shellcode_base
        )));
    }

    // 5. Load addresses are word aligned
    for (stage, address) in [("shellcode", layout.shellcode_base), ("hook", layout.hook_base)] {
        if address % 4 != 0 {
            issues.push(ValidationIssue::warning(format!(
                "{stage} base 0x{address:X} is not word aligned"
            )));
        }
    }

    // 6. Entry symbol and object format are set
    if config.flags.entry_symbol.trim().is_empty() {
        issues.push(ValidationIssue::error("entry symbol is empty"));
    }
    if config.flags.object_format.trim().is_empty() {
        issues.push(ValidationIssue::error("object format is empty"));
    }

    if issues.iter().any(|i| i.severity == "error") {
        Err(issues)
    } else {
        Ok(())
    }
}

/// Validate and turn the first error into a [`TargetError::Validation`].
pub fn require_valid(config: &BuildConfig) -> Result<()> {
    validate_build_config(config).map_err(|issues| {
        let detail = issues
            .iter()
            .filter(|i| i.severity == "error")
            .map(|i| i.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        TargetError::Validation { detail }
    })
}
