//! Per-platform build report.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use stager_targets::AddressLayout;

use crate::error::BuildError;
use crate::graph::{Artifact, StageState};

/// File name of the JSON report written next to the artifacts.
pub const REPORT_FILE: &str = "build-report.json";

/// One produced file.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    pub artifact: Artifact,
    pub path: PathBuf,
    pub size: u64,
    /// SHA-256 of the file contents, lowercase hex.
    pub sha256: String,
}

impl ArtifactRecord {
    /// Read `path` and record its size and digest.
    pub fn capture(artifact: Artifact, path: &Path) -> Result<Self, BuildError> {
        let data = std::fs::read(path).map_err(|e| BuildError::io(path, e))?;
        let mut hasher = Sha256::new();
        hasher.update(&data);
        let digest = hasher.finalize();
        Ok(Self {
            artifact,
            path: path.to_path_buf(),
            size: data.len() as u64,
            sha256: digest.iter().map(|b| format!("{b:02x}")).collect(),
        })
    }
}

/// Summary of one platform's pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub platform: String,
    pub final_state: StageState,
    pub duration_ms: u64,
    pub layout: AddressLayout,
    /// Address of the hook copy inside the shellcode image.
    pub hook_embedded_at: Option<u64>,
    /// Every artifact, in the order it was produced.
    pub artifacts: Vec<ArtifactRecord>,
}

impl BuildReport {
    /// Serialize as pretty JSON into `dir`, returning the written path.
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf, BuildError> {
        let path = dir.join(REPORT_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| BuildError::Config {
            message: format!("cannot serialize build report: {e}"),
        })?;
        std::fs::write(&path, json).map_err(|e| BuildError::io(&path, e))?;
        Ok(path)
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Build Report: {} ===", self.platform)?;
        writeln!(f, "State: {}", self.final_state)?;
        writeln!(f, "Duration: {} ms", self.duration_ms)?;
        writeln!(f)?;

        writeln!(f, "--- Layout ---")?;
        writeln!(f, "  Hook base:      0x{:08X}", self.layout.hook_base)?;
        writeln!(f, "  Shellcode base: 0x{:08X}", self.layout.shellcode_base)?;
        if let Some(address) = self.hook_embedded_at {
            writeln!(f, "  Hook embedded:  0x{address:08X}")?;
        }

        writeln!(f)?;
        writeln!(f, "--- Artifacts ---")?;
        for record in &self.artifacts {
            writeln!(
                f,
                "  {:<14} {:>8} bytes  {}{}",
                record.artifact.file_name(),
                record.size,
                &record.sha256[..record.sha256.len().min(16)],
                if record.artifact.is_deliverable() {
                    "  *"
                } else {
                    ""
                },
            )?;
        }

        Ok(())
    }
}
