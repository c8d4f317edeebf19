//! Per-platform directory resolution.

use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::error::{Result, TargetError};
use crate::platform::Platform;

/// Header overlay forced into the hook body.
pub const HOOK_HEADER: &str = "hook.h";
/// Header overlay forced into the support library.
pub const CONFIG_HEADER: &str = "config.h";
/// Assembly overlay forced into the shellcode body.
pub const CONFIG_ASM: &str = "config.S";

/// Resolved directories of one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDirs {
    /// The platform these directories belong to.
    pub platform: Platform,
    /// Externally supplied overlay directory (read-only).
    pub config_dir: PathBuf,
    /// Output directory owned by this platform's pipeline.
    pub build_dir: PathBuf,
}

impl PlatformDirs {
    /// Overlay forced into the hook body.
    pub fn hook_header(&self) -> PathBuf {
        self.config_dir.join(HOOK_HEADER)
    }

    /// Overlay forced into the support library.
    pub fn config_header(&self) -> PathBuf {
        self.config_dir.join(CONFIG_HEADER)
    }

    /// Overlay forced into the shellcode body.
    pub fn config_asm(&self) -> PathBuf {
        self.config_dir.join(CONFIG_ASM)
    }

    /// Path of a named artifact inside the build directory.
    pub fn artifact(&self, file_name: &str) -> PathBuf {
        self.build_dir.join(file_name)
    }

    /// Overlay files that do not exist on disk.
    pub fn missing_overlays(&self) -> Vec<PathBuf> {
        [self.hook_header(), self.config_header(), self.config_asm()]
            .into_iter()
            .filter(|path| !path.is_file())
            .collect()
    }
}

/// Maps platforms to their overlay and build directories under a project.
#[derive(Debug, Clone)]
pub struct PlatformConfigResolver {
    config_root: PathBuf,
    build_root: PathBuf,
}

impl PlatformConfigResolver {
    /// Resolver for `project_dir` using the roots named in `config`.
    pub fn new(project_dir: &Path, config: &BuildConfig) -> Self {
        Self {
            config_root: project_dir.join(&config.config_root),
            build_root: project_dir.join(&config.build_root),
        }
    }

    /// Root of all platform build directories.
    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Compute a platform's directories without touching the filesystem.
    pub fn locate(&self, platform: &Platform) -> PlatformDirs {
        PlatformDirs {
            platform: platform.clone(),
            config_dir: self.config_root.join(&platform.name),
            build_dir: self.build_root.join(&platform.name),
        }
    }

    /// Resolve a platform's directories, creating its build directory.
    ///
    /// Creation is recursive and succeeds when the directory already exists.
    /// The config directory is not checked; missing overlays surface as
    /// compiler errors.
    pub fn resolve(&self, platform: &Platform) -> Result<PlatformDirs> {
        let dirs = self.locate(platform);
        std::fs::create_dir_all(&dirs.build_dir).map_err(|source| {
            TargetError::CreateBuildDir {
                path: dirs.build_dir.clone(),
                source,
            }
        })?;
        log::debug!(
            "platform {}: config {}, build {}",
            platform,
            dirs.config_dir.display(),
            dirs.build_dir.display()
        );
        Ok(dirs)
    }
}
