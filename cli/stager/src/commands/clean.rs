//! `stager clean`: remove build artifacts.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use stager_targets::{BuildConfig, PlatformConfigResolver};

/// Remove the build root and everything under it.
pub fn run(project_dir: &Path) -> Result<()> {
    let config = BuildConfig::builtin();
    let resolver = PlatformConfigResolver::new(project_dir, &config);
    let build_dir = resolver.build_root();

    if build_dir.exists() {
        fs::remove_dir_all(build_dir)
            .with_context(|| format!("failed to remove {}", build_dir.display()))?;
        println!("Removed {}", build_dir.display());
    } else {
        println!("Already clean: {} does not exist", build_dir.display());
    }

    Ok(())
}
