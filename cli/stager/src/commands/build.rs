//! `stager build`: run the payload pipeline for every platform.

use std::path::Path;

use anyhow::{Context, Result};
use stager_build::{BuildReport, PipelineOrchestrator, ProcessRunner, ToolRunner};
use stager_targets::{BuildConfig, ToolchainConfig};

/// Build every built-in platform with the toolchain named by the environment.
pub fn run(project_dir: &Path) -> Result<()> {
    let config = BuildConfig::builtin();
    let toolchain = ToolchainConfig::from_env();
    build(project_dir, &config, &toolchain, &ProcessRunner)?;
    Ok(())
}

/// Build each platform in `config` in order, stopping at the first failure.
pub fn build(
    project_dir: &Path,
    config: &BuildConfig,
    toolchain: &ToolchainConfig,
    runner: &dyn ToolRunner,
) -> Result<Vec<BuildReport>> {
    let orchestrator = PipelineOrchestrator::new(project_dir, config, toolchain, runner)
        .context("invalid build configuration")?;

    if toolchain.is_overridden() {
        println!("Toolchain: {}", toolchain.prefix.to_string_lossy());
    }

    let mut reports = Vec::with_capacity(config.platforms.len());
    for platform in &config.platforms {
        println!("Platform: {platform}");
        let report = orchestrator.run_platform(platform)?;
        println!();
        print!("{report}");
        println!();
        reports.push(report);
    }

    println!(
        "Built {} platform(s) into {}",
        reports.len(),
        project_dir.join(&config.build_root).display()
    );
    Ok(reports)
}
