//! `stager doctor`: toolchain and project diagnostics.

use std::path::Path;
use std::process::Command;

use anyhow::Result;
use stager_build::TaskGraph;
use stager_targets::{
    build_config_to_toml, validate_build_config, BuildConfig, PlatformConfigResolver,
    ToolchainConfig,
};

/// Print toolchain, layout, overlay, and configuration status.
pub fn run(project_dir: &Path) -> Result<()> {
    let config = BuildConfig::builtin();
    let toolchain = ToolchainConfig::from_env();
    report(project_dir, &config, &toolchain)
}

fn report(project_dir: &Path, config: &BuildConfig, toolchain: &ToolchainConfig) -> Result<()> {
    println!("=== Stager Doctor ===");
    println!();
    println!("Stager version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("--- Toolchain ---");
    println!(
        "  Prefix: {} ({})",
        toolchain.prefix.to_string_lossy(),
        toolchain.source
    );
    print_tool_status("compiler", &toolchain.compiler, &["--version"]);
    print_tool_status("objcopy", &toolchain.objcopy, &["--version"]);
    println!();

    println!("--- Layout ---");
    println!("  Hook base:      0x{:08X}", config.layout.hook_base);
    println!("  Shellcode base: 0x{:08X}", config.layout.shellcode_base);
    println!("  Hook capacity:  {} bytes", config.layout.hook_capacity());
    println!();

    let graph = TaskGraph::standard()?;
    let plan = graph.plan();
    println!("--- Pipeline ---");
    println!("  Tasks per platform: {}", graph.tasks().len());
    println!("  Sequential depth:   {}", plan.sequential_depth);
    println!("  Max parallelism:    {}", plan.max_parallelism);
    println!();

    println!("--- Sources ---");
    for (role, path) in config.sources.entries() {
        let status = if project_dir.join(path).is_file() {
            "ok"
        } else {
            log::warn!("{role} source {} is missing", path.display());
            "missing"
        };
        println!("  {role:<18} {status:<8} {}", path.display());
    }
    println!();

    println!("--- Platforms ---");
    let resolver = PlatformConfigResolver::new(project_dir, config);
    for platform in &config.platforms {
        let dirs = resolver.locate(platform);
        let missing = dirs.missing_overlays();
        let description = platform.description().unwrap_or("custom platform");
        if missing.is_empty() {
            println!("  {platform}: overlays ok ({description})");
        } else {
            println!("  {platform}: {} overlay(s) missing ({description})", missing.len());
            for path in &missing {
                log::warn!("{platform}: missing overlay {}", path.display());
                println!("    - {}", path.display());
            }
        }
    }
    println!();

    println!("--- Configuration ---");
    match validate_build_config(config) {
        Ok(()) => println!("  Status: valid"),
        Err(issues) => {
            for issue in &issues {
                println!("  {}: {}", issue.severity, issue.message);
            }
        }
    }
    println!();
    print!("{}", build_config_to_toml(config)?);

    Ok(())
}

fn print_tool_status(role: &str, program: &Path, args: &[&str]) {
    match Command::new(program).args(args).output() {
        Ok(output) => {
            let version = String::from_utf8_lossy(&output.stdout);
            let first_line = version.lines().next().unwrap_or("(unknown version)");
            println!("  {role}: {first_line}");
        }
        Err(_) => {
            println!("  {role}: not found at {}", program.display());
        }
    }
}
