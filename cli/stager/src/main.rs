//! Stager CLI: builds the hook and shellcode payload images.

mod commands;
mod logger;

use std::process;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stager", version, about = "Two-stage ARM payload builder")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build hook.bin and shellcode.bin for every platform (the default)
    Build,
    /// Check toolchain, overlays, and configuration
    Doctor,
    /// Remove build artifacts
    Clean,
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command.unwrap_or(Commands::Build) {
        Commands::Build => commands::build::run(&cwd),
        Commands::Doctor => commands::doctor::run(&cwd),
        Commands::Clean => commands::clean::run(&cwd),
    }
}
