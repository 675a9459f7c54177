//! plugpack: WordPress plugin packaging CLI.
//!
//! # Usage
//!
//! ```text
//! plugpack build [PATH] [--config FILE] [--timeout SECS] [--run-as USER] [--json]
//! plugpack version [PATH] [--config FILE]
//! plugpack validate [PATH] [--config FILE] [--json]
//! plugpack tools [PATH] [--config FILE]
//! ```

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{
    build::BuildArgs, tools::ToolsArgs, validate::ValidateArgs, version::VersionArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "plugpack",
    version,
    about = "Build, package and validate WordPress plugins",
    long_about = None,
)]
struct Cli {
    /// Log progress to stderr (`-v` info, `-vv` debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full packaging pipeline and produce both archives.
    Build(BuildArgs),

    /// Print the resolved plugin slug and version.
    Version(VersionArgs),

    /// Check an existing build directory for expected contents.
    Validate(ValidateArgs),

    /// Show which external tools are available for a project.
    Tools(ToolsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Build(args) => args.run(),
        Commands::Version(args) => args.run(),
        Commands::Validate(args) => args.run(),
        Commands::Tools(args) => args.run(),
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
