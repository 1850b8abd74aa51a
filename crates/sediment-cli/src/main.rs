//! Sediment command-line tool
//!
//! Inspects and verifies layer snapshot files, and shows the runtime stub
//! section a layer configuration would reserve.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "sediment")]
#[command(about = "Layer snapshot provenance toolkit", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header and every record of a layer snapshot
    Inspect {
        /// Layer snapshot file
        file: PathBuf,
        /// Dump records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify checksum, record invariants and id references
    Verify {
        /// Layer snapshot file
        file: PathBuf,
    },

    /// Show the runtime vtable stub section for a layer configuration
    Stubs {
        /// Layer options file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn setup_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env("SEDIMENT_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);
    let color = output::resolve_color_choice(cli.color.as_deref());

    match cli.command {
        Commands::Inspect { file, json } => commands::inspect::execute(&file, json),
        Commands::Verify { file } => commands::verify::execute(&file, color),
        Commands::Stubs { config } => commands::stubs::execute(config.as_deref()),
    }
}
