//! casa-bootstrap: ensure the casa configuration record exists and points
//! at the current oxd server.
//!
//! # Usage
//!
//! ```text
//! casa-bootstrap [--settings <path>] [setup [--dry-run]]
//! casa-bootstrap [--settings <path>] diff
//! ```
//!
//! Settings come from `GLUU_*` environment variables layered over the
//! optional YAML file. Logs go to stderr; `RUST_LOG` overrides the level.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use casa_core::settings::SETTINGS_FILE_ENV;
use casa_core::Settings;
use commands::{diff::DiffArgs, setup::SetupArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "casa-bootstrap",
    version,
    about = "Create or update the casa configuration entry in the configured persistence backend",
    long_about = None,
)]
struct Cli {
    /// YAML file with setting keys; environment variables take precedence.
    #[arg(long, global = true, env = SETTINGS_FILE_ENV, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the casa entry, or patch its oxd host and port (default).
    Setup(SetupArgs),

    /// Show a unified diff of the stored blob against what setup would write.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let settings = Settings::load(cli.settings.as_deref()).context("invalid settings")?;
    tracing::debug!(
        persistence = %settings.persistence,
        backend = %settings.backend_kind(),
        "settings loaded"
    );
    match cli.command.unwrap_or_else(|| Commands::Setup(SetupArgs::default())) {
        Commands::Setup(args) => args.run(&settings),
        Commands::Diff(args) => args.run(&settings),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
