//! `casa-bootstrap setup`: create or patch the casa configuration record.

use anyhow::{Context, Result};
use clap::Args;

use casa_core::Settings;
use casa_sync::{pipeline, ReconcileOutcome};

/// Arguments for `casa-bootstrap setup`.
#[derive(Args, Debug, Default)]
pub struct SetupArgs {
    /// Report what would be written without writing.
    #[arg(long)]
    pub dry_run: bool,
}

impl SetupArgs {
    pub fn run(self, settings: &Settings) -> Result<()> {
        let outcome = pipeline::run(settings, self.dry_run).with_context(|| {
            format!(
                "casa config setup failed on {} backend",
                settings.backend_kind()
            )
        })?;

        if self.dry_run {
            print_dry_run(&outcome);
        }
        Ok(())
    }
}

fn print_dry_run(outcome: &ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::WouldCreate { key } => {
            println!("[dry-run] would create {key}");
        }
        ReconcileOutcome::WouldPatch { key, drift } => {
            println!("[dry-run] would patch {key}");
            for d in drift {
                let stored = d
                    .stored
                    .as_ref()
                    .map_or_else(|| "<missing>".to_owned(), ToString::to_string);
                println!("  {}: {stored} -> {}", d.path(), d.desired);
            }
        }
        other => println!("[dry-run] {} is up to date", other.key()),
    }
}
