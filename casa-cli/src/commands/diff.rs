//! `casa-bootstrap diff`: show what setup would change in the stored blob.

use anyhow::{Context, Result};
use clap::Args;

use casa_core::Settings;
use casa_sync::pipeline;

/// Arguments for `casa-bootstrap diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self, settings: &Settings) -> Result<()> {
        let result = pipeline::diff(settings).context("diff failed")?;

        if result.is_clean() {
            println!("No differences for '{}'.", result.key);
            return Ok(());
        }

        match result.unified_diff {
            Some(diff) => {
                print!("{diff}");
                if !diff.ends_with('\n') {
                    println!();
                }
            }
            None => println!("'{}' does not exist yet; setup would create it.", result.key),
        }
        Ok(())
    }
}
