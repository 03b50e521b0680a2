//! `skillsync update <name>` — check, snapshot, apply, and record in one step.
//!
//! Running the command is the confirmation; `--dry-run` stops after the diff.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use skillsync_core::{registry, RegistryEntry};
use skillsync_sync::{pipeline, pipeline::Review, render_report};

use super::{short_rev, AppContext};

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Registered bundle to update.
    pub name: String,

    /// Where the pre-update snapshot goes (default: configured `backup_root`).
    #[arg(long, value_name = "DIR")]
    pub backup_root: Option<PathBuf>,

    /// Show what would change without touching the local copy.
    #[arg(long)]
    pub dry_run: bool,
}

impl UpdateArgs {
    pub fn run(self, ctx: &AppContext) -> Result<()> {
        let entry = registry::get_at(ctx.registry_path(), &self.name)?;
        let checker = ctx.checker();
        let review = pipeline::review(&entry, &checker)?;

        let outcome = self.apply(ctx, &entry, &review);
        checker.release_result(&review.check);
        outcome
    }

    fn apply(&self, ctx: &AppContext, entry: &RegistryEntry, review: &Review) -> Result<()> {
        let name = &self.name;
        let check = &review.check;
        let new_revision = match (check.has_updates, &check.new_revision) {
            (None, _) => bail!(
                "upstream check failed for '{name}': {}",
                check.error.as_deref().unwrap_or("unknown error")
            ),
            (Some(false), _) => {
                println!("'{name}' is already up to date.");
                return Ok(());
            }
            (Some(true), Some(rev)) => rev.clone(),
            (Some(true), None) => bail!("upstream revision for '{name}' unknown"),
        };
        let Some(upstream_bundle) = &check.bundle_path else {
            bail!(
                "upstream copy for '{name}' unavailable: {}",
                check.error.as_deref().unwrap_or("unknown error")
            );
        };

        println!(
            "'{name}': {} → {}",
            short_rev(&check.old_revision),
            short_rev(&new_revision)
        );
        if let Some(log) = &check.commit_log {
            for line in log.text.lines() {
                println!("  {line}");
            }
        }
        print!("{}", render_report(&review.diffs));

        if self.dry_run {
            println!("Dry run: nothing applied.");
            return Ok(());
        }

        let applied = pipeline::apply_update(
            entry,
            upstream_bundle,
            &ctx.backup_root(self.backup_root.clone()),
        )
        .with_context(|| format!("update of '{name}' failed"))?;
        pipeline::record_update_at(ctx.registry_path(), name, &new_revision)
            .with_context(|| format!("applied update but failed to record revision for '{name}'"))?;

        println!(
            "{} Updated '{name}' to {} ({} file(s) copied)",
            "✓".green(),
            short_rev(&new_revision),
            applied.copied.len()
        );
        println!("Backup: {}", applied.backup.display());
        println!(
            "Undo with: skillsync restore {} {}",
            applied.backup.display(),
            entry.local_path.display()
        );
        Ok(())
    }
}
