//! `skillsync backup`, `copy`, `restore` — the manual building blocks of an update.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use skillsync_sync::backup;

use super::AppContext;

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Local bundle directory to snapshot.
    pub local: PathBuf,

    /// Where snapshots go (default: configured `backup_root`).
    #[arg(long, value_name = "DIR")]
    pub backup_root: Option<PathBuf>,
}

impl BackupArgs {
    pub fn run(self, ctx: &AppContext) -> Result<()> {
        let root = ctx.backup_root(self.backup_root);
        let snapshot = backup::snapshot(&self.local, &root)
            .with_context(|| format!("failed to back up {}", self.local.display()))?;
        println!("{} Backed up to {}", "✓".green(), snapshot.display());
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Upstream bundle directory.
    pub upstream: PathBuf,

    /// Local directory to overwrite. Files only present locally are kept.
    pub local: PathBuf,
}

impl CopyArgs {
    pub fn run(self) -> Result<()> {
        let copied = backup::apply_upstream(&self.upstream, &self.local).with_context(|| {
            format!(
                "failed to copy {} to {}",
                self.upstream.display(),
                self.local.display()
            )
        })?;
        for rel in &copied {
            println!("  {rel}");
        }
        println!(
            "{} Copied {} file(s) into {}",
            "✓".green(),
            copied.len(),
            self.local.display()
        );
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Snapshot directory created by `skillsync backup` or `update`.
    pub backup: PathBuf,

    /// Local directory to replace.
    pub local: PathBuf,
}

impl RestoreArgs {
    pub fn run(self) -> Result<()> {
        backup::rollback(&self.backup, &self.local)
            .with_context(|| format!("failed to restore {}", self.local.display()))?;
        println!(
            "{} Restored {} from {}",
            "✓".green(),
            self.local.display(),
            self.backup.display()
        );
        Ok(())
    }
}
