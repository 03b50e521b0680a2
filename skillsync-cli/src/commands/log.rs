//! `skillsync log` — commits on a remote since a known revision.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use skillsync_sync::LogCompleteness;

use super::AppContext;

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Remote repository (URL or local path).
    #[arg(long)]
    pub remote: String,

    /// Revision to list commits after.
    #[arg(long)]
    pub since: String,

    /// History depth to fetch (default: configured `log_depth`).
    #[arg(long)]
    pub depth: Option<u32>,
}

impl LogArgs {
    pub fn run(self, ctx: &AppContext) -> Result<()> {
        let checker = ctx.checker();
        let depth = self.depth.unwrap_or(ctx.settings.log_depth).max(1);
        let clone = checker
            .fetch(&self.remote, depth)
            .with_context(|| format!("could not fetch {}", self.remote))?;

        let log = checker.change_log(&clone, &self.since);
        checker
            .release(&clone)
            .with_context(|| format!("failed to remove {}", clone.display()))?;
        let log = log.with_context(|| format!("could not read log of {}", self.remote))?;

        if log.text.is_empty() {
            println!("No commits after {}.", self.since);
        } else {
            println!("{}", log.text);
        }
        if log.completeness == LogCompleteness::Truncated {
            eprintln!(
                "{}",
                format!(
                    "warning: {} not within the last {depth} commit(s); log may be incomplete",
                    self.since
                )
                .yellow()
            );
        }
        Ok(())
    }
}
