//! `skillsync diff` — file, directory, and registered-bundle comparisons.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde::Serialize;

use skillsync_core::registry;
use skillsync_sync::{
    classify::is_binary,
    diff::{diff_file, diff_tree, render_report, DiffSummary, FileDiff},
    pipeline,
};

use super::{print_json, short_rev, AppContext};

/// Compare a local copy with an upstream copy.
#[derive(Subcommand, Debug)]
pub enum DiffCommand {
    /// Unified diff of two text files.
    File { local: PathBuf, upstream: PathBuf },

    /// Compare two directory trees.
    Dir {
        local: PathBuf,
        upstream: PathBuf,
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Fetch a registered bundle's upstream and compare it with the local copy.
    Bundle {
        name: String,
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct TreeDiffJson<'a> {
    summary: DiffSummary,
    files: &'a [FileDiff],
}

pub fn run(cmd: DiffCommand, ctx: &AppContext) -> Result<()> {
    match cmd {
        DiffCommand::File { local, upstream } => file(&local, &upstream),
        DiffCommand::Dir {
            local,
            upstream,
            json,
        } => dir(&local, &upstream, json),
        DiffCommand::Bundle { name, json } => bundle(ctx, &name, json),
    }
}

fn file(local: &Path, upstream: &Path) -> Result<()> {
    let binary = [local, upstream]
        .iter()
        .any(|p| p.exists() && is_binary(p));
    if binary {
        let same = std::fs::read(local).ok() == std::fs::read(upstream).ok();
        if !same {
            println!(
                "Binary files {} and {} differ",
                local.display(),
                upstream.display()
            );
        }
        return Ok(());
    }

    let diff = diff_file(local, upstream)
        .with_context(|| format!("failed to diff {}", local.display()))?;
    print!("{diff}");
    Ok(())
}

fn dir(local: &Path, upstream: &Path, json: bool) -> Result<()> {
    let diffs = diff_tree(local, upstream)?;
    print_diffs(&diffs, json)
}

fn bundle(ctx: &AppContext, name: &str, json: bool) -> Result<()> {
    let entry = registry::get_at(ctx.registry_path(), name)?;
    let checker = ctx.checker();
    let review = pipeline::review(&entry, &checker)?;
    checker.release_result(&review.check);

    match review.check.has_updates {
        None => bail!(
            "upstream check failed for '{name}': {}",
            review.check.error.as_deref().unwrap_or("unknown error")
        ),
        Some(false) => {
            if json {
                return print_diffs(&[], true);
            }
            println!(
                "'{name}' is up to date at {}.",
                short_rev(&entry.last_checked_revision)
            );
            Ok(())
        }
        Some(true) => {
            if !json {
                println!(
                    "'{name}': {} → {}",
                    short_rev(&review.check.old_revision),
                    review.check.new_revision.as_deref().map(short_rev).unwrap_or("?")
                );
            }
            if review.check.bundle_path.is_none() {
                bail!(
                    "upstream copy for '{name}' unavailable: {}",
                    review.check.error.as_deref().unwrap_or("unknown error")
                );
            }
            print_diffs(&review.diffs, json)
        }
    }
}

fn print_diffs(diffs: &[FileDiff], json: bool) -> Result<()> {
    if json {
        return print_json(&TreeDiffJson {
            summary: DiffSummary::from_diffs(diffs),
            files: diffs,
        });
    }
    print!("{}", render_report(diffs));
    if !diffs.is_empty() {
        let s = DiffSummary::from_diffs(diffs);
        println!(
            "{} file(s) differ: {} modified, {} new, {} deleted, {} binary changed, {} binary new",
            s.total(),
            s.modified,
            s.new,
            s.deleted,
            s.binary_changed,
            s.binary_new
        );
    }
    Ok(())
}
