//! `skillsync check` — upstream change detection across the registry.

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use skillsync_core::registry;
use skillsync_sync::{pipeline, pipeline::BundleCheck, LogCompleteness};

use super::{print_json, short_rev, AppContext};

/// Arguments for `skillsync check`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["name", "all"])))]
pub struct CheckArgs {
    /// Bundle to check.
    pub name: Option<String>,

    /// Check every registered bundle.
    #[arg(long)]
    pub all: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "checked")]
    old: String,
    #[tabled(rename = "upstream")]
    new: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl CheckArgs {
    pub fn run(self, ctx: &AppContext) -> Result<()> {
        let entries = match &self.name {
            Some(name) => vec![registry::get_at(ctx.registry_path(), name)?],
            None => registry::list_at(ctx.registry_path()).context("failed to load registry")?,
        };

        let checks = pipeline::check_all(&entries, &ctx.checker());
        if self.json {
            return print_json(&checks);
        }
        if checks.is_empty() {
            println!("No skills registered.");
            return Ok(());
        }

        print_table(&checks);
        print_logs(&checks);

        let pending = checks
            .iter()
            .filter(|c| c.result.has_updates == Some(true))
            .count();
        if pending > 0 {
            println!("Run 'skillsync diff bundle <name>' to review, 'skillsync update <name>' to apply.");
        }
        Ok(())
    }
}

fn print_table(checks: &[BundleCheck]) {
    let rows: Vec<CheckRow> = checks
        .iter()
        .map(|c| CheckRow {
            name: c.name.clone(),
            status: status_label(c.result.has_updates),
            old: short_rev(&c.result.old_revision).to_string(),
            new: c
                .result
                .new_revision
                .as_deref()
                .map(short_rev)
                .unwrap_or("-")
                .to_string(),
            detail: detail(c),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn print_logs(checks: &[BundleCheck]) {
    for check in checks {
        let Some(log) = &check.result.commit_log else {
            continue;
        };
        println!();
        println!("{}", format!("Commits for {}:", check.name).bold());
        if log.text.is_empty() {
            println!("  (none)");
        }
        for line in log.text.lines() {
            println!("  {line}");
        }
        if log.completeness == LogCompleteness::Truncated {
            println!(
                "  {}",
                "(older commits not in fetched history; log may be incomplete)".yellow()
            );
        }
    }
}

fn status_label(has_updates: Option<bool>) -> String {
    match has_updates {
        Some(true) => "UPDATES".yellow().bold().to_string(),
        Some(false) => "CURRENT".green().bold().to_string(),
        None => "UNKNOWN".red().bold().to_string(),
    }
}

fn detail(check: &BundleCheck) -> String {
    if let Some(err) = &check.result.error {
        return err.lines().next().unwrap_or_default().to_string();
    }
    match (&check.result.commit_log, check.result.has_updates) {
        (Some(log), _) => {
            let n = log.text.lines().count();
            match log.completeness {
                LogCompleteness::Complete => format!("{n} new commit(s)"),
                LogCompleteness::Truncated => format!("{n}+ new commit(s)"),
                LogCompleteness::Unavailable => "commit log unavailable".to_string(),
            }
        }
        (None, Some(false)) => "up to date".to_string(),
        (None, _) => String::new(),
    }
}
