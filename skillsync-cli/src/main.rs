//! skillsync — keep locally adapted skill bundles in step with upstream.
//!
//! # Usage
//!
//! ```text
//! skillsync registry list [--json]
//! skillsync registry add <name> --source <remote> --local <dir> --revision <rev> [--subpath <p>]
//! skillsync registry get|remove <name>
//! skillsync registry update <name> --set <field> <value> [--set ...]
//! skillsync check <name> | --all [--json]
//! skillsync log --remote <remote> --since <rev> [--depth N]
//! skillsync diff file|dir <local> <upstream> [--json]
//! skillsync diff bundle <name> [--json]
//! skillsync backup <local> [--backup-root DIR]
//! skillsync copy <upstream> <local>
//! skillsync restore <backup> <local>
//! skillsync update <name> [--backup-root DIR] [--dry-run]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    backup::{BackupArgs, CopyArgs, RestoreArgs},
    check::CheckArgs,
    diff::DiffCommand,
    log::LogArgs,
    registry::RegistryCommand,
    update::UpdateArgs,
    AppContext,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "skillsync",
    version,
    about = "Track locally adapted skill bundles against their upstream sources",
    long_about = None,
)]
struct Cli {
    /// Config file (default: $SKILLSYNC_CONFIG or ~/.skillsync/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Registry file, overriding the configured one.
    #[arg(long, global = true, value_name = "PATH")]
    registry: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect and edit the skill registry.
    Registry {
        #[command(subcommand)]
        command: RegistryCommand,
    },

    /// Check registered bundles for upstream changes.
    Check(CheckArgs),

    /// Show upstream commits since a revision.
    Log(LogArgs),

    /// Compare files, directories, or a bundle against upstream.
    Diff {
        #[command(subcommand)]
        command: DiffCommand,
    },

    /// Snapshot a local bundle directory.
    Backup(BackupArgs),

    /// Copy an upstream bundle over a local directory.
    Copy(CopyArgs),

    /// Replace a local directory with a snapshot.
    Restore(RestoreArgs),

    /// Check, snapshot, apply, and record an upstream update for one bundle.
    Update(UpdateArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = AppContext::load(cli.config, cli.registry)?;
    match cli.command {
        Commands::Registry { command } => commands::registry::run(command, &ctx),
        Commands::Check(args) => args.run(&ctx),
        Commands::Log(args) => args.run(&ctx),
        Commands::Diff { command } => commands::diff::run(command, &ctx),
        Commands::Backup(args) => args.run(&ctx),
        Commands::Copy(args) => args.run(),
        Commands::Restore(args) => args.run(),
        Commands::Update(args) => args.run(&ctx),
    }
}

/// stderr subscriber; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
