//! `skillsync registry …` — list, add, get, update, remove entries.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use skillsync_core::{registry, NewEntry, RegistryEntry};

use super::{format_age, print_json, short_rev, AppContext};

/// Manage the skill registry.
#[derive(Subcommand, Debug)]
pub enum RegistryCommand {
    /// List every registered bundle.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Register a bundle.
    Add(AddArgs),

    /// Print one entry as JSON.
    Get {
        name: String,
    },

    /// Change fields on an entry.
    Update(UpdateFieldsArgs),

    /// Unregister a bundle. Unknown names are not an error.
    Remove {
        name: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Unique bundle name.
    pub name: String,

    /// Remote repository (URL or local path).
    #[arg(long = "source", short = 's')]
    pub source_location: String,

    /// Bundle directory inside the remote repository.
    #[arg(long = "subpath", default_value = "")]
    pub source_subpath: String,

    /// Locally adapted copy.
    #[arg(long = "local", short = 'l')]
    pub local_path: PathBuf,

    /// Revision the local copy was taken from.
    #[arg(long, short = 'r')]
    pub revision: String,

    #[arg(long = "notes", default_value = "")]
    pub adaptation_notes: String,

    #[arg(long = "adaptation-diff", default_value = "")]
    pub adaptation_diff: String,
}

#[derive(Args, Debug)]
pub struct UpdateFieldsArgs {
    pub name: String,

    /// Field and new value; repeat for several fields.
    #[arg(
        long = "set",
        num_args = 2,
        value_names = ["FIELD", "VALUE"],
        action = clap::ArgAction::Append,
        required = true
    )]
    pub set: Vec<String>,
}

pub fn run(cmd: RegistryCommand, ctx: &AppContext) -> Result<()> {
    match cmd {
        RegistryCommand::List { json } => list(ctx, json),
        RegistryCommand::Add(args) => add(ctx, args),
        RegistryCommand::Get { name } => get(ctx, &name),
        RegistryCommand::Update(args) => update(ctx, args),
        RegistryCommand::Remove { name } => remove(ctx, &name),
    }
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "source")]
    source: String,
    #[tabled(rename = "checked")]
    checked: String,
    #[tabled(rename = "baseline")]
    baseline: String,
    #[tabled(rename = "local path")]
    local_path: String,
    #[tabled(rename = "updated")]
    updated: String,
}

impl From<&RegistryEntry> for EntryRow {
    fn from(e: &RegistryEntry) -> Self {
        let source = if e.source_subpath.is_empty() {
            e.source_location.clone()
        } else {
            format!("{} ({})", e.source_location, e.source_subpath)
        };
        Self {
            name: e.name.clone(),
            source,
            checked: short_rev(&e.last_checked_revision).to_string(),
            baseline: short_rev(&e.baseline_revision).to_string(),
            local_path: e.local_path.display().to_string(),
            updated: format_age(e.last_updated_at),
        }
    }
}

fn list(ctx: &AppContext, json: bool) -> Result<()> {
    let entries = registry::list_at(ctx.registry_path()).context("failed to load registry")?;
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No skills registered.");
        println!("Run: skillsync registry add <name> --source <remote> --local <dir> --revision <rev>");
        return Ok(());
    }

    let rows: Vec<EntryRow> = entries.iter().map(EntryRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn add(ctx: &AppContext, args: AddArgs) -> Result<()> {
    let entry = registry::add_at(
        ctx.registry_path(),
        NewEntry {
            name: args.name,
            source_location: args.source_location,
            source_subpath: args.source_subpath,
            local_path: args.local_path,
            revision: args.revision,
            adaptation_notes: args.adaptation_notes,
            adaptation_diff: args.adaptation_diff,
        },
    )?;
    println!(
        "{} Registered '{}' at {}",
        "✓".green(),
        entry.name,
        short_rev(&entry.baseline_revision)
    );
    Ok(())
}

fn get(ctx: &AppContext, name: &str) -> Result<()> {
    let entry = registry::get_at(ctx.registry_path(), name)?;
    print_json(&entry)
}

fn update(ctx: &AppContext, args: UpdateFieldsArgs) -> Result<()> {
    let fields = pair_fields(&args.set)?;
    let entry = registry::update_at(ctx.registry_path(), &args.name, &fields)?;
    println!(
        "{} Updated '{}': {}",
        "✓".green(),
        entry.name,
        fields
            .iter()
            .map(|(f, _)| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

fn remove(ctx: &AppContext, name: &str) -> Result<()> {
    if registry::remove_at(ctx.registry_path(), name)? {
        println!("{} Removed '{name}'", "✓".green());
    } else {
        println!("'{name}' was not registered.");
    }
    Ok(())
}

/// `[f1, v1, f2, v2]` → `[(f1, v1), (f2, v2)]`.
fn pair_fields(values: &[String]) -> Result<Vec<(String, String)>> {
    if values.len() % 2 != 0 {
        bail!("--set takes a field and a value");
    }
    Ok(values
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}
