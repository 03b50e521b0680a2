pub mod backup;
pub mod check;
pub mod diff;
pub mod log;
pub mod registry;
pub mod update;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use skillsync_core::Settings;
use skillsync_sync::UpstreamChecker;

/// Settings resolved once per invocation and shared by every command.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub settings: Settings,
}

impl AppContext {
    pub fn load(config: Option<PathBuf>, registry: Option<PathBuf>) -> Result<Self> {
        let mut settings = match config {
            Some(path) => {
                let home = dirs::home_dir().context("could not determine home directory")?;
                Settings::load_at(&home, &path)
            }
            None => Settings::load(),
        }
        .context("failed to load configuration")?;

        if let Some(path) = registry {
            settings.registry_path = path;
        }
        tracing::debug!("registry: {}", settings.registry_path.display());
        Ok(Self { settings })
    }

    pub fn registry_path(&self) -> &Path {
        &self.settings.registry_path
    }

    pub fn checker(&self) -> UpstreamChecker {
        UpstreamChecker::from_settings(&self.settings)
    }

    /// `--backup-root` if given, else the configured root.
    pub fn backup_root(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.unwrap_or_else(|| self.settings.backup_root.clone())
    }
}

/// First seven characters of a revision, for tables.
pub fn short_rev(rev: &str) -> &str {
    rev.get(..7).unwrap_or(rev)
}

pub fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0);
    if seconds < 60 {
        return format!("{seconds}s ago");
    }
    if seconds < 60 * 60 {
        return format!("{}m ago", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h ago", seconds / (60 * 60));
    }
    format!("{}d ago", seconds / (60 * 60 * 24))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON")?
    );
    Ok(())
}
