//! Operator settings loaded from `~/.skillsync/config.yaml`.
//!
//! Every field is optional in the file; missing fields fall back to the
//! defaults below. A missing file is not an error.
//!
//! ```yaml
//! registry_path: ~/.agents/skill-registry.json
//! backup_root: ~/.agents/skill-backups
//! temp_root: /tmp/skillsync
//! shallow_depth: 1
//! log_depth: 50
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "SKILLSYNC_CONFIG";

/// History depth for the cheap revision check.
pub const DEFAULT_SHALLOW_DEPTH: u32 = 1;

/// History depth used when a change log is wanted.
pub const DEFAULT_LOG_DEPTH: u32 = 50;

/// Resolved settings. All paths are absolute after [`Settings::load_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub registry_path: PathBuf,
    pub backup_root: PathBuf,
    /// Root under which retrieved upstream copies are created and released.
    pub temp_root: PathBuf,
    pub shallow_depth: u32,
    pub log_depth: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    registry_path: Option<PathBuf>,
    backup_root: Option<PathBuf>,
    temp_root: Option<PathBuf>,
    shallow_depth: Option<u32>,
    log_depth: Option<u32>,
}

impl Settings {
    /// Defaults rooted at `home`.
    pub fn defaults_at(home: &Path) -> Self {
        Self {
            registry_path: home.join(".agents").join("skill-registry.json"),
            backup_root: home.join(".agents").join("skill-backups"),
            temp_root: std::env::temp_dir().join("skillsync"),
            shallow_depth: DEFAULT_SHALLOW_DEPTH,
            log_depth: DEFAULT_LOG_DEPTH,
        }
    }

    /// Load settings from `config_path`, layered over [`Settings::defaults_at`].
    ///
    /// Returns the defaults when the file does not exist.
    pub fn load_at(home: &Path, config_path: &Path) -> Result<Self, ConfigError> {
        let mut settings = Self::defaults_at(home);
        if !config_path.exists() {
            tracing::debug!("no config at {}, using defaults", config_path.display());
            return Ok(settings);
        }

        let contents = std::fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        // An empty YAML document deserializes to unit, not a mapping.
        let file: SettingsFile = if contents.trim().is_empty() {
            SettingsFile::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: config_path.to_path_buf(),
                source: e,
            })?
        };

        if let Some(p) = file.registry_path {
            settings.registry_path = expand_home(home, &p);
        }
        if let Some(p) = file.backup_root {
            settings.backup_root = expand_home(home, &p);
        }
        if let Some(p) = file.temp_root {
            settings.temp_root = expand_home(home, &p);
        }
        if let Some(d) = file.shallow_depth {
            settings.shallow_depth = d.max(1);
        }
        if let Some(d) = file.log_depth {
            settings.log_depth = d.max(1);
        }
        Ok(settings)
    }

    /// Load from `$SKILLSYNC_CONFIG`, or `~/.skillsync/config.yaml`.
    pub fn load() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(p) => PathBuf::from(p),
            None => default_config_path(&home),
        };
        Self::load_at(&home, &path)
    }
}

/// `<home>/.skillsync/config.yaml`
pub fn default_config_path(home: &Path) -> PathBuf {
    home.join(".skillsync").join("config.yaml")
}

/// Expand a leading `~` against `home`; other paths are returned unchanged.
pub fn expand_home(home: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}
