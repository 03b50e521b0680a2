//! JSON-backed skill registry.
//!
//! # Storage layout
//!
//! ```text
//! ~/.agents/
//!   skill-registry.json    ({"version": 1, "skills": [...]}, mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every operation has two forms:
//! - `fn_at(path: &Path, …)` — explicit registry file; used in tests with `TempDir`
//! - `fn(…)` — derives the path from `dirs::home_dir()`, delegates to `_at`
//!
//! # Concurrency
//!
//! Each mutation is a full load → mutate → persist cycle over the whole file.
//! There is no locking: the registry assumes a single active operator session
//! per file, and two concurrent writers lose updates (last write wins).

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{io_err, RegistryError};
use crate::types::{NewEntry, RegistryEntry, RegistryFile};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.agents/skill-registry.json` — pure, no I/O.
pub fn registry_path_at(home: &Path) -> PathBuf {
    home.join(".agents").join("skill-registry.json")
}

/// `registry_path_at` convenience wrapper.
pub fn registry_path() -> Result<PathBuf, RegistryError> {
    Ok(registry_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// 2. Load / save
// ---------------------------------------------------------------------------

/// Load the registry at `path`.
///
/// When the file is absent, an empty version-1 registry is written back and
/// returned. Returns `RegistryError::Parse` (with path) if the JSON is malformed.
pub fn load_at(path: &Path) -> Result<RegistryFile, RegistryError> {
    if !path.exists() {
        let empty = RegistryFile::default();
        save_at(path, &empty)?;
        tracing::info!("initialized empty registry at {}", path.display());
        return Ok(empty);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|e| RegistryError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Atomically save the registry to `path`.
///
/// Write flow: serialize → `.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(path: &Path, registry: &RegistryFile) -> Result<(), RegistryError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let tmp = tmp_path(path);
    let json = serde_json::to_string_pretty(registry)?;
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// 3. Queries
// ---------------------------------------------------------------------------

/// All entries in registration order.
pub fn list_at(path: &Path) -> Result<Vec<RegistryEntry>, RegistryError> {
    Ok(load_at(path)?.skills)
}

/// `list_at` convenience wrapper.
pub fn list() -> Result<Vec<RegistryEntry>, RegistryError> {
    list_at(&registry_path()?)
}

/// Look up an entry by name; `None` if absent.
pub fn find_at(path: &Path, name: &str) -> Result<Option<RegistryEntry>, RegistryError> {
    Ok(load_at(path)?.get(name).cloned())
}

/// Look up an entry by name; `RegistryError::NotFound` if absent.
pub fn get_at(path: &Path, name: &str) -> Result<RegistryEntry, RegistryError> {
    find_at(path, name)?.ok_or_else(|| RegistryError::NotFound {
        name: name.to_string(),
    })
}

/// `get_at` convenience wrapper.
pub fn get(name: &str) -> Result<RegistryEntry, RegistryError> {
    get_at(&registry_path()?, name)
}

// ---------------------------------------------------------------------------
// 4. Mutations
// ---------------------------------------------------------------------------

/// Register a new bundle.
///
/// Fails with `AlreadyRegistered` before writing anything if the name is taken.
pub fn add_at(path: &Path, new: NewEntry) -> Result<RegistryEntry, RegistryError> {
    let mut registry = load_at(path)?;
    if registry.get(&new.name).is_some() {
        return Err(RegistryError::AlreadyRegistered { name: new.name });
    }
    let entry = RegistryEntry::new(new, Utc::now());
    registry.skills.push(entry.clone());
    save_at(path, &registry)?;
    tracing::info!("registered '{}' at {}", entry.name, entry.baseline_revision);
    Ok(entry)
}

/// `add_at` convenience wrapper.
pub fn add(new: NewEntry) -> Result<RegistryEntry, RegistryError> {
    add_at(&registry_path()?, new)
}

/// Update named string fields on an entry and stamp `last_updated_at`.
///
/// Every field name is validated before any value is applied, so a bad name
/// leaves the entry untouched.
pub fn update_at(
    path: &Path,
    name: &str,
    fields: &[(String, String)],
) -> Result<RegistryEntry, RegistryError> {
    for (field, _) in fields {
        RegistryEntry::validate_field(field)?;
    }

    let mut registry = load_at(path)?;
    let entry = registry
        .get_mut(name)
        .ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
        })?;
    for (field, value) in fields {
        entry.set_field(field, value)?;
    }
    entry.last_updated_at = Utc::now();
    let updated = entry.clone();

    save_at(path, &registry)?;
    tracing::info!("updated '{name}' ({} field(s))", fields.len());
    Ok(updated)
}

/// `update_at` convenience wrapper.
pub fn update(name: &str, fields: &[(String, String)]) -> Result<RegistryEntry, RegistryError> {
    update_at(&registry_path()?, name, fields)
}

/// Record the revision observed by an upstream check or applied update.
pub fn record_revision_at(
    path: &Path,
    name: &str,
    revision: &str,
) -> Result<RegistryEntry, RegistryError> {
    update_at(
        path,
        name,
        &[("last_checked_revision".to_string(), revision.to_string())],
    )
}

/// Remove an entry by name. Removing an absent name is a no-op.
///
/// Returns `true` if an entry was removed.
pub fn remove_at(path: &Path, name: &str) -> Result<bool, RegistryError> {
    let mut registry = load_at(path)?;
    let before = registry.skills.len();
    registry.skills.retain(|e| e.name != name);
    let removed = registry.skills.len() != before;
    save_at(path, &registry)?;
    if removed {
        tracing::info!("removed '{name}'");
    }
    Ok(removed)
}

/// `remove_at` convenience wrapper.
pub fn remove(name: &str) -> Result<bool, RegistryError> {
    remove_at(&registry_path()?, name)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_entry(name: &str) -> NewEntry {
        NewEntry {
            name: name.to_string(),
            source_location: "https://example.com/skills.git".to_string(),
            source_subpath: "skills/pdf".to_string(),
            local_path: PathBuf::from("/home/op/.agents/skills").join(name),
            revision: "r1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn registry_path_is_correct() {
        let home = TempDir::new().unwrap();
        assert!(registry_path_at(home.path()).ends_with(".agents/skill-registry.json"));
    }

    #[test]
    fn load_missing_initializes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("registry.json");
        let reg = load_at(&path).expect("load");
        assert_eq!(reg, RegistryFile::default());
        assert!(path.exists(), "first access must write the empty registry");
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        save_at(&path, &RegistryFile::default()).expect("save");
        assert!(!tmp_path(&path).exists(), ".tmp must be gone after save");
    }

    #[test]
    #[cfg(unix)]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        save_at(&path, &RegistryFile::default()).expect("save");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn update_validates_all_fields_before_applying() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        add_at(&path, new_entry("pdf")).unwrap();

        let err = update_at(
            &path,
            "pdf",
            &[
                ("adaptation_notes".to_string(), "changed".to_string()),
                ("bogus".to_string(), "x".to_string()),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownField { .. }));
        assert_eq!(get_at(&path, "pdf").unwrap().adaptation_notes, "");
    }

    #[test]
    fn record_revision_moves_last_checked_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");
        add_at(&path, new_entry("pdf")).unwrap();
        let e = record_revision_at(&path, "pdf", "r2").unwrap();
        assert_eq!(e.last_checked_revision, "r2");
        assert_eq!(e.baseline_revision, "r1");
        assert!(e.last_updated_at >= e.registered_at);
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(RegistryError::HomeNotFound
            .to_string()
            .contains("home directory"));
    }
}
