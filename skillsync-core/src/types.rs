//! Domain types for the skill registry.
//!
//! Filesystem locations use `PathBuf`; remote addresses and revision
//! identifiers are opaque strings passed through unmodified.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Schema version written into every registry file.
pub const REGISTRY_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Registry entry
// ---------------------------------------------------------------------------

/// One tracked bundle. `name` is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    /// Remote repository address (URL, local path, or protocol-prefixed).
    #[serde(alias = "github_repo")]
    pub source_location: String,
    /// Path of the bundle inside the remote repository; empty means the root.
    #[serde(default, alias = "repo_subpath")]
    pub source_subpath: String,
    /// Location of the locally adapted copy.
    pub local_path: PathBuf,
    /// Revision observed at the most recent upstream check.
    #[serde(alias = "last_checked_commit")]
    pub last_checked_revision: String,
    /// Revision the local adaptation was forked from.
    #[serde(alias = "baseline_commit")]
    pub baseline_revision: String,
    #[serde(default)]
    pub adaptation_notes: String,
    #[serde(default)]
    pub adaptation_diff: String,
    pub registered_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

/// Field names accepted by [`RegistryEntry::set_field`].
pub const UPDATABLE_FIELDS: &[&str] = &[
    "source_location",
    "source_subpath",
    "local_path",
    "last_checked_revision",
    "baseline_revision",
    "adaptation_notes",
    "adaptation_diff",
];

const READ_ONLY_FIELDS: &[&str] = &["name", "registered_at", "last_updated_at"];

impl RegistryEntry {
    /// Build a fresh entry. Both revisions start at `revision` and both
    /// timestamps at `now`.
    pub fn new(new: NewEntry, now: DateTime<Utc>) -> Self {
        Self {
            name: new.name,
            source_location: new.source_location,
            source_subpath: new.source_subpath,
            local_path: new.local_path,
            last_checked_revision: new.revision.clone(),
            baseline_revision: new.revision,
            adaptation_notes: new.adaptation_notes,
            adaptation_diff: new.adaptation_diff,
            registered_at: now,
            last_updated_at: now,
        }
    }

    /// Check that `field` names an updatable field without changing anything.
    ///
    /// Legacy names (`github_repo`, `last_checked_commit`, …) are accepted.
    pub fn validate_field(field: &str) -> Result<&'static str, RegistryError> {
        let canonical = canonical_field(field);
        if let Some(known) = UPDATABLE_FIELDS.iter().find(|f| **f == canonical) {
            return Ok(*known);
        }
        if READ_ONLY_FIELDS.iter().any(|f| *f == canonical) {
            return Err(RegistryError::ReadOnlyField {
                field: field.to_string(),
            });
        }
        Err(RegistryError::UnknownField {
            field: field.to_string(),
        })
    }

    /// Set one string field by name. Does not touch `last_updated_at`.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<(), RegistryError> {
        match Self::validate_field(field)? {
            "source_location" => self.source_location = value.to_string(),
            "source_subpath" => self.source_subpath = value.to_string(),
            "local_path" => self.local_path = PathBuf::from(value),
            "last_checked_revision" => self.last_checked_revision = value.to_string(),
            "baseline_revision" => self.baseline_revision = value.to_string(),
            "adaptation_notes" => self.adaptation_notes = value.to_string(),
            "adaptation_diff" => self.adaptation_diff = value.to_string(),
            other => {
                return Err(RegistryError::UnknownField {
                    field: other.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn canonical_field(field: &str) -> &str {
    match field {
        "github_repo" => "source_location",
        "repo_subpath" => "source_subpath",
        "last_checked_commit" => "last_checked_revision",
        "baseline_commit" => "baseline_revision",
        other => other,
    }
}

/// Input for a registration call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewEntry {
    pub name: String,
    pub source_location: String,
    pub source_subpath: String,
    pub local_path: PathBuf,
    /// Current upstream revision; becomes both baseline and last-checked.
    pub revision: String,
    pub adaptation_notes: String,
    pub adaptation_diff: String,
}

// ---------------------------------------------------------------------------
// Registry file
// ---------------------------------------------------------------------------

/// Root of the persisted registry document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFile {
    pub version: u32,
    #[serde(default)]
    pub skills: Vec<RegistryEntry>,
}

impl Default for RegistryFile {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            skills: Vec::new(),
        }
    }
}

impl RegistryFile {
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.skills.iter().find(|e| e.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RegistryEntry> {
        self.skills.iter_mut().find(|e| e.name == name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> RegistryEntry {
        RegistryEntry::new(
            NewEntry {
                name: "pdf".into(),
                source_location: "https://example.com/skills.git".into(),
                source_subpath: "skills/pdf".into(),
                local_path: PathBuf::from("/home/op/.agents/skills/pdf"),
                revision: "abc123".into(),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn new_entry_starts_with_matching_revisions() {
        let e = entry();
        assert_eq!(e.baseline_revision, "abc123");
        assert_eq!(e.last_checked_revision, e.baseline_revision);
        assert_eq!(e.registered_at, e.last_updated_at);
    }

    #[test]
    fn set_field_accepts_canonical_and_legacy_names() {
        let mut e = entry();
        e.set_field("adaptation_notes", "trimmed examples").unwrap();
        e.set_field("last_checked_commit", "def456").unwrap();
        assert_eq!(e.adaptation_notes, "trimmed examples");
        assert_eq!(e.last_checked_revision, "def456");
    }

    #[test]
    fn set_field_rejects_unknown_and_read_only() {
        let mut e = entry();
        assert!(matches!(
            e.set_field("colour", "blue"),
            Err(RegistryError::UnknownField { .. })
        ));
        assert!(matches!(
            e.set_field("name", "other"),
            Err(RegistryError::ReadOnlyField { .. })
        ));
        assert_eq!(e.name, "pdf");
    }

    #[test]
    fn legacy_field_names_deserialize() {
        let json = r#"{
            "name": "pdf",
            "github_repo": "https://example.com/skills.git",
            "repo_subpath": "skills/pdf",
            "local_path": "/tmp/pdf",
            "last_checked_commit": "b",
            "baseline_commit": "a",
            "adaptation_notes": "",
            "adaptation_diff": "",
            "registered_at": "2025-01-01T00:00:00+00:00",
            "last_updated_at": "2025-01-02T00:00:00+00:00"
        }"#;
        let e: RegistryEntry = serde_json::from_str(json).expect("deserialize");
        assert_eq!(e.source_location, "https://example.com/skills.git");
        assert_eq!(e.baseline_revision, "a");
        assert_eq!(e.last_checked_revision, "b");
    }

    #[test]
    fn default_file_is_version_one_and_empty() {
        let file = RegistryFile::default();
        assert_eq!(file.version, REGISTRY_VERSION);
        assert!(file.skills.is_empty());
    }
}
