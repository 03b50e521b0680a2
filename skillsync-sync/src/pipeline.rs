//! Reconciliation pipeline shared by the CLI commands.
//!
//! registry entries → [`check_all`] → [`review`] (diff local vs fetched)
//! → external decision → [`apply_update`] (snapshot + copy, rollback on
//! failure) → [`record_update_at`].

use std::path::{Path, PathBuf};

use serde::Serialize;

use skillsync_core::{registry, RegistryEntry};

use crate::backup;
use crate::diff::{diff_tree, FileDiff};
use crate::error::SyncError;
use crate::upstream::{CheckResult, UpstreamChecker, Vcs};

/// Result of checking one registered bundle.
#[derive(Debug, Clone, Serialize)]
pub struct BundleCheck {
    pub name: String,
    pub local_path: PathBuf,
    #[serde(flatten)]
    pub result: CheckResult,
}

/// Check every entry. Retrieved copies are released before returning, and
/// one unreachable remote does not stop the others.
pub fn check_all<V: Vcs>(
    entries: &[RegistryEntry],
    checker: &UpstreamChecker<V>,
) -> Vec<BundleCheck> {
    entries
        .iter()
        .map(|entry| {
            let mut result = checker.check_update(
                &entry.source_location,
                &entry.source_subpath,
                &entry.last_checked_revision,
            );
            checker.release_result(&result);
            result.clone_path = None;
            result.bundle_path = None;
            if let Some(err) = &result.error {
                tracing::warn!("'{}': {err}", entry.name);
            }
            BundleCheck {
                name: entry.name.clone(),
                local_path: entry.local_path.clone(),
                result,
            }
        })
        .collect()
}

/// A check plus, when updates exist, the diff from the local copy to upstream.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub name: String,
    pub check: CheckResult,
    pub diffs: Vec<FileDiff>,
}

/// Check one bundle and diff it against the fetched upstream copy.
///
/// The fetched copy referenced by `check.clone_path` is kept so the caller
/// can pass `check.bundle_path` to [`apply_update`]; the caller releases it.
/// If diffing fails the copy is released before the error is returned.
pub fn review<V: Vcs>(
    entry: &RegistryEntry,
    checker: &UpstreamChecker<V>,
) -> Result<Review, SyncError> {
    let check = checker.check_update(
        &entry.source_location,
        &entry.source_subpath,
        &entry.last_checked_revision,
    );

    let diffs = match (check.has_updates, &check.bundle_path) {
        (Some(true), Some(upstream)) => match diff_tree(&entry.local_path, upstream) {
            Ok(diffs) => diffs,
            Err(e) => {
                checker.release_result(&check);
                return Err(e);
            }
        },
        _ => Vec::new(),
    };

    Ok(Review {
        name: entry.name.clone(),
        check,
        diffs,
    })
}

/// What [`apply_update`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedUpdate {
    /// Snapshot taken before copying; pass to [`backup::rollback`] to undo.
    pub backup: PathBuf,
    pub copied: Vec<String>,
}

/// Snapshot the local copy, then copy the upstream bundle over it.
///
/// If the copy fails part-way, the snapshot is restored and the copy error
/// is returned.
pub fn apply_update(
    entry: &RegistryEntry,
    upstream_bundle: &Path,
    backup_root: &Path,
) -> Result<AppliedUpdate, SyncError> {
    let backup = backup::snapshot(&entry.local_path, backup_root)?;
    match backup::apply_upstream(upstream_bundle, &entry.local_path) {
        Ok(copied) => Ok(AppliedUpdate { backup, copied }),
        Err(e) => Err(restore_after_failed_apply(entry, backup, e)),
    }
}

/// Roll back after a failed apply and return the error to report. If the
/// rollback fails too, both errors are kept.
fn restore_after_failed_apply(
    entry: &RegistryEntry,
    backup: PathBuf,
    apply: SyncError,
) -> SyncError {
    tracing::warn!("apply failed for '{}', rolling back: {apply}", entry.name);
    match backup::rollback(&backup, &entry.local_path) {
        Ok(()) => apply,
        Err(rollback) => {
            tracing::error!(
                "rollback of '{}' from {} failed after apply error ({apply}): {rollback}",
                entry.name,
                backup.display()
            );
            SyncError::RollbackFailed {
                backup,
                apply: Box::new(apply),
                rollback: Box::new(rollback),
            }
        }
    }
}

/// Stamp the registry once the operator has accepted an update.
pub fn record_update_at(
    registry_path: &Path,
    name: &str,
    new_revision: &str,
) -> Result<RegistryEntry, SyncError> {
    Ok(registry::record_revision_at(registry_path, name, new_revision)?)
}
