//! Snapshot, additive copy, and rollback of local bundle directories.
//!
//! None of these operations ask for confirmation. `apply_upstream` overwrites
//! files and `rollback` replaces the whole local directory; the caller decides
//! whether that is wanted.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use filetime::FileTime;

use crate::diff::relative_files;
use crate::error::{io_err, SyncError};

/// `strftime` pattern appended to snapshot directory names.
pub const SNAPSHOT_TIMESTAMP: &str = "%Y%m%d-%H%M%S";

// ---------------------------------------------------------------------------
// snapshot
// ---------------------------------------------------------------------------

/// Copy `local_dir` into `<backup_root>/<bundle>-<timestamp>`.
///
/// The source is never modified. A numeric suffix is added when a snapshot
/// with the same timestamp already exists.
pub fn snapshot(local_dir: &Path, backup_root: &Path) -> Result<PathBuf, SyncError> {
    if !local_dir.is_dir() {
        return Err(SyncError::NotFound {
            path: local_dir.to_path_buf(),
        });
    }
    fs::create_dir_all(backup_root).map_err(|e| io_err(backup_root, e))?;

    let base = format!(
        "{}-{}",
        bundle_name(local_dir),
        Local::now().format(SNAPSHOT_TIMESTAMP)
    );
    let mut dest = backup_root.join(&base);
    let mut n = 1;
    while dest.exists() {
        dest = backup_root.join(format!("{base}-{n}"));
        n += 1;
    }

    copy_tree(local_dir, &dest)?;
    tracing::info!("snapshot {} → {}", local_dir.display(), dest.display());
    Ok(dest)
}

/// Existing snapshots of `bundle` under `backup_root`, oldest first.
pub fn list_snapshots(backup_root: &Path, bundle: &str) -> Result<Vec<PathBuf>, SyncError> {
    if !backup_root.exists() {
        return Ok(vec![]);
    }
    let prefix = format!("{bundle}-");
    let mut found: Vec<(String, PathBuf)> = fs::read_dir(backup_root)
        .map_err(|e| io_err(backup_root, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let stamp = name.strip_prefix(&prefix)?;
            is_snapshot_stamp(stamp).then(|| (stamp.to_string(), e.path()))
        })
        .collect();
    found.sort_by(|a, b| sort_key(&a.0).cmp(&sort_key(&b.0)));
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

/// `YYYYmmdd-HHMMSS` optionally followed by `-N`.
fn is_snapshot_stamp(stamp: &str) -> bool {
    let (head, tail) = match stamp.get(..15) {
        Some(head) => (head, &stamp[15..]),
        None => return false,
    };
    let bytes = head.as_bytes();
    let shape = bytes.iter().enumerate().all(|(i, b)| {
        if i == 8 {
            *b == b'-'
        } else {
            b.is_ascii_digit()
        }
    });
    let suffix_ok = tail.is_empty()
        || tail
            .strip_prefix('-')
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
    shape && suffix_ok
}

fn sort_key(stamp: &str) -> (String, u64) {
    let (head, tail) = stamp.split_at(15);
    let n = tail.trim_start_matches('-').parse().unwrap_or(0);
    (head.to_string(), n)
}

// ---------------------------------------------------------------------------
// apply_upstream
// ---------------------------------------------------------------------------

/// Copy every file of `upstream_dir` into the same relative spot under
/// `local_dir`, overwriting what is there.
///
/// Files that exist only locally are left alone. Returns the `/`-separated
/// relative paths copied, sorted.
pub fn apply_upstream(upstream_dir: &Path, local_dir: &Path) -> Result<Vec<String>, SyncError> {
    let files = relative_files(upstream_dir)?;
    let mut copied = Vec::with_capacity(files.len());
    for (rel, rel_path) in files {
        copy_file(&upstream_dir.join(&rel_path), &local_dir.join(&rel_path))?;
        tracing::debug!("copied {rel}");
        copied.push(rel);
    }
    tracing::info!(
        "applied {} file(s) from {} to {}",
        copied.len(),
        upstream_dir.display(),
        local_dir.display()
    );
    Ok(copied)
}

// ---------------------------------------------------------------------------
// rollback
// ---------------------------------------------------------------------------

/// Replace `local_dir` wholesale with the contents of `backup_path`.
///
/// The backup is checked to exist before anything is removed; beyond that it
/// is trusted to be complete.
pub fn rollback(backup_path: &Path, local_dir: &Path) -> Result<(), SyncError> {
    if !backup_path.is_dir() {
        return Err(SyncError::NotFound {
            path: backup_path.to_path_buf(),
        });
    }
    if local_dir.exists() {
        fs::remove_dir_all(local_dir).map_err(|e| io_err(local_dir, e))?;
    }
    copy_tree(backup_path, local_dir)?;
    tracing::info!("restored {} from {}", local_dir.display(), backup_path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn bundle_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string())
}

/// Recreate `src` at `dest`, including empty directories. Symlinks are
/// recreated as links pointing at the same target.
fn copy_tree(src: &Path, dest: &Path) -> Result<(), SyncError> {
    fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
    for entry in walkdir::WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
        } else if file_type.is_symlink() {
            copy_link(entry.path(), &target)?;
        } else if file_type.is_file() {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_link(src: &Path, dest: &Path) -> Result<(), SyncError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let link = fs::read_link(src).map_err(|e| io_err(src, e))?;
    std::os::unix::fs::symlink(&link, dest).map_err(|e| io_err(dest, e))
}

/// Without portable symlink creation the target's content is copied.
#[cfg(not(unix))]
fn copy_link(src: &Path, dest: &Path) -> Result<(), SyncError> {
    if src.is_file() {
        return copy_file(src, dest);
    }
    tracing::warn!("skipping symlink {}: target is not a file", src.display());
    Ok(())
}

/// Copy contents and permissions, then carry over the modification time.
///
/// A symlinked `src` is read through. A symlink already at `dest` is replaced
/// by a regular file rather than written through.
fn copy_file(src: &Path, dest: &Path) -> Result<(), SyncError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if fs::symlink_metadata(dest).is_ok_and(|m| m.file_type().is_symlink()) {
        fs::remove_file(dest).map_err(|e| io_err(dest, e))?;
    }
    fs::copy(src, dest).map_err(|e| io_err(dest, e))?;
    let meta = fs::metadata(src).map_err(|e| io_err(src, e))?;
    filetime::set_file_mtime(dest, FileTime::from_last_modification_time(&meta))
        .map_err(|e| io_err(dest, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn snapshot_names_directory_after_bundle() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("pdf");
        write(&local, "SKILL.md", "local\n");

        let snap = snapshot(&local, &tmp.path().join("backups")).unwrap();
        let name = snap.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("pdf-"), "got {name}");
        assert!(is_snapshot_stamp(&name["pdf-".len()..]));
        assert_eq!(fs::read_to_string(snap.join("SKILL.md")).unwrap(), "local\n");
    }

    #[test]
    fn snapshots_in_the_same_second_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("pdf");
        write(&local, "SKILL.md", "x");
        let backups = tmp.path().join("backups");

        let a = snapshot(&local, &backups).unwrap();
        let b = snapshot(&local, &backups).unwrap();
        assert_ne!(a, b);
        assert_eq!(list_snapshots(&backups, "pdf").unwrap().len(), 2);
    }

    #[test]
    fn snapshot_of_missing_dir_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = snapshot(&tmp.path().join("absent"), tmp.path()).unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }

    #[test]
    fn snapshot_keeps_empty_directories() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("pdf");
        fs::create_dir_all(local.join("assets/empty")).unwrap();
        let snap = snapshot(&local, &tmp.path().join("backups")).unwrap();
        assert!(snap.join("assets/empty").is_dir());
    }

    #[test]
    fn list_snapshots_ignores_other_bundles_and_orders_oldest_first() {
        let tmp = TempDir::new().unwrap();
        for name in [
            "pdf-20250102-090000",
            "pdf-20250101-090000-2",
            "pdf-20250101-090000",
            "pdf-20250101-090000-10",
            "pdf-extra-20250101-090000",
            "docx-20250101-090000",
        ] {
            fs::create_dir_all(tmp.path().join(name)).unwrap();
        }
        let names: Vec<_> = list_snapshots(tmp.path(), "pdf")
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "pdf-20250101-090000",
                "pdf-20250101-090000-2",
                "pdf-20250101-090000-10",
                "pdf-20250102-090000",
            ]
        );
    }

    #[test]
    fn copy_preserves_mtime() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.txt");
        fs::write(&src, "a").unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, old).unwrap();

        let dest = tmp.path().join("out/a.txt");
        copy_file(&src, &dest).unwrap();
        let meta = fs::metadata(&dest).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
    }

    #[test]
    fn rollback_with_missing_backup_leaves_local_alone() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("pdf");
        write(&local, "SKILL.md", "keep me");
        let err = rollback(&tmp.path().join("no-backup"), &local).unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
        assert_eq!(fs::read_to_string(local.join("SKILL.md")).unwrap(), "keep me");
    }
}
