//! Unified diffs between a local adapted bundle and an upstream copy.
//!
//! [`diff_tree`] groups its output as: paths present in both trees, then
//! paths only upstream (`new` / `binary_new`), then paths only local
//! (`deleted`). Each group is sorted by relative path; groups are not
//! interleaved.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use walkdir::WalkDir;

use crate::classify::is_binary;
use crate::error::{io_err, SyncError};

/// Lines of context around each hunk.
pub const CONTEXT_RADIUS: usize = 3;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// How a single path differs between the local and upstream trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Modified,
    New,
    Deleted,
    BinaryChanged,
    BinaryNew,
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiffStatus::Modified => "modified",
            DiffStatus::New => "new",
            DiffStatus::Deleted => "deleted",
            DiffStatus::BinaryChanged => "binary_changed",
            DiffStatus::BinaryNew => "binary_new",
        };
        f.write_str(label)
    }
}

/// One differing path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    /// Relative path, `/`-separated on every platform.
    pub path: String,
    pub status: DiffStatus,
    /// Unified diff for text, full content for new text files, or a
    /// size note for binaries.
    pub detail: String,
}

/// Per-status counts over a diff result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub modified: usize,
    pub new: usize,
    pub deleted: usize,
    pub binary_changed: usize,
    pub binary_new: usize,
}

impl DiffSummary {
    pub fn from_diffs(diffs: &[FileDiff]) -> Self {
        let mut summary = Self::default();
        for d in diffs {
            match d.status {
                DiffStatus::Modified => summary.modified += 1,
                DiffStatus::New => summary.new += 1,
                DiffStatus::Deleted => summary.deleted += 1,
                DiffStatus::BinaryChanged => summary.binary_changed += 1,
                DiffStatus::BinaryNew => summary.binary_new += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.modified + self.new + self.deleted + self.binary_changed + self.binary_new
    }
}

// ---------------------------------------------------------------------------
// File diff
// ---------------------------------------------------------------------------

/// Unified diff from `local` to `upstream`.
///
/// Text only: callers must check [`crate::classify::is_binary`] first.
/// A missing file reads as empty, so diffing against an absent path yields
/// pure additions or pure deletions. Returns an empty string when the line
/// sequences are identical.
pub fn diff_file(local: &Path, upstream: &Path) -> Result<String, SyncError> {
    let local_label = format!("local/{}", file_label(local));
    let upstream_label = format!("upstream/{}", file_label(upstream));
    diff_file_labeled(local, upstream, &local_label, &upstream_label)
}

fn diff_file_labeled(
    local: &Path,
    upstream: &Path,
    local_label: &str,
    upstream_label: &str,
) -> Result<String, SyncError> {
    let old = read_text_or_empty(local)?;
    let new = read_text_or_empty(upstream)?;
    Ok(unified_diff(&old, &new, local_label, upstream_label))
}

/// Unified diff between two in-memory texts; empty when they match.
pub fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    if old == new {
        return String::new();
    }
    let diff = TextDiff::from_lines(old, new);
    let changed = diff
        .iter_all_changes()
        .any(|c| c.tag() != ChangeTag::Equal);
    if !changed {
        return String::new();
    }
    diff.unified_diff()
        .context_radius(CONTEXT_RADIUS)
        .header(old_label, new_label)
        .to_string()
}

fn read_text_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// Tree diff
// ---------------------------------------------------------------------------

/// Compare two directory trees file by file.
///
/// Identical files produce no entry. Both roots must exist.
pub fn diff_tree(local_dir: &Path, upstream_dir: &Path) -> Result<Vec<FileDiff>, SyncError> {
    let local_files = relative_files(local_dir)?;
    let upstream_files = relative_files(upstream_dir)?;

    let mut changed = Vec::new();
    let mut added = Vec::new();
    let mut deleted = Vec::new();

    for (rel, local_rel) in &local_files {
        let local_path = local_dir.join(local_rel);
        match upstream_files.get(rel) {
            Some(upstream_rel) => {
                let upstream_path = upstream_dir.join(upstream_rel);
                if let Some(diff) = compare_existing(rel, &local_path, &upstream_path)? {
                    changed.push(diff);
                }
            }
            None => deleted.push(FileDiff {
                path: rel.clone(),
                status: DiffStatus::Deleted,
                detail: format!("--- deleted: {rel}"),
            }),
        }
    }

    for (rel, upstream_rel) in &upstream_files {
        if local_files.contains_key(rel) {
            continue;
        }
        added.push(describe_new(rel, &upstream_dir.join(upstream_rel))?);
    }

    tracing::debug!(
        "diff {} vs {}: {} changed, {} new, {} deleted",
        local_dir.display(),
        upstream_dir.display(),
        changed.len(),
        added.len(),
        deleted.len()
    );

    changed.extend(added);
    changed.extend(deleted);
    Ok(changed)
}

fn compare_existing(
    rel: &str,
    local_path: &Path,
    upstream_path: &Path,
) -> Result<Option<FileDiff>, SyncError> {
    if is_binary(local_path) || is_binary(upstream_path) {
        let local_size = file_size(local_path)?;
        let upstream_size = file_size(upstream_path)?;
        if local_size != upstream_size {
            return Ok(Some(FileDiff {
                path: rel.to_string(),
                status: DiffStatus::BinaryChanged,
                detail: format!(
                    "Binary file changed: {local_size} bytes → {upstream_size} bytes"
                ),
            }));
        }
        // Equal sizes prove nothing; compare every byte.
        if files_equal(local_path, upstream_path)? {
            return Ok(None);
        }
        return Ok(Some(FileDiff {
            path: rel.to_string(),
            status: DiffStatus::BinaryChanged,
            detail: format!("Binary file changed (same size: {local_size} bytes)"),
        }));
    }

    let diff = diff_file_labeled(
        local_path,
        upstream_path,
        &format!("local/{rel}"),
        &format!("upstream/{rel}"),
    )?;
    if diff.is_empty() {
        return Ok(None);
    }
    Ok(Some(FileDiff {
        path: rel.to_string(),
        status: DiffStatus::Modified,
        detail: diff,
    }))
}

fn describe_new(rel: &str, upstream_path: &Path) -> Result<FileDiff, SyncError> {
    if is_binary(upstream_path) {
        let size = file_size(upstream_path)?;
        return Ok(FileDiff {
            path: rel.to_string(),
            status: DiffStatus::BinaryNew,
            detail: format!("New binary file: {size} bytes"),
        });
    }
    let content = read_text_or_empty(upstream_path)?;
    Ok(FileDiff {
        path: rel.to_string(),
        status: DiffStatus::New,
        detail: format!("+++ new file: {rel}\n{content}"),
    })
}

/// Directory names skipped when walking bundle trees.
pub const IGNORED_DIRS: &[&str] = &[".git"];

/// Files under `root`, keyed by `/`-joined relative path.
///
/// A symlink to a file is listed and read through, so its content is what
/// gets compared or copied. Symlinked directories are not descended and
/// dangling links are skipped, both with a warning. VCS metadata directories
/// are skipped so a fetched copy compares cleanly against a plain local tree.
pub(crate) fn relative_files(root: &Path) -> Result<BTreeMap<String, PathBuf>, SyncError> {
    if !root.is_dir() {
        return Err(SyncError::NotFound {
            path: root.to_path_buf(),
        });
    }
    let mut files = BTreeMap::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !(e.file_type().is_dir()
                    && IGNORED_DIRS.iter().any(|d| e.file_name() == *d))
        });
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_symlink() {
            if !entry.path().is_file() {
                tracing::warn!(
                    "skipping {}: symlink to a directory or missing target",
                    entry.path().display()
                );
                continue;
            }
        } else if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        files.insert(slash_path(rel), rel.to_path_buf());
    }
    Ok(files)
}

fn slash_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn file_size(path: &Path) -> Result<u64, SyncError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| io_err(path, e))
}

fn files_equal(a: &Path, b: &Path) -> Result<bool, SyncError> {
    let mut ra = BufReader::new(File::open(a).map_err(|e| io_err(a, e))?);
    let mut rb = BufReader::new(File::open(b).map_err(|e| io_err(b, e))?);
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];
    loop {
        let n = read_full(&mut ra, &mut buf_a).map_err(|e| io_err(a, e))?;
        let m = read_full(&mut rb, &mut buf_b).map_err(|e| io_err(b, e))?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows; short only at EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

const RULE: &str = "============================================================";

/// Human-readable grouped report: a status header per file, then its detail.
pub fn render_report(diffs: &[FileDiff]) -> String {
    if diffs.is_empty() {
        return "No differences found.\n".to_string();
    }
    let mut out = String::new();
    for d in diffs {
        out.push_str(RULE);
        out.push('\n');
        out.push_str(&format!(
            "[{}] {}\n",
            d.status.to_string().to_uppercase(),
            d.path
        ));
        out.push_str(RULE);
        out.push('\n');
        out.push_str(&d.detail);
        if !d.detail.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
