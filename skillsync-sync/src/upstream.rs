//! Upstream change detection.
//!
//! ## Two-step protocol
//!
//! 1. [`UpstreamChecker::check_revision`] — fetch at `shallow_depth`, read
//!    the head revision, compare with the last known one.
//! 2. [`UpstreamChecker::fetch_change_log`] — only when step 1 found a change:
//!    fetch again at `log_depth` and read the commits since the last known
//!    revision.
//!
//! [`UpstreamChecker::check_update`] runs both and never returns `Err`: a
//! transport failure lands in [`CheckResult::error`] so a batch over many
//! bundles keeps going.
//!
//! Retrieved copies live under `temp_root` in uniquely named directories.
//! Whoever receives a copy releases it with [`UpstreamChecker::release`],
//! which refuses to delete anything outside `temp_root`.
//!
//! There is no timeout on the fetch itself; callers that need bounded latency
//! must wrap the [`Vcs`] implementation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use skillsync_core::config::{DEFAULT_LOG_DEPTH, DEFAULT_SHALLOW_DEPTH};
use skillsync_core::Settings;

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// VCS primitive
// ---------------------------------------------------------------------------

/// The retrieval primitive the checker is built on.
pub trait Vcs {
    /// Clone `remote` into the existing, empty directory `dest` with at most
    /// `depth` commits of history.
    fn clone_shallow(&self, remote: &str, depth: u32, dest: &Path) -> Result<(), SyncError>;

    /// Revision identifier of `HEAD` in a retrieved copy.
    fn head_revision(&self, repo: &Path) -> Result<String, SyncError>;

    /// One line per commit; `range` restricts the log (e.g. `abc..HEAD`).
    fn log(&self, repo: &Path, range: Option<&str>) -> Result<String, SyncError>;
}

/// [`Vcs`] backed by the `git` executable on `PATH`.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    /// Use a specific git executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run<I, S>(&self, args: I) -> Result<String, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.program)
            .args(args)
            // Fail instead of blocking on a credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| format!("failed to launch {}: {e}", self.program.display()))?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            Err(format!("git exited with {}", output.status))
        } else {
            Err(stderr)
        }
    }
}

impl Vcs for GitCli {
    fn clone_shallow(&self, remote: &str, depth: u32, dest: &Path) -> Result<(), SyncError> {
        let depth = depth.to_string();
        let args: [&OsStr; 7] = [
            OsStr::new("clone"),
            OsStr::new("--quiet"),
            OsStr::new("--depth"),
            OsStr::new(&depth),
            OsStr::new("--"),
            OsStr::new(remote),
            dest.as_os_str(),
        ];
        self.run(args).map(|_| ()).map_err(|message| SyncError::Fetch {
            remote: remote.to_string(),
            message,
        })
    }

    fn head_revision(&self, repo: &Path) -> Result<String, SyncError> {
        let args: [&OsStr; 4] = [
            OsStr::new("-C"),
            repo.as_os_str(),
            OsStr::new("rev-parse"),
            OsStr::new("HEAD"),
        ];
        self.run(args).map_err(|message| SyncError::Git {
            path: repo.to_path_buf(),
            message,
        })
    }

    fn log(&self, repo: &Path, range: Option<&str>) -> Result<String, SyncError> {
        let mut args: Vec<&OsStr> = vec![
            OsStr::new("-C"),
            repo.as_os_str(),
            OsStr::new("log"),
            OsStr::new("--oneline"),
        ];
        if let Some(range) = range {
            args.push(OsStr::new(range));
        }
        self.run(args).map_err(|message| SyncError::Git {
            path: repo.to_path_buf(),
            message,
        })
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// How much of the history between two revisions a [`ChangeLog`] covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCompleteness {
    /// Every commit after the since-revision is listed.
    Complete,
    /// The since-revision was not in the fetched history; `text` is the
    /// whole available log and may be missing older commits.
    Truncated,
    /// No log could be retrieved; changes exist but are not described.
    Unavailable,
}

/// Commits between a known revision and the fetched head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeLog {
    pub text: String,
    pub completeness: LogCompleteness,
}

impl ChangeLog {
    pub fn unavailable() -> Self {
        Self {
            text: "(could not retrieve commit log)".to_string(),
            completeness: LogCompleteness::Unavailable,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completeness == LogCompleteness::Complete
    }
}

/// Outcome of [`UpstreamChecker::check_revision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionCheck {
    pub clone_path: PathBuf,
    pub new_revision: String,
    pub has_updates: bool,
}

/// Outcome of [`UpstreamChecker::fetch_change_log`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFetch {
    pub clone_path: PathBuf,
    pub head_revision: String,
    pub log: ChangeLog,
}

/// Outcome of a full upstream check. Plain data; serializes to JSON for
/// external reporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    /// `Some(true)` / `Some(false)`, or `None` when the check failed.
    pub has_updates: Option<bool>,
    pub old_revision: String,
    pub new_revision: Option<String>,
    /// Retrieved copy; the caller must release it.
    pub clone_path: Option<PathBuf>,
    /// `clone_path` joined with the bundle's subpath.
    pub bundle_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_log: Option<ChangeLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn failed(old_revision: &str, error: String) -> Self {
        Self {
            has_updates: None,
            old_revision: old_revision.to_string(),
            new_revision: None,
            clone_path: None,
            bundle_path: None,
            commit_log: None,
            error: Some(error),
        }
    }
}

fn bundle_path(clone: &Path, subpath: &str) -> PathBuf {
    let subpath = subpath.trim_matches('/');
    if subpath.is_empty() {
        clone.to_path_buf()
    } else {
        clone.join(subpath)
    }
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

/// Fetches upstream copies into `temp_root` and compares revisions.
#[derive(Debug, Clone)]
pub struct UpstreamChecker<V = GitCli> {
    vcs: V,
    temp_root: PathBuf,
    shallow_depth: u32,
    log_depth: u32,
}

impl UpstreamChecker<GitCli> {
    /// Git-backed checker using the temp root and depths from `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        UpstreamChecker::new(GitCli::default(), &settings.temp_root)
            .with_depths(settings.shallow_depth, settings.log_depth)
    }
}

impl<V: Vcs> UpstreamChecker<V> {
    pub fn new(vcs: V, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            temp_root: temp_root.into(),
            shallow_depth: DEFAULT_SHALLOW_DEPTH,
            log_depth: DEFAULT_LOG_DEPTH,
        }
    }

    pub fn with_depths(mut self, shallow_depth: u32, log_depth: u32) -> Self {
        self.shallow_depth = shallow_depth.max(1);
        self.log_depth = log_depth.max(1);
        self
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Retrieve `remote` at `depth` into a fresh directory under `temp_root`.
    ///
    /// On failure the directory is removed and the transport error returned.
    pub fn fetch(&self, remote: &str, depth: u32) -> Result<PathBuf, SyncError> {
        std::fs::create_dir_all(&self.temp_root).map_err(|e| io_err(&self.temp_root, e))?;
        let dest = tempfile::Builder::new()
            .prefix("skillsync-")
            .tempdir_in(&self.temp_root)
            .map_err(|e| io_err(&self.temp_root, e))?
            .keep();

        tracing::info!("fetching {remote} (depth {depth}) into {}", dest.display());
        if let Err(e) = self.vcs.clone_shallow(remote, depth, &dest) {
            let _ = std::fs::remove_dir_all(&dest);
            return Err(e);
        }
        Ok(dest)
    }

    /// Head revision of a retrieved copy.
    pub fn head_revision(&self, clone: &Path) -> Result<String, SyncError> {
        self.vcs.head_revision(clone)
    }

    /// Commits after `since` up to the head of `clone`.
    ///
    /// When `since` is not reachable in the (possibly shallow) history, or
    /// the range lists no commits (e.g. `since` abbreviates the head), the
    /// full available log is returned, marked [`LogCompleteness::Truncated`].
    pub fn change_log(&self, clone: &Path, since: &str) -> Result<ChangeLog, SyncError> {
        if !since.is_empty() && !since.starts_with('-') {
            match self.vcs.log(clone, Some(&format!("{since}..HEAD"))) {
                Ok(text) if text.trim().is_empty() => {
                    tracing::debug!("no commits in {since}..HEAD")
                }
                Ok(text) => {
                    return Ok(ChangeLog {
                        text,
                        completeness: LogCompleteness::Complete,
                    })
                }
                Err(e) => tracing::debug!("{since} not in fetched history: {e}"),
            }
        }
        let text = self.vcs.log(clone, None)?;
        tracing::warn!(
            "change log for {} truncated: no commits found after {since}",
            clone.display()
        );
        Ok(ChangeLog {
            text,
            completeness: LogCompleteness::Truncated,
        })
    }

    /// Step 1: cheap fetch and revision comparison.
    ///
    /// The returned copy must be released by the caller.
    pub fn check_revision(
        &self,
        remote: &str,
        last_known: &str,
    ) -> Result<RevisionCheck, SyncError> {
        let clone_path = self.fetch(remote, self.shallow_depth)?;
        let new_revision = match self.vcs.head_revision(&clone_path) {
            Ok(rev) => rev,
            Err(e) => {
                self.release_quietly(&clone_path);
                return Err(e);
            }
        };
        Ok(RevisionCheck {
            has_updates: new_revision != last_known,
            clone_path,
            new_revision,
        })
    }

    /// Step 2: deeper fetch for the commits since `since`.
    ///
    /// The returned copy must be released by the caller.
    pub fn fetch_change_log(&self, remote: &str, since: &str) -> Result<LogFetch, SyncError> {
        let clone_path = self.fetch(remote, self.log_depth)?;
        let read = self
            .vcs
            .head_revision(&clone_path)
            .and_then(|head| Ok((head, self.change_log(&clone_path, since)?)));
        match read {
            Ok((head_revision, log)) => Ok(LogFetch {
                clone_path,
                head_revision,
                log,
            }),
            Err(e) => {
                self.release_quietly(&clone_path);
                Err(e)
            }
        }
    }

    /// Full check: revision comparison plus change log when updates exist.
    ///
    /// Never fails. A first-fetch failure yields `has_updates = None` and an
    /// `error`. If the deep fetch fails, a fresh shallow copy is taken and the
    /// log is reported as unavailable.
    pub fn check_update(&self, remote: &str, subpath: &str, last_known: &str) -> CheckResult {
        let check = match self.check_revision(remote, last_known) {
            Ok(check) => check,
            Err(e) => {
                tracing::warn!("upstream check failed for {remote}: {e}");
                return CheckResult::failed(last_known, e.to_string());
            }
        };

        let mut result = CheckResult {
            has_updates: Some(check.has_updates),
            old_revision: last_known.to_string(),
            new_revision: Some(check.new_revision.clone()),
            bundle_path: Some(bundle_path(&check.clone_path, subpath)),
            clone_path: Some(check.clone_path.clone()),
            commit_log: None,
            error: None,
        };
        if !check.has_updates {
            return result;
        }

        self.release_quietly(&check.clone_path);
        match self.fetch_change_log(remote, last_known) {
            Ok(fetched) => {
                result.new_revision = Some(fetched.head_revision);
                result.bundle_path = Some(bundle_path(&fetched.clone_path, subpath));
                result.clone_path = Some(fetched.clone_path);
                result.commit_log = Some(fetched.log);
            }
            Err(e) => {
                tracing::warn!("change log unavailable for {remote}: {e}");
                result.commit_log = Some(ChangeLog::unavailable());
                match self.fetch(remote, self.shallow_depth) {
                    Ok(path) => {
                        result.bundle_path = Some(bundle_path(&path, subpath));
                        result.clone_path = Some(path);
                    }
                    Err(e) => {
                        // The revision comparison still stands; only the copy is lost.
                        result.clone_path = None;
                        result.bundle_path = None;
                        result.error = Some(e.to_string());
                    }
                }
            }
        }
        result
    }

    /// Delete a retrieved copy if it lies strictly inside `temp_root`.
    ///
    /// Returns `Ok(false)` when the path is missing or outside the root.
    pub fn release(&self, path: &Path) -> Result<bool, SyncError> {
        if !path.exists() {
            return Ok(false);
        }
        let root = match self.temp_root.canonicalize() {
            Ok(root) => root,
            Err(_) => return Ok(false),
        };
        let target = path.canonicalize().map_err(|e| io_err(path, e))?;
        if target == root || !target.starts_with(&root) {
            tracing::warn!(
                "refusing to release {}: not under {}",
                target.display(),
                root.display()
            );
            return Ok(false);
        }
        std::fs::remove_dir_all(&target).map_err(|e| io_err(&target, e))?;
        tracing::debug!("released {}", target.display());
        Ok(true)
    }

    /// Release every copy referenced by `result`.
    pub fn release_result(&self, result: &CheckResult) {
        if let Some(path) = &result.clone_path {
            self.release_quietly(path);
        }
    }

    fn release_quietly(&self, path: &Path) {
        if let Err(e) = self.release(path) {
            tracing::warn!("failed to release {}: {e}", path.display());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
