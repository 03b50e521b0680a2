//! # skillsync-sync
//!
//! Reconciliation engine for locally adapted skill bundles.
//!
//! - [`classify`] — binary/text heuristic
//! - [`diff`] — unified file diffs and directory-tree comparison
//! - [`upstream`] — shallow fetch, revision check, change log
//! - [`backup`] — snapshot, additive copy, rollback
//! - [`pipeline`] — check-all, review, apply, record
//!
//! Nothing in this crate asks for confirmation: `apply_upstream` and
//! `rollback` overwrite files unconditionally, and deciding whether to call
//! them belongs to the caller.

pub mod backup;
pub mod classify;
pub mod diff;
pub mod error;
pub mod pipeline;
pub mod upstream;

pub use diff::{diff_file, diff_tree, render_report, DiffStatus, FileDiff};
pub use error::SyncError;
pub use upstream::{ChangeLog, CheckResult, GitCli, LogCompleteness, UpstreamChecker, Vcs};
