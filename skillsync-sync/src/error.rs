//! Error types for skillsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use skillsync_core::RegistryError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory walk failure (permission denied, loop, vanished entry).
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// A required path (local bundle, backup) does not exist.
    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    /// The remote could not be retrieved.
    #[error("failed to fetch {remote}: {message}")]
    Fetch { remote: String, message: String },

    /// A VCS command failed against a retrieved copy.
    #[error("git error at {path}: {message}")]
    Git { path: PathBuf, message: String },

    /// Applying an update failed and restoring the snapshot failed too.
    /// The local copy may be partial; `backup` still holds the pre-update state.
    #[error("apply failed ({apply}); rollback from {backup} also failed: {rollback}")]
    RollbackFailed {
        backup: PathBuf,
        apply: Box<SyncError>,
        rollback: Box<SyncError>,
    },

    /// An error from the registry.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
