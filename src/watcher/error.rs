//! Watcher error types.

use std::path::PathBuf;

/// Errors that can occur while reading a chat log.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// Watched file was deleted.
    #[error("Watched file deleted: {0}")]
    FileDeleted(PathBuf),

    /// Permission denied accessing file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatcherError {
    /// Whether the error means the file can no longer be tailed.
    ///
    /// Plain I/O errors are treated as transient and retried on the next poll.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::FileDeleted(_) | Self::PermissionDenied(_))
    }

    /// Map an I/O error on `path` to the matching variant.
    pub(crate) fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileDeleted(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}

/// Errors that prevent a log file from being resolved for an identity.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    /// The log directory does not exist.
    #[error("Log directory not found: {0}")]
    DirectoryMissing(PathBuf),

    /// No candidate log names the identity as its listener.
    #[error("No log found for '{identity}' in {}", log_dir.display())]
    NotFound { identity: String, log_dir: PathBuf },

    /// The log directory could not be listed.
    #[error("Failed to read log directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
