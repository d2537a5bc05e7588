//! Session error types.

use crate::config::ConfigError;
use crate::relay::ClassifierError;
use crate::watcher::{ResolveError, WatcherError};

/// Errors that stop a session from starting or continuing.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// No identity was given.
    #[error("No character selected")]
    EmptyIdentity,

    /// The platform log directory could not be determined.
    #[error("Could not determine the chat log directory")]
    NoLogDirectory,

    /// No log file matched the identity.
    #[error("No log found: {0}")]
    NoLogFound(#[from] ResolveError),

    /// The configuration snapshot cannot drive a session.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The line classifier could not be built.
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// The log could not be opened or stopped being readable.
    #[error("Tail failed: {0}")]
    Tail(#[from] WatcherError),

    /// A background task panicked or was aborted.
    #[error("Task join error: {0}")]
    Join(String),
}
