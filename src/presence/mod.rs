//! Identity enumeration.
//!
//! Supplies the list of identities a user can pick from. The session
//! controller only ever receives the chosen string.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::watcher::{LogResolver, ResolveError};

/// Window title prefix of a logged-in game client.
pub const WINDOW_TITLE_PREFIX: &str = "EVE - ";

/// Source of currently available identities.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// List identities, most relevant first.
    async fn identities(&self) -> Result<Vec<String>, ResolveError>;
}

/// A fixed list, for tests and explicit command-line input.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentities(pub Vec<String>);

impl StaticIdentities {
    /// Characters named by client window titles, in order, without repeats.
    ///
    /// Titles of windows that are not logged-in clients are skipped.
    pub fn from_window_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in titles
            .into_iter()
            .filter_map(|t| identity_from_window_title(t.as_ref()))
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Self(names)
    }
}

#[async_trait]
impl IdentitySource for StaticIdentities {
    async fn identities(&self) -> Result<Vec<String>, ResolveError> {
        Ok(self.0.clone())
    }
}

/// Listener names found in the fleet log directory.
#[derive(Debug, Clone)]
pub struct LogDirectoryIdentities {
    resolver: LogResolver,
}

impl LogDirectoryIdentities {
    #[must_use]
    pub fn new(log_dir: PathBuf, prefix: impl Into<String>) -> Self {
        Self {
            resolver: LogResolver::new(log_dir, prefix),
        }
    }
}

#[async_trait]
impl IdentitySource for LogDirectoryIdentities {
    async fn identities(&self) -> Result<Vec<String>, ResolveError> {
        let resolver = self.resolver.clone();
        let log_dir = resolver.log_dir().to_path_buf();
        tokio::task::spawn_blocking(move || resolver.listeners())
            .await
            .map_err(|e| ResolveError::Io {
                path: log_dir,
                source: std::io::Error::other(e),
            })?
    }
}

/// Extract the character name from a client window title.
///
/// Returns `None` for windows that are not logged-in clients.
#[must_use]
pub fn identity_from_window_title(title: &str) -> Option<String> {
    let name = title.strip_prefix(WINDOW_TITLE_PREFIX)?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Accept either a bare character name or a pasted client window title.
#[must_use]
pub fn identity_from_input(input: &str) -> String {
    identity_from_window_title(input.trim()).unwrap_or_else(|| input.trim().to_string())
}
