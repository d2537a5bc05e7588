//! Chat log discovery.
//!
//! Locates the fleet chat log that belongs to a given character.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::encoding::LogEncoding;
use super::error::ResolveError;
use super::header::{has_listener, LogHeader};

/// File name prefix of fleet chat logs.
pub const DEFAULT_LOG_PREFIX: &str = "Fleet_";

/// Default chat log directory: `<documents>/EVE/logs/Chatlogs`.
///
/// Returns `None` if the documents directory cannot be determined.
#[must_use]
pub fn default_log_dir() -> Option<PathBuf> {
    let documents = dirs::document_dir().or_else(|| dirs::home_dir().map(|h| h.join("Documents")))?;
    Some(documents.join("EVE").join("logs").join("Chatlogs"))
}

/// A log file that may belong to the requested identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCandidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// The log file chosen for an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Path to the log file.
    pub path: PathBuf,
    /// Listener name from the file header.
    pub listener_name: String,
    /// Encoding detected from the file's byte order mark.
    pub encoding: LogEncoding,
    /// Length in bytes of the byte order mark actually present, 0 if none.
    pub bom_len: usize,
}

impl ResolvedSource {
    /// File name of the resolved log, for status display.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Resolves identities to their most recent fleet chat log.
#[derive(Debug, Clone)]
pub struct LogResolver {
    log_dir: PathBuf,
    prefix: String,
}

impl LogResolver {
    /// Create a resolver for the given directory and file name prefix.
    #[must_use]
    pub fn new(log_dir: PathBuf, prefix: impl Into<String>) -> Self {
        Self {
            log_dir,
            prefix: prefix.into(),
        }
    }

    /// Get the directory being searched.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Get the file name prefix of candidate logs.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// List candidate logs, most recently modified first.
    ///
    /// Ties on modification time are broken by file name, descending, so the
    /// newer timestamped name wins.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::DirectoryMissing` if the directory does not
    /// exist, or `ResolveError::Io` if it cannot be listed.
    pub fn candidates(&self) -> Result<Vec<LogCandidate>, ResolveError> {
        let entries = match std::fs::read_dir(&self.log_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ResolveError::DirectoryMissing(self.log_dir.clone()));
            }
            Err(e) => {
                return Err(ResolveError::Io {
                    path: self.log_dir.clone(),
                    source: e,
                });
            }
        };

        let mut candidates: Vec<LogCandidate> = entries
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(&self.prefix))
            })
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                if !metadata.is_file() {
                    return None;
                }
                let modified = metadata.modified().ok()?;
                Some(LogCandidate {
                    path: entry.path(),
                    modified,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.path.file_name().cmp(&a.path.file_name()))
        });
        Ok(candidates)
    }

    /// Find the most recent log whose header names `identity` as listener.
    ///
    /// Unreadable candidates are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::NotFound` if no candidate matches, or a
    /// directory error from [`LogResolver::candidates`].
    pub fn resolve(&self, identity: &str) -> Result<ResolvedSource, ResolveError> {
        let identity = identity.trim();
        tracing::debug!(log_dir = %self.log_dir.display(), identity = %identity, "Searching logs");

        for candidate in self.candidates()? {
            let Some((encoding, bom_len, text)) = read_candidate(&candidate.path) else {
                continue;
            };
            if has_listener(&text, identity) {
                tracing::info!(
                    identity = %identity,
                    path = %candidate.path.display(),
                    "Found log for identity"
                );
                return Ok(ResolvedSource {
                    path: candidate.path,
                    listener_name: identity.to_string(),
                    encoding,
                    bom_len,
                });
            }
        }

        tracing::info!(identity = %identity, "No log found for identity");
        Err(ResolveError::NotFound {
            identity: identity.to_string(),
            log_dir: self.log_dir.clone(),
        })
    }

    /// List distinct listener names across candidate logs, most recent first.
    ///
    /// # Errors
    ///
    /// Returns a directory error from [`LogResolver::candidates`].
    pub fn listeners(&self) -> Result<Vec<String>, ResolveError> {
        let mut names: Vec<String> = Vec::new();
        for candidate in self.candidates()? {
            let Some((_, _, text)) = read_candidate(&candidate.path) else {
                continue;
            };
            if let Some(listener) = LogHeader::parse(&text).listener {
                if !names.contains(&listener) {
                    names.push(listener);
                }
            }
        }
        Ok(names)
    }
}

fn read_candidate(path: &Path) -> Option<(LogEncoding, usize, String)> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let (encoding, bom_len) = LogEncoding::detect(&bytes);
            Some((encoding, bom_len, encoding.decode(&bytes[bom_len..])))
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Error reading log file");
            None
        }
    }
}
