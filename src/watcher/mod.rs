//! Watcher module for fleet chat log files.
//!
//! Finds the log for a character and tails it for newly appended lines.

mod discovery;
mod encoding;
mod error;
mod header;
mod tailer;

pub use discovery::{default_log_dir, LogCandidate, LogResolver, ResolvedSource, DEFAULT_LOG_PREFIX};
pub use encoding::{decode_file, LogEncoding};
pub use error::{ResolveError, WatcherError};
pub use header::{has_listener, read_listener_header, LogHeader, LOG_TIME_FORMAT};
pub use tailer::{LogTailer, DEFAULT_POLL_INTERVAL};
