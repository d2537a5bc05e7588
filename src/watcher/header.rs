//! Chat log header parsing.
//!
//! Every chat log starts with a banner block such as:
//!
//! ```text
//!         ---------------------------------------------------------------
//!           Channel ID:      -1234
//!           Channel Name:    Fleet
//!           Listener:        Alice
//!           Session started: 2024.01.01 18:00:00
//!         ---------------------------------------------------------------
//! ```
//!
//! followed by freeform chat lines.

use std::path::Path;

use chrono::NaiveDateTime;

use super::encoding::decode_file;
use super::error::WatcherError;

const LISTENER_KEY: &str = "Listener";
const CHANNEL_ID_KEY: &str = "Channel ID";
const CHANNEL_NAME_KEY: &str = "Channel Name";
const SESSION_STARTED_KEY: &str = "Session started";

/// Format of the `Session started` header value and of bracketed line timestamps.
pub const LOG_TIME_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// Parsed header block of a chat log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogHeader {
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub listener: Option<String>,
    pub session_started: Option<NaiveDateTime>,
}

impl LogHeader {
    /// Parse the header fields from decoded log text.
    ///
    /// Scanning stops at the first chat line (a line opening with `[`).
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut header = Self::default();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('[') {
                break;
            }
            let Some((key, value)) = header_field(trimmed) else {
                continue;
            };
            match key {
                LISTENER_KEY => header.listener = Some(value.to_string()),
                CHANNEL_ID_KEY => header.channel_id = Some(value.to_string()),
                CHANNEL_NAME_KEY => header.channel_name = Some(value.to_string()),
                SESSION_STARTED_KEY => {
                    header.session_started =
                        NaiveDateTime::parse_from_str(value, LOG_TIME_FORMAT).ok();
                }
                _ => {}
            }
        }
        header
    }
}

/// Split a trimmed header line into a known key and its trimmed value.
fn header_field(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    match key {
        LISTENER_KEY | CHANNEL_ID_KEY | CHANNEL_NAME_KEY | SESSION_STARTED_KEY => {
            Some((key, value.trim()))
        }
        _ => None,
    }
}

/// Check whether any line of the text is a `Listener:` line naming `identity`.
///
/// Comparison is exact and case-sensitive after trimming both sides.
#[must_use]
pub fn has_listener(text: &str, identity: &str) -> bool {
    let identity = identity.trim();
    text.lines()
        .filter_map(|line| header_field(line.trim()))
        .any(|(key, value)| key == LISTENER_KEY && value == identity)
}

/// Re-open a log file and read the listener name from its header.
///
/// Returns `Ok(None)` if the file has no `Listener:` line.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub async fn read_listener_header(path: &Path) -> Result<Option<String>, WatcherError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| WatcherError::from_io(path, e))?;
    let (_, text) = decode_file(&bytes);
    Ok(LogHeader::parse(&text).listener)
}
