//! Timestamp helpers for relayed lines.

use chrono::{NaiveDateTime, Utc};

use crate::watcher::LOG_TIME_FORMAT;

/// Current wall-clock time in seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Discord relative-time markup for a Unix timestamp, e.g. `<t:1704067200:R>`.
#[must_use]
pub fn relative_time_tag(unix: i64) -> String {
    format!("<t:{unix}:R>")
}

/// Extract the `[ YYYY.MM.DD HH:MM:SS ]` stamp from a chat line.
///
/// Chat logs are written in game time, which is UTC.
#[must_use]
pub fn extract_log_timestamp(line: &str) -> Option<i64> {
    let mut rest = line;
    while let Some(open) = rest.find('[') {
        rest = &rest[open + 1..];
        let Some(close) = rest.find(']') else {
            break;
        };
        if let Ok(dt) = NaiveDateTime::parse_from_str(rest[..close].trim(), LOG_TIME_FORMAT) {
            return Some(dt.and_utc().timestamp());
        }
    }
    None
}
