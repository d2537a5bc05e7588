//! Line classification.
//!
//! Turns one raw chat line into at most one action: a relay message, or a
//! change to the session's x-up counter.

use regex::Regex;

use crate::config::{AppConfig, ClassifierMode, TimestampSource};

use super::message::OutboundMessage;
use super::timestamp::{extract_log_timestamp, relative_time_tag};

/// An x-up reply: `> x`, `> xxx`, `> x5`, `> x 5`, `> 5x`, `> 5 x`.
///
/// Groups: 1 = run of x, 2 = digits after the run, 3 = single digit before x.
const X_REPLY_PATTERN: &str = r"(?i)\s?>\s*(?:(x+)\s?(\d*)|(\d)\s?x)\b";

/// Error type for classifier construction.
#[derive(thiserror::Error, Debug)]
pub enum ClassifierError {
    #[error("Invalid classifier pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Outcome of classifying one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Forward this message to the relay sink.
    Relay(OutboundMessage),
    /// The counter was reset to zero.
    CounterReset,
    /// The counter was incremented.
    CounterIncremented { by: u64, total: u64 },
    /// Nothing to do.
    Ignored,
}

/// Counting-mode classifier for fleet x-up replies.
#[derive(Debug, Clone)]
pub struct CountingClassifier {
    pattern: Regex,
    cap: Option<u32>,
}

impl CountingClassifier {
    /// Create a counting classifier with an optional per-line increment cap.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::InvalidPattern` if the reply pattern fails to compile.
    pub fn new(cap: Option<u32>) -> Result<Self, ClassifierError> {
        Ok(Self {
            pattern: Regex::new(X_REPLY_PATTERN)?,
            cap,
        })
    }

    /// Get the per-line increment cap.
    #[must_use]
    pub fn cap(&self) -> Option<u32> {
        self.cap
    }

    /// Parse the multiplier of an x-up reply.
    ///
    /// Digits after the x run win, then the digit before `x`, then the
    /// length of the x run. Returns `None` if the line is not a reply.
    #[must_use]
    pub fn multiplier(&self, line: &str) -> Option<u64> {
        let caps = self.pattern.captures(line)?;
        let raw = if let Some(run) = caps.get(1) {
            match caps.get(2).map(|m| m.as_str()).filter(|d| !d.is_empty()) {
                Some(digits) => digits.parse().unwrap_or(u64::MAX),
                None => run.as_str().len() as u64,
            }
        } else {
            caps.get(3)?.as_str().parse().ok()?
        };
        Some(match self.cap {
            Some(cap) => raw.min(u64::from(cap)),
            None => raw,
        })
    }

    /// Classify a line, updating `counter`.
    ///
    /// Any `-` resets the counter; an x-up reply adds its multiplier.
    pub fn classify(&self, line: &str, counter: &mut u64) -> Classification {
        if line.contains('-') {
            *counter = 0;
            return Classification::CounterReset;
        }
        match self.multiplier(line) {
            Some(by) => {
                *counter = counter.saturating_add(by);
                Classification::CounterIncremented {
                    by,
                    total: *counter,
                }
            }
            None => Classification::Ignored,
        }
    }
}

/// Relay-mode formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayFormatter {
    include_timestamps: bool,
    timestamp_source: TimestampSource,
}

impl RelayFormatter {
    #[must_use]
    pub fn new(include_timestamps: bool, timestamp_source: TimestampSource) -> Self {
        Self {
            include_timestamps,
            timestamp_source,
        }
    }

    /// Format a line for relay. Blank lines yield `None`.
    #[must_use]
    pub fn format(&self, line: &str, now: i64) -> Option<OutboundMessage> {
        let text = line.trim();
        if text.is_empty() {
            return None;
        }
        let message = OutboundMessage::new(text);
        if !self.include_timestamps {
            return Some(message);
        }
        let unix = match self.timestamp_source {
            TimestampSource::WallClock => now,
            TimestampSource::LogLine => extract_log_timestamp(text).unwrap_or(now),
        };
        Some(message.with_timestamp_tag(relative_time_tag(unix)))
    }
}

/// The classifier selected for a session.
#[derive(Debug, Clone)]
pub enum LineClassifier {
    Counting(CountingClassifier),
    Relay(RelayFormatter),
}

impl LineClassifier {
    /// Build the classifier for the configured mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the counting pattern fails to compile.
    pub fn from_config(config: &AppConfig) -> Result<Self, ClassifierError> {
        Ok(match config.mode {
            ClassifierMode::Count => Self::Counting(CountingClassifier::new(config.increment_cap)?),
            ClassifierMode::Relay => Self::Relay(RelayFormatter::new(
                config.include_timestamps,
                config.timestamp_source,
            )),
        })
    }

    /// Get the mode this classifier implements.
    #[must_use]
    pub fn mode(&self) -> ClassifierMode {
        match self {
            Self::Counting(_) => ClassifierMode::Count,
            Self::Relay(_) => ClassifierMode::Relay,
        }
    }

    /// Classify one line. `now` is the wall-clock time in Unix seconds.
    pub fn classify(&self, line: &str, counter: &mut u64, now: i64) -> Classification {
        match self {
            Self::Counting(c) => c.classify(line, counter),
            Self::Relay(f) => f
                .format(line, now)
                .map_or(Classification::Ignored, Classification::Relay),
        }
    }
}
