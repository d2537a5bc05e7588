//! Session state machine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle phase of a relay session.
///
/// `Idle -> Resolving -> (Failed | Announcing -> Tailing) -> Stopping -> Stopped`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Resolving,
    Failed,
    Announcing,
    Tailing,
    Stopping,
    Stopped,
}

impl SessionPhase {
    /// Whether a background task may be running in this phase.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Announcing | Self::Tailing)
    }

    /// Whether moving to `next` follows the lifecycle.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle | Self::Failed | Self::Stopped, Self::Resolving)
                | (Self::Resolving, Self::Failed | Self::Announcing)
                | (Self::Announcing, Self::Tailing | Self::Stopping)
                | (Self::Tailing, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }

    /// Short lowercase label for display.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Failed => "failed",
            Self::Announcing => "announcing",
            Self::Tailing => "tailing",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub lines_read: u64,
    pub messages_relayed: u64,
    pub delivery_failures: u64,
}

/// Observable status of the current (or last) session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub identity: Option<String>,
    /// File name of the resolved log.
    pub log_file: Option<String>,
    pub stats: SessionStats,
    pub last_error: Option<String>,
}

/// Shared writer for [`SessionStatus`] updates.
///
/// Cloned into the running task; observers hold `watch::Receiver`s.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    tx: Arc<watch::Sender<SessionStatus>>,
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPublisher {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionStatus::default());
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.tx.subscribe()
    }

    /// Snapshot of the current status.
    #[must_use]
    pub fn current(&self) -> SessionStatus {
        self.tx.borrow().clone()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.tx.borrow().phase
    }

    /// Start a new session record for `identity` in the `Resolving` phase.
    pub fn begin(&self, identity: &str) {
        self.tx.send_modify(|status| {
            *status = SessionStatus {
                phase: status.phase,
                identity: Some(identity.to_string()),
                ..SessionStatus::default()
            };
        });
        self.transition(SessionPhase::Resolving);
    }

    /// Move to a new phase.
    ///
    /// Out-of-order transitions are applied but logged.
    pub fn transition(&self, new_phase: SessionPhase) {
        self.tx.send_if_modified(|status| {
            let from = status.phase;
            if from == new_phase {
                return false;
            }
            if from.can_transition_to(new_phase) {
                tracing::debug!(from = ?from, to = ?new_phase, "State transition");
            } else {
                tracing::warn!(from = ?from, to = ?new_phase, "Unexpected state transition");
            }
            status.phase = new_phase;
            true
        });
    }

    /// Record a failure message without changing phase.
    pub fn set_error(&self, error: &str) {
        self.tx.send_modify(|status| status.last_error = Some(error.to_string()));
    }

    /// Record the resolved log file name.
    pub fn set_log_file(&self, name: String) {
        self.tx.send_modify(|status| status.log_file = Some(name));
    }

    pub fn record_line(&self) {
        self.tx
            .send_modify(|s| s.stats.lines_read = s.stats.lines_read.saturating_add(1));
    }

    pub fn record_relayed(&self) {
        self.tx.send_modify(|s| {
            s.stats.messages_relayed = s.stats.messages_relayed.saturating_add(1);
        });
    }

    pub fn record_delivery_failure(&self) {
        self.tx.send_modify(|s| {
            s.stats.delivery_failures = s.stats.delivery_failures.saturating_add(1);
        });
    }
}
