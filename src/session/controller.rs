//! Session controller: owns the single active tailing task.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{AppConfig, ClassifierMode, ConfigLoader, ConfigOverrides, RelayConfig};
use crate::relay::{LineClassifier, OutboundMessage, RelaySink};
use crate::watcher::{read_listener_header, LogResolver, LogTailer, ResolvedSource, WatcherError};

use super::error::SessionError;
use super::state::{SessionPhase, SessionStatus, StatusPublisher};
use super::task::{SessionCommand, SessionTask};

/// Capacity of the controller-to-task command channel.
const COMMAND_BUFFER: usize = 8;

/// Handle to the running session task.
struct ActiveSession {
    id: Uuid,
    identity: String,
    source: ResolvedSource,
    cancel: CancellationToken,
    commands: mpsc::Sender<SessionCommand>,
    handle: JoinHandle<Result<(), WatcherError>>,
}

/// Starts, stops and switches relay sessions.
///
/// At most one tailing task exists at a time. Methods take `&mut self`, so
/// a `load` can never interleave with another `load` or `stop`.
pub struct SessionController {
    config: AppConfig,
    config_loader: Option<ConfigLoader>,
    overrides: ConfigOverrides,
    check_endpoint: bool,
    sink: Arc<dyn RelaySink>,
    status: StatusPublisher,
    counter_tx: Arc<watch::Sender<u64>>,
    active: Option<ActiveSession>,
}

impl SessionController {
    /// Create a controller that snapshots `config` for each session.
    #[must_use]
    pub fn new(config: AppConfig, sink: Arc<dyn RelaySink>) -> Self {
        let (counter_tx, _) = watch::channel(0);
        Self {
            config,
            config_loader: None,
            overrides: ConfigOverrides::default(),
            check_endpoint: true,
            sink,
            status: StatusPublisher::new(),
            counter_tx: Arc::new(counter_tx),
            active: None,
        }
    }

    /// Reload configuration from `loader` each time a session starts.
    #[must_use]
    pub fn with_config_loader(mut self, loader: ConfigLoader) -> Self {
        self.config_loader = Some(loader);
        self
    }

    /// Apply `overrides` on top of every configuration snapshot.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Skip the webhook endpoint check, for sinks that never post.
    #[must_use]
    pub fn without_endpoint_check(mut self) -> Self {
        self.check_endpoint = false;
        self
    }

    /// Configuration used by the next session.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Replace the configuration. A running session keeps its snapshot.
    pub fn set_config(&mut self, config: AppConfig) {
        self.config = config;
    }

    /// Subscribe to session status changes.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Snapshot of the session status.
    #[must_use]
    pub fn current_status(&self) -> SessionStatus {
        self.status.current()
    }

    /// Subscribe to the counting-mode counter.
    #[must_use]
    pub fn counter(&self) -> watch::Receiver<u64> {
        self.counter_tx.subscribe()
    }

    /// Whether a tailing task is currently running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    /// The log the current session is tailing.
    #[must_use]
    pub fn active_source(&self) -> Option<&ResolvedSource> {
        self.active.as_ref().map(|session| &session.source)
    }

    /// Identity of the current session.
    #[must_use]
    pub fn active_identity(&self) -> Option<&str> {
        self.active.as_ref().map(|session| session.identity.as_str())
    }

    /// Start relaying for `identity`, stopping any previous session first.
    ///
    /// # Errors
    ///
    /// Returns an error if no log matches the identity, the configuration
    /// cannot drive a session, or the log cannot be opened. No session is
    /// active afterwards in that case.
    pub async fn load(&mut self, identity: &str) -> Result<ResolvedSource, SessionError> {
        self.stop().await;

        let identity = identity.trim();
        if identity.is_empty() {
            return Err(SessionError::EmptyIdentity);
        }

        let config = self.snapshot_config();
        self.status.begin(identity);

        match self.start(identity, &config).await {
            Ok(source) => Ok(source),
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "Session failed to start");
                self.status.set_error(&e.to_string());
                self.status.transition(SessionPhase::Failed);
                Err(e)
            }
        }
    }

    fn snapshot_config(&mut self) -> AppConfig {
        if let Some(loader) = &self.config_loader {
            self.config = loader.load_or_default();
        }
        let mut config = self.config.clone();
        self.overrides.apply(&mut config);
        config
    }

    async fn start(
        &mut self,
        identity: &str,
        config: &AppConfig,
    ) -> Result<ResolvedSource, SessionError> {
        let log_dir = config.resolved_log_dir().ok_or(SessionError::NoLogDirectory)?;
        let resolver = LogResolver::new(log_dir, config.log_prefix.clone());
        let wanted = identity.to_string();
        let source = tokio::task::spawn_blocking(move || resolver.resolve(&wanted))
            .await
            .map_err(|e| SessionError::Join(e.to_string()))??;

        let classifier = LineClassifier::from_config(config)?;
        let relay_config = config.relay_config();
        if self.check_endpoint && classifier.mode() == ClassifierMode::Relay {
            relay_config.endpoint_url()?;
        }

        // Open before announcing so lines written meanwhile are not lost.
        let tailer = LogTailer::open(&source, config.poll_interval()).await?;
        self.status.set_log_file(source.file_name());

        self.status.transition(SessionPhase::Announcing);
        if classifier.mode() == ClassifierMode::Relay {
            self.announce(&source, &relay_config).await;
        }

        self.counter_tx.send_replace(0);

        // The task may fail and publish Stopped as soon as it is spawned.
        self.status.transition(SessionPhase::Tailing);

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let task = SessionTask {
            tailer,
            classifier,
            sink: Arc::clone(&self.sink),
            relay_config,
            status: self.status.clone(),
            counter_tx: Arc::clone(&self.counter_tx),
            commands: commands_rx,
            cancel: cancel.clone(),
        };

        let status = self.status.clone();
        let task_cancel = cancel.clone();
        let span = tracing::info_span!("session", id = %id, identity = %identity);
        let handle = tokio::spawn(
            async move {
                let result = task.run().await;
                if let Err(e) = &result {
                    if !task_cancel.is_cancelled() {
                        tracing::error!(error = %e, "Tailing stopped");
                        status.set_error(&e.to_string());
                        status.transition(SessionPhase::Stopping);
                        status.transition(SessionPhase::Stopped);
                    }
                }
                result
            }
            .instrument(span),
        );

        tracing::info!(
            id = %id,
            identity = %identity,
            path = %source.path.display(),
            "Session started"
        );
        self.active = Some(ActiveSession {
            id,
            identity: identity.to_string(),
            source: source.clone(),
            cancel,
            commands,
            handle,
        });
        Ok(source)
    }

    async fn announce(&self, source: &ResolvedSource, relay_config: &RelayConfig) {
        let listener = match read_listener_header(&source.path).await {
            Ok(Some(listener)) => listener,
            Ok(None) => {
                tracing::debug!(path = %source.path.display(), "No listener header, skipping announcement");
                return;
            }
            Err(e) => {
                tracing::warn!(path = %source.path.display(), error = %e, "Could not read header");
                return;
            }
        };

        let message = OutboundMessage::announcement(&listener);
        match self.sink.send(&message, relay_config).await {
            Ok(()) => self.status.record_relayed(),
            Err(e) => {
                self.status.record_delivery_failure();
                tracing::warn!(error = %e, "Announcement delivery failed");
            }
        }
    }

    /// Stop the running session and wait for its task to exit.
    ///
    /// Does nothing when no session is active.
    pub async fn stop(&mut self) {
        let Some(session) = self.active.take() else {
            return;
        };

        session.cancel.cancel();
        if self.status.phase().is_active() {
            self.status.transition(SessionPhase::Stopping);
        }

        match session.handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Session had already failed"),
            Err(e) => tracing::error!(error = %e, "Session task did not exit cleanly"),
        }

        if self.status.phase() == SessionPhase::Stopping {
            self.status.transition(SessionPhase::Stopped);
        }
        tracing::info!(id = %session.id, identity = %session.identity, "Session stopped");
    }

    /// Set the counter back to zero.
    ///
    /// The running task performs the reset, so it stays the only writer.
    pub async fn reset_counter(&self) {
        if let Some(session) = &self.active {
            if session.commands.send(SessionCommand::ResetCounter).await.is_ok() {
                return;
            }
        }
        self.counter_tx.send_replace(0);
    }

    /// Stop any session and consume the controller.
    pub async fn shutdown(mut self) {
        self.stop().await;
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(session) = &self.active {
            session.cancel.cancel();
        }
    }
}
