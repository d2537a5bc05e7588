//! The background tailing task of one session.
//!
//! A reader half pulls lines from the tailer and classifies them; in relay
//! mode it hands messages to a dispatcher half over a bounded channel. Both
//! halves run inside the same spawned task, so joining that task joins both.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::relay::{unix_now, Classification, LineClassifier, OutboundMessage, RelaySink};
use crate::watcher::{LogTailer, WatcherError};

use super::state::StatusPublisher;

/// Capacity of the reader-to-dispatcher message buffer.
pub const DEFAULT_DISPATCH_BUFFER: usize = 64;

/// Requests sent from the controller to the running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Set the counter back to zero.
    ResetCounter,
}

/// Everything a running session owns.
pub(crate) struct SessionTask {
    pub tailer: LogTailer,
    pub classifier: LineClassifier,
    pub sink: Arc<dyn RelaySink>,
    pub relay_config: RelayConfig,
    pub status: StatusPublisher,
    pub counter_tx: Arc<watch::Sender<u64>>,
    pub commands: mpsc::Receiver<SessionCommand>,
    pub cancel: CancellationToken,
}

impl SessionTask {
    /// Run until cancelled or the log becomes unreadable.
    pub(crate) async fn run(self) -> Result<(), WatcherError> {
        let (message_tx, message_rx) = mpsc::channel(DEFAULT_DISPATCH_BUFFER);

        let dispatcher = dispatch(
            Arc::clone(&self.sink),
            self.relay_config.clone(),
            message_rx,
            self.cancel.clone(),
            self.status.clone(),
        );
        let reader = self.read(message_tx);

        let (result, ()) = tokio::join!(reader, dispatcher);
        result
    }

    async fn read(self, message_tx: mpsc::Sender<OutboundMessage>) -> Result<(), WatcherError> {
        let Self {
            tailer,
            classifier,
            status,
            counter_tx,
            mut commands,
            cancel,
            ..
        } = self;

        // Only this task writes the counter while it runs.
        let mut counter: u64 = 0;
        counter_tx.send_replace(counter);

        let lines = tailer.into_lines(cancel.clone());
        tokio::pin!(lines);

        loop {
            tokio::select! {
                biased;

                Some(command) = commands.recv() => match command {
                    SessionCommand::ResetCounter => {
                        counter = 0;
                        counter_tx.send_replace(counter);
                        tracing::info!("Count reset on request");
                    }
                },

                item = lines.next() => {
                    let line = match item {
                        None => return Ok(()),
                        Some(Err(e)) => return Err(e),
                        Some(Ok(line)) => line,
                    };
                    status.record_line();
                    tracing::trace!(line = %line, "Read line");

                    match classifier.classify(&line, &mut counter, unix_now()) {
                        Classification::Relay(message) => {
                            tokio::select! {
                                biased;
                                () = cancel.cancelled() => return Ok(()),
                                sent = message_tx.send(message) => {
                                    if sent.is_err() {
                                        return Ok(());
                                    }
                                }
                            }
                        }
                        Classification::CounterReset => {
                            counter_tx.send_replace(counter);
                            tracing::info!(line = %line.trim(), "Count reset by dash");
                        }
                        Classification::CounterIncremented { by, total } => {
                            counter_tx.send_replace(total);
                            tracing::info!(by, total, line = %line.trim(), "Incremented count");
                        }
                        Classification::Ignored => {}
                    }
                }
            }
        }
    }
}

/// Deliver messages in order, one at a time, until cancelled or drained.
async fn dispatch(
    sink: Arc<dyn RelaySink>,
    config: RelayConfig,
    mut messages: mpsc::Receiver<OutboundMessage>,
    cancel: CancellationToken,
    status: StatusPublisher,
) {
    loop {
        let message = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = messages.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };

        match sink.send(&message, &config).await {
            Ok(()) => status.record_relayed(),
            Err(e) => {
                status.record_delivery_failure();
                tracing::warn!(error = %e, "Relay delivery failed");
            }
        }
    }
}
