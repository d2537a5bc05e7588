//! Incremental chat log tailer.
//!
//! Opens a log at its current end and yields lines as they are appended.
//! This is a polling tail: when no complete line is available it sleeps for
//! the poll interval and tries again.

use std::collections::VecDeque;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

use super::discovery::ResolvedSource;
use super::encoding::LogEncoding;
use super::error::WatcherError;

/// Default interval between polls for new data.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Size of a single read from the log file.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound on bytes consumed by one poll.
const MAX_READ_PER_POLL: usize = 16 * READ_CHUNK_SIZE;

/// Incremental log reader that holds the file open and tracks its position.
///
/// Only content appended after [`LogTailer::open`] is ever returned. A line
/// is emitted only once its terminator has been written.
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    file: File,
    encoding: LogEncoding,
    /// Length of the byte order mark at the start of the file.
    bom_len: u64,
    offset: u64,
    /// Bytes read but not yet terminated by a newline.
    pending: Vec<u8>,
    /// Complete lines not yet handed out by `next_line`.
    ready: VecDeque<String>,
    /// Drop the first completed line (we started in the middle of it).
    discard_partial: bool,
    poll_interval: Duration,
}

impl LogTailer {
    /// Open the resolved log and position at end of file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or inspected.
    pub async fn open(source: &ResolvedSource, poll_interval: Duration) -> Result<Self, WatcherError> {
        let path = source.path.clone();
        let file = File::open(&path)
            .await
            .map_err(|e| WatcherError::from_io(&path, e))?;

        let mut tailer = Self {
            path,
            file,
            encoding: source.encoding,
            bom_len: source.bom_len as u64,
            offset: 0,
            pending: Vec::new(),
            ready: VecDeque::new(),
            discard_partial: false,
            poll_interval,
        };
        let len = tailer.file.metadata().await?.len();
        tailer.position_at_end(len).await?;

        tracing::debug!(
            path = %tailer.path.display(),
            offset = tailer.offset,
            discard_partial = tailer.discard_partial,
            "Tailer opened at end of file"
        );
        Ok(tailer)
    }

    /// Get the current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the path being tailed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Read complete lines appended since the last read.
    ///
    /// Trailing `\r\n`/`\n` is stripped. Bytes of an unterminated line are
    /// kept until the terminator arrives.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::FileDeleted` if the file no longer exists, or
    /// `WatcherError::Io` for a (transient) read failure.
    pub async fn read_new_lines(&mut self) -> Result<Vec<String>, WatcherError> {
        let len = self.file.metadata().await?.len();

        if len < self.offset {
            tracing::warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = len,
                "File truncated, repositioning at new end"
            );
            self.position_at_end(len).await?;
            return Ok(Vec::new());
        }

        if len == self.offset {
            if !tokio::fs::try_exists(&self.path).await.unwrap_or(true) {
                return Err(WatcherError::FileDeleted(self.path.clone()));
            }
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        let mut consumed = 0;
        while consumed < MAX_READ_PER_POLL {
            let n = self.file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            self.pending.extend_from_slice(&buf[..n]);
            self.offset += n as u64;
            consumed += n;
        }

        Ok(self.drain_lines())
    }

    /// Wait for the next complete line.
    ///
    /// Polls every `poll_interval` until a line is available. Returns
    /// `Ok(None)` once `cancel` fires; cancellation is checked before every
    /// line and during every sleep. Transient read errors are logged and
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns a permanent error (file deleted, permission revoked).
    pub async fn next_line(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, WatcherError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            if let Some(line) = self.ready.pop_front() {
                return Ok(Some(line));
            }

            let read = self.read_new_lines().await;
            if self.absorb_read(read)? {
                continue;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(None),
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Queue the lines of one read attempt.
    ///
    /// Returns `true` if any lines were queued. A transient error is logged
    /// and treated as an empty read so the caller polls again.
    fn absorb_read(&mut self, read: Result<Vec<String>, WatcherError>) -> Result<bool, WatcherError> {
        match read {
            Ok(lines) => {
                let any = !lines.is_empty();
                self.ready.extend(lines);
                Ok(any)
            }
            Err(e) if e.is_permanent() => Err(e),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Read failed, retrying");
                Ok(false)
            }
        }
    }

    /// Turn the tailer into a stream of lines that ends on cancellation.
    ///
    /// A permanent error is yielded once and then the stream ends. The file
    /// handle is closed when the stream is dropped.
    pub fn into_lines(
        self,
        cancel: CancellationToken,
    ) -> impl futures_core::Stream<Item = Result<String, WatcherError>> {
        futures_util::stream::unfold(Some((self, cancel)), |state| async move {
            let (mut tailer, cancel) = state?;
            match tailer.next_line(&cancel).await {
                Ok(Some(line)) => Some((Ok(line), Some((tailer, cancel)))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Seek to the last whole code unit at or before `len`.
    async fn position_at_end(&mut self, len: u64) -> Result<(), WatcherError> {
        let unit = self.encoding.unit_width() as u64;
        let offset = len - len % unit;

        self.discard_partial = false;
        if offset > self.bom_len {
            let mut last = vec![0u8; self.encoding.unit_width()];
            self.file.seek(SeekFrom::Start(offset - unit)).await?;
            self.file.read_exact(&mut last).await?;
            self.discard_partial = last != self.encoding.newline();
        }

        self.file.seek(SeekFrom::Start(offset)).await?;
        self.offset = offset;
        self.pending.clear();
        self.ready.clear();
        Ok(())
    }

    /// Split complete lines off the pending buffer.
    fn drain_lines(&mut self) -> Vec<String> {
        let encoding = self.encoding;
        let unit = encoding.unit_width();
        let newline = encoding.newline();

        let mut lines = Vec::new();
        let mut start = 0;
        let mut pos = 0;
        while pos + unit <= self.pending.len() {
            if &self.pending[pos..pos + unit] == newline {
                if self.discard_partial {
                    self.discard_partial = false;
                } else {
                    let text = encoding.decode(&self.pending[start..pos]);
                    lines.push(text.trim_end_matches('\r').to_string());
                }
                start = pos + unit;
            }
            pos += unit;
        }
        self.pending.drain(..start);
        lines
    }
}
