//! Compose event stream
//!
//! `compose events --json` prints one JSON object per line. [`EventSink`]
//! takes that output in arbitrary chunks, splits it into lines and
//! publishes each parsed [`Event`] on a bounded channel. Lines that fail to
//! parse go to a separate error channel so one bad line never stops the
//! stream.

use crate::error::{ComposeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default channel capacity
pub const DEFAULT_CAPACITY: usize = 64;

const READ_BUFFER_SIZE: usize = 8192;

/// One compose event
///
/// Missing fields take their default values; only malformed JSON is a
/// parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub time: DateTime<Utc>,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

/// Create an event stream
///
/// Returns the event receiver, the parse error receiver and the sink that
/// subprocess output is written into. Sends block while a channel is full
/// until a consumer receives or `cancel` fires.
pub fn event_stream(
    cancel: CancellationToken,
    capacity: usize,
) -> (mpsc::Receiver<Event>, mpsc::Receiver<ComposeError>, EventSink) {
    let capacity = capacity.max(1);
    let (event_tx, event_rx) = mpsc::channel(capacity);
    let (error_tx, error_rx) = mpsc::channel(capacity);
    let sink = EventSink {
        buffer: Vec::new(),
        events: event_tx,
        errors: error_tx,
        cancel,
    };
    (event_rx, error_rx, sink)
}

/// Writable end of an event stream
#[derive(Debug)]
pub struct EventSink {
    buffer: Vec<u8>,
    events: mpsc::Sender<Event>,
    errors: mpsc::Sender<ComposeError>,
    cancel: CancellationToken,
}

impl EventSink {
    /// Feed a chunk of output
    ///
    /// Every complete line in the buffer is parsed and published before
    /// this returns. Returns the number of bytes accepted.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(self.cancelled());
        }

        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..pos]);
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            self.publish(line).await?;
        }

        Ok(chunk.len())
    }

    /// Bytes received after the last newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Copy `reader` into the sink until EOF or cancellation
    ///
    /// An unterminated final line is discarded.
    pub async fn copy_from<R>(&mut self, mut reader: R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut total = 0u64;

        loop {
            let n = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Err(self.cancelled()),
                read = reader.read(&mut buf) => read?,
            };
            if n == 0 {
                break;
            }
            total += n as u64;
            self.write(&buf[..n]).await?;
        }

        if !self.buffer.is_empty() {
            debug!(bytes = self.buffer.len(), "discarding unterminated event line");
            self.buffer.clear();
        }
        Ok(total)
    }

    async fn publish(&mut self, line: &str) -> Result<()> {
        match serde_json::from_str::<Event>(line) {
            Ok(event) => {
                trace!(action = %event.action, id = %event.id, "event");
                let sent = tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => return Err(self.cancelled()),
                    sent = self.events.send(event) => sent,
                };
                // Nobody is left to receive events
                if sent.is_err() {
                    debug!("event receiver dropped");
                    return Err(self.cancelled());
                }
            }
            Err(source) => {
                let err = ComposeError::EventParse {
                    line: line.to_string(),
                    source,
                };
                let sent = tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => return Err(self.cancelled()),
                    sent = self.errors.send(err) => sent,
                };
                if let Err(mpsc::error::SendError(err)) = sent {
                    debug!(error = %err, "error receiver dropped, discarding parse error");
                }
            }
        }
        Ok(())
    }

    fn cancelled(&mut self) -> ComposeError {
        if !self.buffer.is_empty() {
            debug!(bytes = self.buffer.len(), "event stream cancelled, dropping buffered output");
        }
        self.buffer.clear();
        ComposeError::Cancelled
    }
}
