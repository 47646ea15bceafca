//! Stream-based message source.
//!
//! Reads newline-delimited JSON messages from an async byte stream, such as
//! a TCP connection to a metric producer or a host adapter.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use super::MessageSource;
use crate::message::Inbound;

const DEFAULT_BUFFER: usize = 64;

/// A source fed by a background task reading an async stream.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use widget_sync::StreamSource;
///
/// # tokio_test::block_on(async {
/// let data = b"{\"event\": \"removed\", \"widget_id\": 1}\n";
/// let stream = Cursor::new(data.to_vec());
/// let source = StreamSource::spawn(stream, "example");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource {
    receiver: mpsc::Receiver<Inbound>,
    description: String,
    last_error: Arc<Mutex<Option<String>>>,
}

impl StreamSource {
    /// Spawn a task reading newline-delimited JSON from `reader`.
    ///
    /// Lines that fail to parse are skipped and recorded as the last error.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self::spawn_with_capacity(reader, description, DEFAULT_BUFFER)
    }

    /// Like [`spawn`](Self::spawn), buffering up to `capacity` parsed
    /// messages before the reader waits for the consumer.
    pub fn spawn_with_capacity<R>(reader: R, description: &str, capacity: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let last_error = Arc::new(Mutex::new(None));
        let error_handle = last_error.clone();
        let desc = description.to_string();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        *error_handle.lock() = Some("Connection closed".to_string());
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Inbound>(trimmed) {
                            Ok(message) => {
                                *error_handle.lock() = None;
                                if tx.send(message).await.is_err() {
                                    // Receiver dropped
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(source = %desc, error = %e, "skipping unparsable line");
                                *error_handle.lock() = Some(format!("Parse error: {}", e));
                            }
                        }
                    }
                    Err(e) => {
                        *error_handle.lock() = Some(format!("Read error: {}", e));
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            last_error,
        }
    }

    /// Create a source from a channel of raw JSON payloads.
    ///
    /// Useful when another transport (a push client, a message bus) already
    /// delivers one message per payload.
    pub fn from_bytes_channel(mut rx: mpsc::Receiver<Vec<u8>>, description: &str) -> Self {
        let (tx, message_rx) = mpsc::channel(DEFAULT_BUFFER);
        let last_error = Arc::new(Mutex::new(None));
        let error_handle = last_error.clone();

        tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                match serde_json::from_slice::<Inbound>(&bytes) {
                    Ok(message) => {
                        *error_handle.lock() = None;
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        *error_handle.lock() = Some(format!("Parse error: {}", e));
                    }
                }
            }
        });

        Self {
            receiver: message_rx,
            description: format!("stream: {}", description),
            last_error,
        }
    }
}

impl MessageSource for StreamSource {
    fn poll(&mut self) -> Option<Inbound> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                let mut last_error = self.last_error.lock();
                if last_error.is_none() {
                    *last_error = Some("Stream disconnected".to_string());
                }
                None
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}
