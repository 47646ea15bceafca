//! Render sinks: where finished frames go.
//!
//! The core never paints anything. A sink hands each [`RenderFrame`] to the
//! host's widget surface and must not block; delivery is fire-and-forget.

use std::fmt::Debug;
use std::io::Write;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;
use widget_sync_types::RenderFrame;

/// Receiver of render frames, keyed by widget id inside the frame.
pub trait RenderSink: Send + Sync + Debug {
    /// Hand a frame to the renderer. Must not block.
    fn deliver(&self, frame: RenderFrame);
}

/// Sink that forwards frames through a tokio channel.
///
/// Delivery is best effort: when the channel is full or closed the frame is
/// dropped, since the next projection supersedes it anyway.
///
/// # Example
///
/// ```
/// use widget_sync::ChannelSink;
///
/// let (sink, mut rx) = ChannelSink::create(16);
/// assert!(rx.try_recv().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<RenderFrame>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<RenderFrame>) -> Self {
        Self { sender }
    }

    /// Create a sink and the receiver the renderer reads from.
    pub fn create(buffer: usize) -> (Self, mpsc::Receiver<RenderFrame>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }
}

impl RenderSink for ChannelSink {
    fn deliver(&self, frame: RenderFrame) {
        if let Err(e) = self.sender.try_send(frame) {
            warn!(error = %e, "render frame dropped");
        }
    }
}

/// Sink that writes each frame as one JSON line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write + Send + Debug> {
    writer: Mutex<W>,
}

impl<W: Write + Send + Debug> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_frame(&self, frame: &RenderFrame) -> std::io::Result<()> {
        let json = serde_json::to_string(frame)?;
        let mut writer = self.writer.lock();
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl<W: Write + Send + Debug> RenderSink for JsonLinesSink<W> {
    fn deliver(&self, frame: RenderFrame) {
        if let Err(e) = self.write_frame(&frame) {
            warn!(widget = %frame.widget_id, error = %e, "failed to write render frame");
        }
    }
}
