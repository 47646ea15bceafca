//! Channel-based message source.
//!
//! For producers living in the same process: a polling client or the host
//! adapter pushes messages through a tokio mpsc channel.

use tokio::sync::mpsc;

use super::MessageSource;
use crate::message::Inbound;

/// A source that receives messages pushed through a channel.
///
/// # Example
///
/// ```
/// use widget_sync::ChannelSource;
///
/// let (tx, source) = ChannelSource::create("poller", 32);
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::Receiver<Inbound>,
    description: String,
    closed: bool,
}

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<Inbound>, source_description: &str) -> Self {
        Self {
            receiver,
            description: format!("channel: {}", source_description),
            closed: false,
        }
    }

    /// Create a channel pair. Returns the sender producers push into.
    pub fn create(source_description: &str, buffer: usize) -> (mpsc::Sender<Inbound>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx, source_description))
    }
}

impl MessageSource for ChannelSource {
    fn poll(&mut self) -> Option<Inbound> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.closed.then(|| "All producers disconnected".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::WidgetEvent;
    use widget_sync_types::WidgetId;

    #[test]
    fn test_channel_source_poll() {
        let (tx, mut source) = ChannelSource::create("test", 8);

        assert!(source.poll().is_none());

        tx.try_send(Inbound::Event(WidgetEvent::Tapped {
            widget_id: WidgetId(1),
        }))
        .unwrap();

        assert!(matches!(
            source.poll(),
            Some(Inbound::Event(WidgetEvent::Tapped { .. }))
        ));
        assert!(source.poll().is_none());
        assert!(source.error().is_none());
    }

    #[test]
    fn test_channel_source_reports_disconnect() {
        let (tx, mut source) = ChannelSource::create("test", 8);
        drop(tx);

        assert!(source.poll().is_none());
        assert_eq!(source.description(), "channel: test");
        assert!(source.error().is_some());
    }
}
