//! Message sources feeding the coordinator.
//!
//! A source yields [`Inbound`] messages (metric snapshots or widget lifecycle
//! events) from a file, an async byte stream, or an in-process channel.

mod channel;
mod file;
mod stream;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use stream::StreamSource;

use std::fmt::Debug;

use crate::message::Inbound;

/// Trait for receiving inbound messages from various producers.
///
/// # Example
///
/// ```
/// use widget_sync::{FileSource, MessageSource};
///
/// let mut source = FileSource::new("snapshots.json");
/// while let Some(message) = source.poll() {
///     println!("got {:?}", message);
/// }
/// ```
pub trait MessageSource: Send + Debug {
    /// Return the next pending message, if any.
    ///
    /// Must not block. `None` means nothing is available right now.
    fn poll(&mut self) -> Option<Inbound>;

    /// Human-readable description of the source, used in logs.
    fn description(&self) -> &str;

    /// Last error encountered while reading, if any.
    fn error(&self) -> Option<String>;
}
