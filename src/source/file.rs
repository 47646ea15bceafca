//! File-based message source.
//!
//! Polls a JSON file holding one message or an array of messages.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;

use super::MessageSource;
use crate::message::{parse_batch, Inbound};

/// A source that re-reads a JSON file whenever its modification time changes.
///
/// All messages in the file are queued on each change and handed out one
/// per [`poll`](MessageSource::poll). Re-delivering an unchanged snapshot is
/// harmless: the store rejects it as stale.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    last_error: Option<String>,
    last_modified: Option<SystemTime>,
    pending: VecDeque<Inbound>,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            last_error: None,
            last_modified: None,
            pending: VecDeque::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    fn read_file(&mut self) -> Option<Vec<Inbound>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match parse_batch(&content) {
                Ok(batch) => {
                    self.last_error = None;
                    let mut messages = Vec::with_capacity(batch.len());
                    for (index, item) in batch.into_iter().enumerate() {
                        match item {
                            Ok(message) => messages.push(message),
                            Err(e) => {
                                warn!(source = %self.description, index, error = %e, "skipping unparsable item");
                                self.last_error = Some(format!("Parse error: item {}: {}", index, e));
                            }
                        }
                    }
                    Some(messages)
                }
                Err(e) => {
                    self.last_error = Some(format!("Parse error: {}", e));
                    None
                }
            },
            Err(e) => {
                self.last_error = Some(format!("Read error: {}", e));
                None
            }
        }
    }

    fn refill(&mut self) {
        let current_modified = self.get_modified_time();

        let file_changed = match (&self.last_modified, &current_modified) {
            (None, _) => true,        // First poll, always read
            (Some(_), None) => false, // File disappeared, keep what we have
            (Some(last), Some(current)) => current > last,
        };

        if file_changed {
            if let Some(batch) = self.read_file() {
                self.last_modified = current_modified;
                self.pending.extend(batch);
            }
        }
    }
}

impl MessageSource for FileSource {
    fn poll(&mut self) -> Option<Inbound> {
        if self.pending.is_empty() {
            self.refill();
        }
        self.pending.pop_front()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.last_error.clone()
    }
}
