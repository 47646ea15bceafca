//! On-disk state for the snapshot store.
//!
//! The store is written as a small JSON document so a restarted process can
//! draw widgets from the last known values instead of placeholders.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use widget_sync_types::Snapshot;

use crate::error::Result;
use crate::store::SnapshotStore;

/// Format version of the state file.
pub const STATE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    format: u32,
    snapshots: Vec<Snapshot>,
}

/// JSON file holding the latest snapshot of every server.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshots in the file. A missing file is an empty state.
    pub fn load(&self) -> Result<Vec<Snapshot>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no state file yet");
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let document: StateDocument = serde_json::from_str(&content)?;
        if document.format != STATE_FORMAT_VERSION {
            warn!(
                path = %self.path.display(),
                format = document.format,
                "state file has unexpected format version, loading anyway"
            );
        }
        Ok(document.snapshots)
    }

    /// Load the file into `store`. Returns the number of snapshots applied.
    pub fn load_into(&self, store: &SnapshotStore) -> Result<usize> {
        let applied = store.restore(self.load()?);
        info!(path = %self.path.display(), applied, "restored snapshot state");
        Ok(applied)
    }

    /// Write the store's current contents.
    ///
    /// Writes to a sibling temp file first and renames it into place, so a
    /// crash mid-write never leaves a truncated state file.
    pub fn save(&self, store: &SnapshotStore) -> Result<usize> {
        let (json, count) = encode(store)?;

        let tmp = self.tmp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), count, "saved snapshot state");
        Ok(count)
    }

    /// Async variant of [`save`](Self::save) for use inside the runtime.
    pub async fn save_async(&self, store: &SnapshotStore) -> Result<usize> {
        let (json, count) = encode(store)?;

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(count)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn encode(store: &SnapshotStore) -> Result<(String, usize)> {
    let document = StateDocument {
        format: STATE_FORMAT_VERSION,
        snapshots: store.export(),
    };
    let json = serde_json::to_string_pretty(&document)?;
    Ok((json, document.snapshots.len()))
}
