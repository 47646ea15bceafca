//! Versioned snapshot storage.
//!
//! One slot per server, each behind its own lock, so writers for different
//! servers never wait on each other. The version comparison inside the slot
//! lock is the only serialization point between concurrent writers for the
//! same server.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;
use widget_sync_types::{ServerId, Snapshot};

use crate::error::{Result, SyncError};

/// Number of applied versions remembered per server by default.
pub const DEFAULT_HISTORY_DEPTH: usize = 16;

/// Latest snapshot and recent applied versions for one server.
#[derive(Debug, Default)]
struct Slot {
    current: Option<Snapshot>,
    versions: VecDeque<u64>,
}

/// Thread-safe mapping from server to its latest applied snapshot.
///
/// # Example
///
/// ```
/// use widget_sync::SnapshotStore;
/// use widget_sync_types::Snapshot;
///
/// let store = SnapshotStore::new();
/// assert!(store.put(Snapshot::builder("s1").version(2).build()));
/// // Older or equal versions are rejected
/// assert!(!store.put(Snapshot::builder("s1").version(1).build()));
/// assert_eq!(store.version(&"s1".into()), Some(2));
/// ```
#[derive(Debug)]
pub struct SnapshotStore {
    slots: RwLock<BTreeMap<ServerId, Arc<Mutex<Slot>>>>,
    history_depth: usize,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::with_history_depth(DEFAULT_HISTORY_DEPTH)
    }

    /// Create a store that remembers up to `depth` applied versions per server.
    pub fn with_history_depth(depth: usize) -> Self {
        Self {
            slots: RwLock::new(BTreeMap::new()),
            history_depth: depth.max(1),
        }
    }

    fn get_or_create_slot(&self, server_id: &ServerId) -> Arc<Mutex<Slot>> {
        // Fast path
        {
            let slots = self.slots.read();
            if let Some(slot) = slots.get(server_id) {
                return slot.clone();
            }
        }

        // Slow path
        let mut slots = self.slots.write();
        slots.entry(server_id.clone()).or_default().clone()
    }

    fn slot(&self, server_id: &ServerId) -> Option<Arc<Mutex<Slot>>> {
        self.slots.read().get(server_id).cloned()
    }

    /// Apply a snapshot if it is newer than the stored one.
    ///
    /// Returns `true` if the write took effect. A snapshot whose version is
    /// not strictly greater than the stored version leaves the store untouched.
    pub fn put(&self, snapshot: Snapshot) -> bool {
        let slot = self.get_or_create_slot(&snapshot.server_id);
        let mut slot = slot.lock();

        if let Some(current) = &slot.current {
            if !snapshot.supersedes(current) {
                debug!(
                    server = %snapshot.server_id,
                    incoming = snapshot.version,
                    stored = current.version,
                    "rejected stale snapshot"
                );
                return false;
            }
        }

        slot.versions.push_back(snapshot.version);
        if slot.versions.len() > self.history_depth {
            slot.versions.pop_front();
        }
        slot.current = Some(snapshot);
        true
    }

    /// Get the most recently applied snapshot for a server.
    pub fn get(&self, server_id: &ServerId) -> Result<Snapshot> {
        let not_found = || SyncError::NotFound(server_id.clone());
        let slot = self.slot(server_id).ok_or_else(not_found)?;
        let current = slot.lock().current.clone();
        current.ok_or_else(not_found)
    }

    /// Get the stored snapshot, or the placeholder defaults if the server has
    /// never been synced.
    pub fn get_or_default(&self, server_id: &ServerId) -> Snapshot {
        match self.get(server_id) {
            Ok(snapshot) => snapshot,
            Err(_) => Snapshot::placeholder(server_id.clone()),
        }
    }

    /// Stored version for a server, if any.
    pub fn version(&self, server_id: &ServerId) -> Option<u64> {
        let slot = self.slot(server_id)?;
        let version = slot.lock().current.as_ref().map(|s| s.version);
        version
    }

    /// Recently applied versions for a server, oldest first.
    pub fn history(&self, server_id: &ServerId) -> Vec<u64> {
        let Some(slot) = self.slot(server_id) else {
            return Vec::new();
        };
        let versions = slot.lock().versions.iter().copied().collect();
        versions
    }

    /// Servers that have at least one applied snapshot.
    pub fn server_ids(&self) -> Vec<ServerId> {
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.lock().current.is_some())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.server_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out every stored snapshot, ordered by server id.
    pub fn export(&self) -> Vec<Snapshot> {
        let slots: Vec<_> = self.slots.read().values().cloned().collect();
        slots
            .iter()
            .filter_map(|slot| slot.lock().current.clone())
            .collect()
    }

    /// Apply previously exported snapshots.
    ///
    /// Each snapshot goes through [`put`](Self::put), so entries older than
    /// what the store already holds are skipped. Returns the number applied.
    pub fn restore<I>(&self, snapshots: I) -> usize
    where
        I: IntoIterator<Item = Snapshot>,
    {
        snapshots
            .into_iter()
            .map(|snapshot| self.put(snapshot))
            .filter(|applied| *applied)
            .count()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
