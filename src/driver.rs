//! Background pump from a message source into the coordinator.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::{ApplyOutcome, SyncCoordinator};
use crate::error::SyncError;
use crate::message::Inbound;
use crate::persist::StateFile;
use crate::source::MessageSource;

/// Counters for messages processed by a drain or a driver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub applied: usize,
    pub stale: usize,
    pub rejected: usize,
    pub events: usize,
}

impl DrainStats {
    pub fn total(&self) -> usize {
        self.applied + self.stale + self.rejected + self.events
    }

    fn merge(&mut self, other: DrainStats) {
        self.applied += other.applied;
        self.stale += other.stale;
        self.rejected += other.rejected;
        self.events += other.events;
    }
}

/// Feed everything the source has right now into the coordinator.
///
/// Malformed snapshots are reported back to the producer side through the
/// log and counted; they never stop the drain.
pub fn drain(coordinator: &SyncCoordinator, source: &mut dyn MessageSource) -> DrainStats {
    let mut stats = DrainStats::default();

    while let Some(inbound) = source.poll() {
        match inbound {
            Inbound::Event(event) => {
                coordinator.handle_event(event);
                stats.events += 1;
            }
            Inbound::Snapshot(message) => match coordinator.apply(message) {
                Ok(ApplyOutcome::Applied { .. }) => stats.applied += 1,
                Ok(ApplyOutcome::Stale) => stats.stale += 1,
                Err(SyncError::Malformed { field, reason }) => {
                    warn!(source = source.description(), field, %reason, "rejected malformed snapshot");
                    stats.rejected += 1;
                }
                Err(e) => {
                    warn!(source = source.description(), error = %e, "failed to apply snapshot");
                    stats.rejected += 1;
                }
            },
        }
    }

    stats
}

/// Periodically drains a source into a coordinator on the tokio runtime.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use widget_sync::{ChannelSink, FileSource, SyncCoordinator, SyncDriver};
///
/// #[tokio::main]
/// async fn main() {
///     let (sink, _frames) = ChannelSink::create(64);
///     let coordinator = Arc::new(SyncCoordinator::new(Arc::new(sink)));
///
///     let handle = SyncDriver::builder()
///         .interval(Duration::from_millis(500))
///         .build(coordinator)
///         .start(Box::new(FileSource::new("snapshots.json")));
///
///     tokio::time::sleep(Duration::from_secs(5)).await;
///     let stats = handle.stop().await;
///     println!("applied {} snapshots", stats.applied);
/// }
/// ```
#[derive(Debug)]
pub struct SyncDriver {
    coordinator: Arc<SyncCoordinator>,
    interval: Duration,
    state_file: Option<StateFile>,
    save_interval: Duration,
}

impl SyncDriver {
    pub fn builder() -> SyncDriverBuilder {
        SyncDriverBuilder::new()
    }

    /// Spawn the polling task.
    ///
    /// When a state file is configured the store is saved on every save tick
    /// that saw an applied snapshot, and once more on stop.
    pub fn start(self, mut source: Box<dyn MessageSource>) -> DriverHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut poll_timer = tokio::time::interval(self.interval);
            let mut save_timer = tokio::time::interval(self.save_interval);
            let mut totals = DrainStats::default();
            let mut dirty = false;
            let mut last_error: Option<String> = None;

            info!(source = source.description(), "sync driver started");

            loop {
                tokio::select! {
                    _ = poll_timer.tick() => {
                        let stats = drain(&self.coordinator, source.as_mut());
                        if stats.total() > 0 {
                            debug!(?stats, "drained source");
                        }
                        dirty |= stats.applied > 0;
                        totals.merge(stats);

                        let error = source.error();
                        if error != last_error {
                            if let Some(e) = &error {
                                warn!(source = source.description(), error = %e, "source error");
                            }
                            last_error = error;
                        }
                    }
                    _ = save_timer.tick(), if self.state_file.is_some() && dirty => {
                        // Stays dirty on failure so the next tick retries
                        if self.save().await {
                            dirty = false;
                        }
                    }
                    changed = stop_rx.changed() => {
                        // Handle dropped without stop() counts as a stop
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            // Pick up anything that arrived after the last tick
            let stats = drain(&self.coordinator, source.as_mut());
            dirty |= stats.applied > 0;
            totals.merge(stats);
            if dirty && !self.save().await {
                warn!("state not persisted on stop");
            }

            info!(?totals, "sync driver stopped");
            totals
        });

        DriverHandle { stop_tx, task }
    }

    /// Returns `false` if the state file could not be written.
    async fn save(&self) -> bool {
        let Some(state_file) = &self.state_file else {
            return true;
        };
        match state_file.save_async(self.coordinator.store()).await {
            Ok(_) => true,
            Err(e) => {
                warn!(path = %state_file.path().display(), error = %e, "failed to save state");
                false
            }
        }
    }
}

/// Builder for [`SyncDriver`].
#[derive(Debug, Default)]
pub struct SyncDriverBuilder {
    interval: Option<Duration>,
    state_file: Option<StateFile>,
    save_interval: Option<Duration>,
}

impl SyncDriverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source polling interval. Defaults to 1 second.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Persist the store to this file.
    pub fn state_file(mut self, state_file: StateFile) -> Self {
        self.state_file = Some(state_file);
        self
    }

    /// How often to save the store when it changed. Defaults to 30 seconds.
    pub fn save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = Some(interval);
        self
    }

    pub fn build(self, coordinator: Arc<SyncCoordinator>) -> SyncDriver {
        SyncDriver {
            coordinator,
            interval: self.interval.unwrap_or(Duration::from_secs(1)),
            state_file: self.state_file,
            save_interval: self.save_interval.unwrap_or(Duration::from_secs(30)),
        }
    }
}

/// Handle for stopping a running driver.
#[derive(Debug)]
pub struct DriverHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<DrainStats>,
}

impl DriverHandle {
    /// Stop the driver and wait for its final drain and save.
    pub async fn stop(self) -> DrainStats {
        let _ = self.stop_tx.send(true);
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "sync driver task failed");
                DrainStats::default()
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
