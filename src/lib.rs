//! # widget-sync
//!
//! A local synchronization cache for home-screen server widgets.
//!
//! Metric producers push versioned server snapshots; the cache keeps the
//! newest snapshot per server, and every widget bound to that server gets a
//! freshly projected, fully formatted render model. Widgets never see a
//! mixture of two snapshots, and late or duplicated snapshots are ignored.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                                                                  │
//! │  source ──▶ coordinator ──▶ store (versioned put)                │
//! │ (input)        │                                                 │
//! │                ├──▶ registry (widgets bound to the server)       │
//! │                │                                                 │
//! │                └──▶ projector ──▶ sink ──▶ host widget surface   │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`store`]**: [`SnapshotStore`], per-server slots with stale-write rejection
//! - **[`projector`]**: [`ViewProjector`], pure snapshot → [`RenderModel`] projection
//! - **[`registry`]**: [`WidgetRegistry`], live widget bindings and the pending
//!   settings-navigation request
//! - **[`coordinator`]**: [`SyncCoordinator`], apply + fan-out
//! - **[`source`]**: [`MessageSource`] trait with file, stream and channel inputs
//! - **[`sink`]**: [`RenderSink`] trait, where finished frames go
//! - **[`persist`]**: JSON state file so restarts keep last known values
//! - **[`driver`]**: tokio task pumping a source into the coordinator
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use widget_sync::{ChannelSink, SnapshotMessage, SyncCoordinator};
//! use widget_sync_types::{DisplayStyle, WidgetId};
//!
//! let (sink, mut frames) = ChannelSink::create(16);
//! let coordinator = SyncCoordinator::new(Arc::new(sink));
//! coordinator
//!     .registry()
//!     .register(WidgetId(7), "s1".into(), DisplayStyle::List);
//!
//! let message: SnapshotMessage = serde_json::from_str(
//!     r#"{"server_id": "s1", "name": "edge", "status": "Running",
//!         "cpu_percent": 42, "mem_percent": 58, "version": 1}"#,
//! ).unwrap();
//! coordinator.apply(message).unwrap();
//!
//! let frame = frames.try_recv().unwrap();
//! assert_eq!(frame.widget_id, WidgetId(7));
//! assert_eq!(frame.model.cpu, "42%");
//! assert_eq!(frame.model.status_color.token(), "running");
//! ```
//!
//! ### Driving from a TCP producer
//!
//! ```no_run
//! use std::sync::Arc;
//! use widget_sync::{JsonLinesSink, StreamSource, SyncCoordinator, SyncDriver};
//!
//! # tokio_test::block_on(async {
//! let stream = tokio::net::TcpStream::connect("127.0.0.1:9400").await.unwrap();
//! let coordinator = Arc::new(SyncCoordinator::new(Arc::new(JsonLinesSink::new(std::io::stdout()))));
//! let handle = SyncDriver::builder()
//!     .build(coordinator)
//!     .start(Box::new(StreamSource::spawn(stream, "127.0.0.1:9400")));
//! # handle.stop().await;
//! # });
//! ```

pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod message;
pub mod persist;
pub mod projector;
pub mod registry;
pub mod sink;
pub mod source;
pub mod store;

pub use config::Settings;
pub use coordinator::{ApplyOutcome, SyncCoordinator, SyncPhase};
pub use driver::{drain, DrainStats, DriverHandle, SyncDriver, SyncDriverBuilder};
pub use error::{Result, SyncError};
pub use message::{parse_batch, Inbound, SnapshotMessage, WidgetEvent};
pub use persist::StateFile;
pub use projector::ViewProjector;
pub use registry::{Binding, WidgetRegistry, WidgetsFor};
pub use sink::{ChannelSink, JsonLinesSink, RenderSink};
pub use source::{ChannelSource, FileSource, MessageSource, StreamSource};
pub use store::SnapshotStore;

// Re-export the shared types for convenience
pub use widget_sync_types::{
    DisplayStyle, NavigationRequest, RenderFrame, RenderModel, ServerId, ServerStatus, Snapshot,
    StatusColor, TapAction, WidgetId,
};
