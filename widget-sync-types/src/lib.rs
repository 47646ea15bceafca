//! # widget-sync-types
//!
//! Core types shared by everything that touches widget state: the metric
//! producers that emit [`Snapshot`]s, the widget-sync cache that versions and
//! projects them, and the host renderers that paint [`RenderModel`]s onto
//! home-screen widgets.
//!
//! ## Features
//!
//! - `serde`: JSON/etc. serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use widget_sync_types::{DisplayStyle, ServerStatus, Snapshot};
//!
//! let snapshot = Snapshot::builder("srv-1")
//!     .name("tokyo-edge")
//!     .status(ServerStatus::Running)
//!     .cpu_percent(42)
//!     .mem_percent(58)
//!     .version(1)
//!     .build();
//!
//! assert!(snapshot.status.is_running());
//! assert_eq!(DisplayStyle::default(), DisplayStyle::List);
//! ```

mod ids;
mod render;
mod snapshot;
mod style;

pub use ids::*;
pub use render::*;
pub use snapshot::*;
pub use style::*;
