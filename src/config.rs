//! Layered settings: built-in defaults, an optional TOML file, then
//! `WIDGET_SYNC_*` environment variables.
//!
//! ```toml
//! refresh_secs = 1
//! history_depth = 16
//! state_file = "widget-state.json"
//! save_interval_secs = 30
//! channel_capacity = 64
//! log_level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::store::DEFAULT_HISTORY_DEPTH;

/// Environment variable prefix, e.g. `WIDGET_SYNC_REFRESH_SECS=5`.
pub const ENV_PREFIX: &str = "WIDGET_SYNC";

/// Runtime settings for the sync service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Source polling interval in seconds.
    pub refresh_secs: u64,
    /// Applied versions remembered per server.
    pub history_depth: usize,
    /// Where the store is persisted. No persistence when unset.
    pub state_file: Option<PathBuf>,
    /// How often a changed store is saved, in seconds.
    pub save_interval_secs: u64,
    /// Buffer size of in-process channels.
    pub channel_capacity: usize,
    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_secs: 1,
            history_depth: DEFAULT_HISTORY_DEPTH,
            state_file: None,
            save_interval_secs: 30,
            channel_capacity: 64,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings, layering the optional file and the environment over
    /// the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("failed to read settings")?;

        config
            .try_deserialize()
            .context("invalid settings")
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs.max(1))
    }
}
