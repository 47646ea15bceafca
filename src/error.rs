//! Error types for the sync cache.

use thiserror::Error;
use widget_sync_types::ServerId;

/// Errors surfaced by the sync cache.
///
/// Stale writes and notifications for removed widgets are deliberately not
/// represented here: both are expected races and are handled as no-ops.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No snapshot has ever been applied for this server.
    #[error("no snapshot for server {0}")]
    NotFound(ServerId),

    /// A snapshot message was missing a required field or carried an invalid one.
    #[error("malformed snapshot: {field} {reason}")]
    Malformed { field: &'static str, reason: String },

    /// Reading or writing persisted state failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state or a message could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    pub(crate) fn missing(field: &'static str) -> Self {
        SyncError::Malformed {
            field,
            reason: "is required".to_string(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SyncError::Malformed {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
