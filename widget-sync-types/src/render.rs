//! Render models handed to the host's widget surface.

use crate::{DisplayStyle, ServerId, ServerStatus, WidgetId};

/// Color class for the status badge.
///
/// The host maps each token to its own drawable. The mapping from status is
/// a closed three-way split: anything that is not running or stopped is
/// `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum StatusColor {
    Running,
    Stopped,
    Unknown,
}

impl StatusColor {
    pub fn token(&self) -> &'static str {
        match self {
            StatusColor::Running => "running",
            StatusColor::Stopped => "stopped",
            StatusColor::Unknown => "unknown",
        }
    }
}

impl From<ServerStatus> for StatusColor {
    fn from(status: ServerStatus) -> Self {
        match status {
            ServerStatus::Running => StatusColor::Running,
            ServerStatus::Stopped => StatusColor::Stopped,
            ServerStatus::Unknown => StatusColor::Unknown,
        }
    }
}

/// Fully formatted, immutable view of one server for one display style.
///
/// Every string is ready to paint as-is; the renderer performs no logic.
/// A new model supersedes the old one on the next projection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderModel {
    pub server_id: ServerId,
    pub style: DisplayStyle,
    /// Layout token, see [`DisplayStyle::layout`].
    pub layout: String,
    pub name: String,
    /// Localized status label.
    pub status: String,
    pub status_color: StatusColor,
    pub ip: String,
    pub region: String,
    /// CPU usage text, e.g. "42%".
    pub cpu: String,
    /// Memory usage text, e.g. "58%".
    pub mem: String,
    pub cpu_progress: u8,
    pub mem_progress: u8,
    pub progress_max: u8,
    pub specs: String,
    pub expiry: String,
    /// Version of the snapshot this model was projected from (0 for defaults).
    pub version: u64,
}

/// What a tap on the widget should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TapAction {
    /// Open the app on the widget settings page for this widget.
    OpenSettings,
}

/// A render model addressed to one widget.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderFrame {
    pub widget_id: WidgetId,
    pub model: RenderModel,
    pub tap_action: TapAction,
}

impl RenderFrame {
    pub fn new(widget_id: WidgetId, model: RenderModel) -> Self {
        Self {
            widget_id,
            model,
            tap_action: TapAction::OpenSettings,
        }
    }
}

/// A pending "navigate to widget settings" request raised by a tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NavigationRequest {
    pub widget_id: WidgetId,
}
