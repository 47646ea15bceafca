//! Inbound messages and boundary validation.
//!
//! Producers send loosely typed JSON. Everything is checked here, so the
//! store and coordinator only ever see well-formed [`Snapshot`]s.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use widget_sync_types::{DisplayStyle, ServerId, ServerStatus, Snapshot, WidgetId};

use crate::error::{Result, SyncError};

/// A metric snapshot as received from a producer.
///
/// Every field is optional and untyped on the wire, so any JSON object
/// decodes; [`validate`](Self::validate) decides what is required and
/// reports type mismatches per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotMessage {
    /// String or integer id.
    pub server_id: Option<Value>,
    pub name: Option<Value>,
    pub status: Option<Value>,
    pub ip: Option<Value>,
    pub region: Option<Value>,
    pub cpu_percent: Option<Value>,
    pub mem_percent: Option<Value>,
    pub specs: Option<Value>,
    pub expiry: Option<Value>,
    pub version: Option<Value>,
}

impl SnapshotMessage {
    /// Check required fields and convert into a typed snapshot.
    ///
    /// `server_id`, `name`, `status` and `version` are required. Optional
    /// text fields default to empty and usage fields to 0.
    pub fn validate(self) -> Result<Snapshot> {
        let server_id = parse_server_id(self.server_id)?;
        let name = required_text("name", self.name)?;
        let status = required_text("status", self.status)?;
        let status_text = status.trim().to_string();
        let version = parse_version(self.version)?;

        Ok(Snapshot {
            server_id,
            name,
            status: ServerStatus::parse(&status),
            status_text,
            ip: optional_text("ip", self.ip)?,
            region: optional_text("region", self.region)?,
            cpu_percent: parse_percent("cpu_percent", self.cpu_percent)?,
            mem_percent: parse_percent("mem_percent", self.mem_percent)?,
            specs: optional_text("specs", self.specs)?,
            expiry: optional_text("expiry", self.expiry)?,
            version,
        })
    }

    /// Build the wire form of a snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            server_id: Some(Value::from(snapshot.server_id.as_str())),
            name: Some(Value::from(snapshot.name.as_str())),
            status: Some(Value::from(snapshot.status_label())),
            ip: Some(Value::from(snapshot.ip.as_str())),
            region: Some(Value::from(snapshot.region.as_str())),
            cpu_percent: Some(Value::from(snapshot.cpu_percent)),
            mem_percent: Some(Value::from(snapshot.mem_percent)),
            specs: Some(Value::from(snapshot.specs.as_str())),
            expiry: Some(Value::from(snapshot.expiry.as_str())),
            version: Some(Value::from(snapshot.version)),
        }
    }
}

impl TryFrom<SnapshotMessage> for Snapshot {
    type Error = SyncError;

    fn try_from(message: SnapshotMessage) -> Result<Self> {
        message.validate()
    }
}

fn parse_server_id(raw: Option<Value>) -> Result<ServerId> {
    match raw {
        None | Some(Value::Null) => Err(SyncError::missing("server_id")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(SyncError::invalid("server_id", "must not be empty"))
        }
        Some(Value::String(s)) => Ok(ServerId::new(s)),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(ServerId::new(n.to_string())),
        Some(other) => Err(SyncError::invalid(
            "server_id",
            format!("must be a string or integer, got {}", other),
        )),
    }
}

fn required_text(field: &'static str, raw: Option<Value>) -> Result<String> {
    match raw {
        None | Some(Value::Null) => Err(SyncError::missing(field)),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(SyncError::invalid(field, format!("must be a string, got {}", other))),
    }
}

fn optional_text(field: &'static str, raw: Option<Value>) -> Result<String> {
    match raw {
        None | Some(Value::Null) => Ok(String::new()),
        Some(value) => required_text(field, Some(value)),
    }
}

fn parse_version(raw: Option<Value>) -> Result<u64> {
    match raw {
        None | Some(Value::Null) => Err(SyncError::missing("version")),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            SyncError::invalid("version", format!("must be a non-negative integer, got {}", n))
        }),
        Some(other) => Err(SyncError::invalid(
            "version",
            format!("must be a non-negative integer, got {}", other),
        )),
    }
}

fn parse_percent(field: &'static str, raw: Option<Value>) -> Result<i64> {
    match raw {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_i64() {
                Ok(v)
            } else if n.is_u64() {
                // Larger than i64::MAX, clamps to 100 anyway
                Ok(i64::MAX)
            } else {
                Err(SyncError::invalid(field, format!("must be an integer, got {}", n)))
            }
        }
        Some(other) => Err(SyncError::invalid(
            field,
            format!("must be an integer, got {}", other),
        )),
    }
}

/// Widget lifecycle notifications from the host shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WidgetEvent {
    /// A widget was placed on the home screen.
    Added {
        widget_id: WidgetId,
        server_id: ServerId,
        #[serde(default, deserialize_with = "lenient_style")]
        style: DisplayStyle,
    },
    /// A widget was removed.
    Removed { widget_id: WidgetId },
    /// The user picked another display style.
    StyleChanged {
        widget_id: WidgetId,
        #[serde(deserialize_with = "lenient_style")]
        style: DisplayStyle,
    },
    /// The user picked another server for the widget.
    Rebound {
        widget_id: WidgetId,
        server_id: ServerId,
    },
    /// The widget was tapped.
    Tapped { widget_id: WidgetId },
}

impl WidgetEvent {
    pub fn widget_id(&self) -> WidgetId {
        match self {
            WidgetEvent::Added { widget_id, .. }
            | WidgetEvent::Removed { widget_id }
            | WidgetEvent::StyleChanged { widget_id, .. }
            | WidgetEvent::Rebound { widget_id, .. }
            | WidgetEvent::Tapped { widget_id } => *widget_id,
        }
    }
}

/// Accept any style string; unknown ones fall back to `List`.
fn lenient_style<'de, D>(deserializer: D) -> std::result::Result<DisplayStyle, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(DisplayStyle::parse).unwrap_or_default())
}

/// Anything a source can deliver: a lifecycle event or a metric snapshot.
///
/// Objects with an `event` key are lifecycle events; any other object is a
/// snapshot message, checked later by [`SnapshotMessage::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Inbound {
    Event(WidgetEvent),
    Snapshot(SnapshotMessage),
}

impl Inbound {
    /// Decode one already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        if value.get("event").is_some() {
            Ok(Inbound::Event(serde_json::from_value(value)?))
        } else {
            Ok(Inbound::Snapshot(serde_json::from_value(value)?))
        }
    }
}

impl<'de> Deserialize<'de> for Inbound {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Inbound::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl From<SnapshotMessage> for Inbound {
    fn from(message: SnapshotMessage) -> Self {
        Inbound::Snapshot(message)
    }
}

impl From<WidgetEvent> for Inbound {
    fn from(event: WidgetEvent) -> Self {
        Inbound::Event(event)
    }
}

/// Parse a JSON document holding one inbound message or an array of them.
///
/// Only a document that is not JSON at all fails as a whole. Each array
/// item is decoded on its own, so one bad item never hides its siblings.
pub fn parse_batch(content: &str) -> Result<Vec<Result<Inbound>>> {
    let value: Value = serde_json::from_str(content)?;
    let batch = match value {
        Value::Array(items) => items.into_iter().map(Inbound::from_value).collect(),
        other => vec![Inbound::from_value(other)],
    };
    Ok(batch)
}
