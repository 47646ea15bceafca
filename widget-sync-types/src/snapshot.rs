//! Snapshot - a versioned point-in-time record of one server's metrics.

use crate::ServerId;

/// Name shown for a widget whose server has never been synced.
pub const DEFAULT_NAME: &str = "请选择服务器";

/// IP line shown for a widget whose server has never been synced.
pub const DEFAULT_IP: &str = "请在设置中选择";

/// Run state of a server as reported by the metric producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ServerStatus {
    Running,
    Stopped,
    #[default]
    Unknown,
}

impl ServerStatus {
    /// Parse a producer status string.
    ///
    /// Accepts the English variant names (either case) and the localized
    /// labels the panel API reports. Anything else is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Running" | "running" | "RUNNING" | "运行中" => ServerStatus::Running,
            "Stopped" | "stopped" | "STOPPED" | "已停止" => ServerStatus::Stopped,
            _ => ServerStatus::Unknown,
        }
    }

    /// Localized label displayed on the widget.
    pub fn label(&self) -> &'static str {
        match self {
            ServerStatus::Running => "运行中",
            ServerStatus::Stopped => "已停止",
            ServerStatus::Unknown => "未知",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ServerStatus::Running)
    }
}

impl From<&str> for ServerStatus {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// A versioned snapshot of one server's metrics.
///
/// Versions strictly increase per server. Consumers keep the snapshot with
/// the highest version and discard anything at or below it.
///
/// # Example
///
/// ```rust
/// use widget_sync_types::{ServerStatus, Snapshot};
///
/// let snapshot = Snapshot::builder("srv-1")
///     .name("hk-1")
///     .status(ServerStatus::Stopped)
///     .ip("10.0.0.8")
///     .version(3)
///     .build();
///
/// assert_eq!(snapshot.server_id.as_str(), "srv-1");
/// assert_eq!(snapshot.version, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    pub server_id: ServerId,
    pub name: String,
    pub status: ServerStatus,
    /// Status text as the producer reported it, shown on the widget.
    /// Empty falls back to the label of `status`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub status_text: String,
    pub ip: String,
    pub region: String,
    /// CPU usage as reported. Not clamped; projection clamps to 0..=100.
    pub cpu_percent: i64,
    /// Memory usage as reported. Not clamped; projection clamps to 0..=100.
    pub mem_percent: i64,
    /// Free-form hardware description, e.g. "2C4G 60GB".
    pub specs: String,
    /// Expiry date as preformatted by the producer.
    pub expiry: String,
    /// Monotonic per-server version counter.
    pub version: u64,
}

impl Snapshot {
    /// Create a builder for a snapshot of the given server.
    pub fn builder(server_id: impl Into<ServerId>) -> SnapshotBuilder {
        SnapshotBuilder::new(server_id)
    }

    /// The placeholder shown for a server that has never been synced.
    ///
    /// Version 0, so any real snapshot supersedes it.
    pub fn placeholder(server_id: impl Into<ServerId>) -> Self {
        Self {
            server_id: server_id.into(),
            name: DEFAULT_NAME.to_string(),
            status: ServerStatus::Unknown,
            status_text: ServerStatus::Unknown.label().to_string(),
            ip: DEFAULT_IP.to_string(),
            region: String::new(),
            cpu_percent: 0,
            mem_percent: 0,
            specs: String::new(),
            expiry: String::new(),
            version: 0,
        }
    }

    /// Text displayed for the status.
    pub fn status_label(&self) -> &str {
        if self.status_text.is_empty() {
            self.status.label()
        } else {
            &self.status_text
        }
    }

    /// Returns true if this snapshot should replace `current`.
    pub fn supersedes(&self, current: &Snapshot) -> bool {
        self.version > current.version
    }
}

/// Builder for constructing `Snapshot` instances.
///
/// Unset fields take the placeholder defaults.
#[derive(Debug)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn new(server_id: impl Into<ServerId>) -> Self {
        Self {
            snapshot: Snapshot::placeholder(server_id),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.snapshot.name = name.into();
        self
    }

    pub fn status(mut self, status: ServerStatus) -> Self {
        self.snapshot.status = status;
        self.snapshot.status_text = status.label().to_string();
        self
    }

    /// Set the status from producer text, keeping the text for display.
    pub fn status_text(mut self, raw: &str) -> Self {
        self.snapshot.status = ServerStatus::parse(raw);
        self.snapshot.status_text = raw.trim().to_string();
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.snapshot.ip = ip.into();
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.snapshot.region = region.into();
        self
    }

    pub fn cpu_percent(mut self, cpu: i64) -> Self {
        self.snapshot.cpu_percent = cpu;
        self
    }

    pub fn mem_percent(mut self, mem: i64) -> Self {
        self.snapshot.mem_percent = mem;
        self
    }

    pub fn specs(mut self, specs: impl Into<String>) -> Self {
        self.snapshot.specs = specs.into();
        self
    }

    pub fn expiry(mut self, expiry: impl Into<String>) -> Self {
        self.snapshot.expiry = expiry.into();
        self
    }

    pub fn version(mut self, version: u64) -> Self {
        self.snapshot.version = version;
        self
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(ServerStatus::parse("Running"), ServerStatus::Running);
        assert_eq!(ServerStatus::parse("运行中"), ServerStatus::Running);
        assert_eq!(ServerStatus::parse("stopped"), ServerStatus::Stopped);
        assert_eq!(ServerStatus::parse("已停止"), ServerStatus::Stopped);
        assert_eq!(ServerStatus::parse("Rebooting"), ServerStatus::Unknown);
        assert_eq!(ServerStatus::parse(""), ServerStatus::Unknown);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ServerStatus::Running.label(), "运行中");
        assert_eq!(ServerStatus::Stopped.label(), "已停止");
        assert_eq!(ServerStatus::Unknown.label(), "未知");
    }

    #[test]
    fn test_placeholder_defaults() {
        let snapshot = Snapshot::placeholder("never-synced");
        assert_eq!(snapshot.name, DEFAULT_NAME);
        assert_eq!(snapshot.ip, DEFAULT_IP);
        assert_eq!(snapshot.status, ServerStatus::Unknown);
        assert_eq!(snapshot.region, "");
        assert_eq!(snapshot.specs, "");
        assert_eq!(snapshot.expiry, "");
        assert_eq!(snapshot.cpu_percent, 0);
        assert_eq!(snapshot.mem_percent, 0);
        assert_eq!(snapshot.version, 0);
    }

    #[test]
    fn test_builder_overrides_defaults() {
        let snapshot = Snapshot::builder("s1")
            .name("edge")
            .status(ServerStatus::Running)
            .region("hk")
            .cpu_percent(140)
            .version(9)
            .build();

        assert_eq!(snapshot.name, "edge");
        assert_eq!(snapshot.region, "hk");
        // Stored as reported, clamping happens at projection
        assert_eq!(snapshot.cpu_percent, 140);
        assert_eq!(snapshot.ip, DEFAULT_IP);
    }

    #[test]
    fn test_status_text_is_kept() {
        let snapshot = Snapshot::builder("s1").status_text(" 重启中 ").build();
        assert_eq!(snapshot.status, ServerStatus::Unknown);
        assert_eq!(snapshot.status_label(), "重启中");

        let running = Snapshot::builder("s1").status_text("Running").build();
        assert_eq!(running.status, ServerStatus::Running);
        assert_eq!(running.status_label(), "Running");

        let blank = Snapshot::builder("s1").status_text("").build();
        assert_eq!(blank.status_label(), "未知");
    }

    #[test]
    fn test_supersedes_is_strict() {
        let v1 = Snapshot::builder("s1").version(1).build();
        let v2 = Snapshot::builder("s1").version(2).build();
        assert!(v2.supersedes(&v1));
        assert!(!v1.supersedes(&v2));
        assert!(!v1.supersedes(&v1.clone()));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let snapshot = Snapshot::builder("s1")
            .name("edge")
            .status(ServerStatus::Stopped)
            .version(4)
            .build();

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"status\":\"stopped\""));
        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, parsed);
    }
}
