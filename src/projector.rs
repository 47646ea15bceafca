//! Projection of snapshots into render models.
//!
//! Projection is pure: the same snapshot and style always give the same
//! model, and nothing outside the arguments is read.

use widget_sync_types::{DisplayStyle, RenderModel, ServerId, Snapshot, StatusColor};

/// Upper bound of the usage progress bars.
pub const PROGRESS_MAX: u8 = 100;

/// Turns snapshots into render models.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewProjector;

impl ViewProjector {
    pub fn new() -> Self {
        Self
    }

    /// Project a snapshot for the given display style.
    ///
    /// # Example
    ///
    /// ```
    /// use widget_sync::ViewProjector;
    /// use widget_sync_types::{DisplayStyle, ServerStatus, Snapshot};
    ///
    /// let snapshot = Snapshot::builder("s1")
    ///     .status(ServerStatus::Running)
    ///     .cpu_percent(42)
    ///     .mem_percent(140)
    ///     .version(1)
    ///     .build();
    ///
    /// let model = ViewProjector.project(&snapshot, DisplayStyle::List);
    /// assert_eq!(model.cpu, "42%");
    /// assert_eq!(model.mem, "100%");
    /// assert_eq!(model.status_color.token(), "running");
    /// ```
    pub fn project(&self, snapshot: &Snapshot, style: DisplayStyle) -> RenderModel {
        let cpu = clamp_percent(snapshot.cpu_percent);
        let mem = clamp_percent(snapshot.mem_percent);

        RenderModel {
            server_id: snapshot.server_id.clone(),
            style,
            layout: style.layout().to_string(),
            name: snapshot.name.clone(),
            status: snapshot.status_label().to_string(),
            status_color: StatusColor::from(snapshot.status),
            ip: snapshot.ip.clone(),
            region: snapshot.region.clone(),
            cpu: format_percent(cpu),
            mem: format_percent(mem),
            cpu_progress: cpu,
            mem_progress: mem,
            progress_max: PROGRESS_MAX,
            specs: snapshot.specs.clone(),
            expiry: snapshot.expiry.clone(),
            version: snapshot.version,
        }
    }

    /// Project a snapshot, or the placeholder defaults when there is none.
    pub fn project_or_default(
        &self,
        snapshot: Option<&Snapshot>,
        server_id: &ServerId,
        style: DisplayStyle,
    ) -> RenderModel {
        match snapshot {
            Some(snapshot) => self.project(snapshot, style),
            None => self.project(&Snapshot::placeholder(server_id.clone()), style),
        }
    }
}

/// Clamp a reported usage value into the progress range.
pub fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, PROGRESS_MAX as i64) as u8
}

fn format_percent(value: u8) -> String {
    format!("{}%", value)
}
