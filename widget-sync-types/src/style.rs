//! Widget display styles.

/// Layout a widget is drawn with. One per widget, defaults to `List`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DisplayStyle {
    #[default]
    List,
    Dashboard,
}

impl DisplayStyle {
    /// Parse a stored style key. Anything other than "dashboard" is `List`.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("dashboard") {
            DisplayStyle::Dashboard
        } else {
            DisplayStyle::List
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayStyle::List => "list",
            DisplayStyle::Dashboard => "dashboard",
        }
    }

    /// Layout token the host maps to its own layout resource.
    pub fn layout(&self) -> &'static str {
        match self {
            DisplayStyle::List => "server_widget",
            DisplayStyle::Dashboard => "server_widget_dashboard",
        }
    }
}

impl From<&str> for DisplayStyle {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
