//! Identifiers for widgets and the servers they display.

use std::fmt;

/// Identifier of one live widget instance, as assigned by the host shell.
///
/// Unique among live widgets. The host may reuse an id only after the
/// previous widget with that id has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct WidgetId(pub i32);

impl WidgetId {
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for WidgetId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a backend server resource.
///
/// Many widgets may be bound to the same server.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ServerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ServerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_id_display_matches_input() {
        let id = ServerId::from("srv-42");
        assert_eq!(id.to_string(), "srv-42");
        assert_eq!(id.as_str(), "srv-42");
        assert!(!id.is_empty());
        assert!(ServerId::new("").is_empty());
    }

    #[test]
    fn widget_ids_order_by_value() {
        let mut ids = vec![WidgetId(9), WidgetId(-1), WidgetId(3)];
        ids.sort();
        assert_eq!(ids, vec![WidgetId(-1), WidgetId(3), WidgetId(9)]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&WidgetId(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&ServerId::from("s1")).unwrap(), "\"s1\"");
    }
}
