//! Live widget bookkeeping.
//!
//! Tracks which widgets exist, which server each one shows and in which
//! style, plus the one-shot navigation request raised by a widget tap.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info};
use widget_sync_types::{DisplayStyle, NavigationRequest, ServerId, WidgetId};

/// What a live widget is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub server_id: ServerId,
    pub style: DisplayStyle,
    /// Registration order, kept across re-registration.
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    bindings: HashMap<WidgetId, Binding>,
    next_seq: u64,
    pending_navigation: Option<WidgetId>,
}

/// Registry of live widgets.
///
/// All mutations are serialized by one lock, independent of snapshot writes.
/// A fan-out iterates over a copy of the bindings taken when it started, so
/// a concurrent register or unregister shows up in the next round.
#[derive(Debug, Default)]
pub struct WidgetRegistry {
    inner: RwLock<Inner>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a widget to a server and style, replacing any previous binding.
    ///
    /// Returns `true` if the widget was not registered before. A widget that
    /// is registered again keeps its original position in iteration order.
    pub fn register(&self, widget_id: WidgetId, server_id: ServerId, style: DisplayStyle) -> bool {
        let mut inner = self.inner.write();
        let was_empty = inner.bindings.is_empty();

        if let Some(binding) = inner.bindings.get_mut(&widget_id) {
            binding.server_id = server_id;
            binding.style = style;
            return false;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.bindings.insert(widget_id, Binding { server_id, style, seq });

        if was_empty {
            info!(widget = %widget_id, "first widget registered");
        }
        true
    }

    /// Remove a widget's binding. Returns `false` if it was not registered.
    pub fn unregister(&self, widget_id: WidgetId) -> bool {
        let mut inner = self.inner.write();
        if inner.bindings.remove(&widget_id).is_none() {
            return false;
        }

        if inner.pending_navigation == Some(widget_id) {
            inner.pending_navigation = None;
        }
        if inner.bindings.is_empty() {
            info!(widget = %widget_id, "last widget removed");
        }
        true
    }

    /// Change the style of a registered widget.
    pub fn set_style(&self, widget_id: WidgetId, style: DisplayStyle) -> bool {
        match self.inner.write().bindings.get_mut(&widget_id) {
            Some(binding) => {
                binding.style = style;
                true
            }
            None => false,
        }
    }

    /// Point a registered widget at a different server, keeping its style.
    pub fn rebind(&self, widget_id: WidgetId, server_id: ServerId) -> bool {
        match self.inner.write().bindings.get_mut(&widget_id) {
            Some(binding) => {
                binding.server_id = server_id;
                true
            }
            None => false,
        }
    }

    pub fn binding(&self, widget_id: WidgetId) -> Option<Binding> {
        self.inner.read().bindings.get(&widget_id).cloned()
    }

    pub fn contains(&self, widget_id: WidgetId) -> bool {
        self.inner.read().bindings.contains_key(&widget_id)
    }

    /// Widgets bound to a server, in registration order.
    ///
    /// The returned iterator works on a copy; call again to restart.
    pub fn widgets_for(&self, server_id: &ServerId) -> WidgetsFor {
        let inner = self.inner.read();
        let mut matching: Vec<(u64, WidgetId)> = inner
            .bindings
            .iter()
            .filter(|(_, b)| &b.server_id == server_id)
            .map(|(id, b)| (b.seq, *id))
            .collect();
        matching.sort_unstable();

        WidgetsFor {
            ids: matching.into_iter().map(|(_, id)| id).collect::<Vec<_>>().into_iter(),
        }
    }

    /// All live widgets with their bindings, in registration order.
    pub fn entries(&self) -> Vec<(WidgetId, Binding)> {
        let inner = self.inner.read();
        let mut entries: Vec<_> = inner.bindings.iter().map(|(id, b)| (*id, b.clone())).collect();
        entries.sort_by_key(|(_, b)| b.seq);
        entries
    }

    pub fn widget_ids(&self) -> Vec<WidgetId> {
        self.entries().into_iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().bindings.is_empty()
    }

    /// Record that a widget asked to open its settings page.
    ///
    /// The slot holds one request; a newer tap replaces an unread one.
    /// Taps from widgets that are not registered are dropped.
    pub fn request_navigation(&self, widget_id: WidgetId) -> bool {
        let mut inner = self.inner.write();
        if !inner.bindings.contains_key(&widget_id) {
            debug!(widget = %widget_id, "dropped navigation request from unknown widget");
            return false;
        }
        inner.pending_navigation = Some(widget_id);
        true
    }

    /// Take the pending navigation request, clearing the slot.
    pub fn take_navigation(&self) -> Option<NavigationRequest> {
        self.inner
            .write()
            .pending_navigation
            .take()
            .map(|widget_id| NavigationRequest { widget_id })
    }
}

/// Iterator over the widgets bound to one server.
#[derive(Debug, Clone)]
pub struct WidgetsFor {
    ids: std::vec::IntoIter<WidgetId>,
}

impl Iterator for WidgetsFor {
    type Item = WidgetId;

    fn next(&mut self) -> Option<WidgetId> {
        self.ids.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for WidgetsFor {}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(id: i32) -> WidgetId {
        WidgetId(id)
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = WidgetRegistry::new();
        assert!(registry.register(w(7), "s1".into(), DisplayStyle::List));

        let binding = registry.binding(w(7)).unwrap();
        assert_eq!(binding.server_id.as_str(), "s1");
        assert_eq!(binding.style, DisplayStyle::List);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_is_an_upsert() {
        let registry = WidgetRegistry::new();
        registry.register(w(1), "s1".into(), DisplayStyle::List);
        registry.register(w(2), "s1".into(), DisplayStyle::List);

        assert!(!registry.register(w(1), "s1".into(), DisplayStyle::Dashboard));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.binding(w(1)).unwrap().style, DisplayStyle::Dashboard);

        // Re-registration keeps the original position
        assert_eq!(registry.widgets_for(&"s1".into()).collect::<Vec<_>>(), vec![w(1), w(2)]);
    }

    #[test]
    fn widgets_for_is_in_registration_order() {
        let registry = WidgetRegistry::new();
        for id in [30, 10, 20] {
            registry.register(w(id), "s1".into(), DisplayStyle::List);
        }
        registry.register(w(99), "other".into(), DisplayStyle::List);

        let ids: Vec<_> = registry.widgets_for(&"s1".into()).collect();
        assert_eq!(ids, vec![w(30), w(10), w(20)]);
    }

    #[test]
    fn widgets_for_is_restartable() {
        let registry = WidgetRegistry::new();
        registry.register(w(1), "s1".into(), DisplayStyle::List);
        registry.register(w(2), "s1".into(), DisplayStyle::List);

        let iter = registry.widgets_for(&"s1".into());
        assert_eq!(iter.len(), 2);
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
        assert_eq!(registry.widgets_for(&"s1".into()).collect::<Vec<_>>(), first);
    }

    #[test]
    fn unregister_excludes_widget() {
        let registry = WidgetRegistry::new();
        registry.register(w(7), "s1".into(), DisplayStyle::List);
        registry.register(w(8), "s1".into(), DisplayStyle::List);

        assert!(registry.unregister(w(7)));
        assert!(!registry.unregister(w(7)));

        let ids: Vec<_> = registry.widgets_for(&"s1".into()).collect();
        assert_eq!(ids, vec![w(8)]);
        assert!(!registry.contains(w(7)));
    }

    #[test]
    fn rebind_and_set_style() {
        let registry = WidgetRegistry::new();
        registry.register(w(1), "s1".into(), DisplayStyle::Dashboard);

        assert!(registry.rebind(w(1), "s2".into()));
        assert!(registry.set_style(w(1), DisplayStyle::List));
        assert!(!registry.rebind(w(5), "s2".into()));
        assert!(!registry.set_style(w(5), DisplayStyle::List));

        let binding = registry.binding(w(1)).unwrap();
        assert_eq!(binding.server_id.as_str(), "s2");
        assert_eq!(binding.style, DisplayStyle::List);
        assert_eq!(registry.widgets_for(&"s1".into()).count(), 0);
    }

    #[test]
    fn navigation_request_is_taken_once() {
        let registry = WidgetRegistry::new();
        registry.register(w(4), "s1".into(), DisplayStyle::List);

        assert!(registry.take_navigation().is_none());
        assert!(registry.request_navigation(w(4)));
        assert_eq!(registry.take_navigation(), Some(NavigationRequest { widget_id: w(4) }));
        assert!(registry.take_navigation().is_none());
    }

    #[test]
    fn latest_tap_wins() {
        let registry = WidgetRegistry::new();
        registry.register(w(1), "s1".into(), DisplayStyle::List);
        registry.register(w(2), "s1".into(), DisplayStyle::List);

        registry.request_navigation(w(1));
        registry.request_navigation(w(2));
        assert_eq!(registry.take_navigation().unwrap().widget_id, w(2));
        assert!(registry.take_navigation().is_none());
    }

    #[test]
    fn navigation_from_unknown_widget_is_dropped() {
        let registry = WidgetRegistry::new();
        assert!(!registry.request_navigation(w(3)));
        assert!(registry.take_navigation().is_none());
    }

    #[test]
    fn unregister_clears_its_pending_navigation() {
        let registry = WidgetRegistry::new();
        registry.register(w(1), "s1".into(), DisplayStyle::List);
        registry.request_navigation(w(1));
        registry.unregister(w(1));
        assert!(registry.take_navigation().is_none());
    }
}
