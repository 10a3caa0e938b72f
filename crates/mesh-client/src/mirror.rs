//! Client-side shadow of the server's store: a raw key/value map plus a
//! derived index by service name, kept in sync with every push the
//! connection applies, and a lossy notifier registry that turns those
//! pushes into wake-ups for subscribers.
//!
//! The "notification is a wake-up, not an event" discipline mirrors the
//! registry's own broadcast fan-out (`registry::event_loop::EventLoop::broadcast`),
//! applied here on the receiving end: delivery is a non-blocking send on a
//! bounded channel, and a receiver that misses a signal must re-query the
//! mirror rather than expect redelivery.

use mesh_core::{is_service_key, svc_id_from_service_key, ServiceDescriptor};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

const NOTIFY_CAPACITY: usize = 64;

#[derive(Default)]
struct Maps {
    raw: HashMap<String, Vec<u8>>,
    by_name: HashMap<String, Vec<ServiceDescriptor>>,
}

/// Local shadow of the registry's store. Mutated only from the connection
/// task; read from application tasks through `&self` methods taking only
/// a reader lock.
pub struct Mirror {
    maps: RwLock<Maps>,
    notifiers: RwLock<HashMap<String, broadcast::Sender<()>>>,
}

impl Mirror {
    pub fn new() -> Self {
        Mirror { maps: RwLock::new(Maps::default()), notifiers: RwLock::new(HashMap::new()) }
    }

    /// Subscribe to wake-ups for `mode` (`"add"`, `"remove"`, or any
    /// caller-defined string — the registry is extensible by string, not
    /// a fixed enum). Delivery is lossy: a missed signal is not
    /// redelivered, so a subscriber must re-read the mirror after waking.
    pub fn subscribe(&self, mode: &str) -> broadcast::Receiver<()> {
        let mut notifiers = self.notifiers.write().unwrap();
        notifiers
            .entry(mode.to_owned())
            .or_insert_with(|| broadcast::channel(NOTIFY_CAPACITY).0)
            .subscribe()
    }

    fn notify(&self, mode: &str) {
        let notifiers = self.notifiers.read().unwrap();
        if let Some(tx) = notifiers.get(mode) {
            // Zero subscribers is not an error: a wake-up nobody is
            // listening for is simply dropped.
            let _ = tx.send(());
        }
    }

    /// Apply a `ValueChange` push: overwrite the raw entry and, for
    /// service keys, the per-name index, then fire the `"add"` wake-up.
    pub fn apply_change(&self, key: &str, value: &[u8]) {
        let desc = if is_service_key(key) {
            serde_json::from_slice::<ServiceDescriptor>(value).ok()
        } else {
            None
        };

        {
            let mut maps = self.maps.write().unwrap();
            maps.raw.insert(key.to_owned(), value.to_owned());
            if let Some(desc) = &desc {
                let entries = maps.by_name.entry(desc.name.clone()).or_default();
                entries.retain(|d| d.id != desc.id);
                entries.push(desc.clone());
            }
        }

        if desc.is_some() {
            self.notify("add");
        }
    }

    /// Apply a `ValueDelete` push: remove the raw entry and, for service
    /// keys, the matching index entry, then fire the `"remove"` wake-up.
    pub fn apply_delete(&self, key: &str, svc_name: &str) {
        let svc_id = svc_id_from_service_key(key);

        {
            let mut maps = self.maps.write().unwrap();
            maps.raw.remove(key);
            if let Some(svc_id) = svc_id {
                if let Some(entries) = maps.by_name.get_mut(svc_name) {
                    entries.retain(|d| d.id != svc_id);
                }
            }
        }

        if svc_id.is_some() {
            self.notify("remove");
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.maps.read().unwrap().raw.get(key).cloned()
    }

    /// All descriptors registered under `name`, in arbitrary order.
    pub fn query(&self, name: &str) -> Vec<ServiceDescriptor> {
        self.maps.read().unwrap().by_name.get(name).cloned().unwrap_or_default()
    }

    /// `query`, ordered by `(SvcGroup, SvcIndex)` with `SvcIndex` compared
    /// as a string — matches `mesh_core::query::query_ex` with
    /// `QueryOptions { sort: true }`.
    pub fn query_sorted(&self, name: &str) -> Vec<ServiceDescriptor> {
        let mut results = self.query(name);
        results.sort_by(|a, b| {
            a.get_meta(mesh_core::META_SVC_GROUP)
                .cmp(b.get_meta(mesh_core::META_SVC_GROUP))
                .then_with(|| a.get_meta(mesh_core::META_SVC_INDEX).cmp(b.get_meta(mesh_core::META_SVC_INDEX)))
        });
        results
    }
}

impl Default for Mirror {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc_bytes(name: &str, id: &str, group: &str, index: &str) -> Vec<u8> {
        let mut d = ServiceDescriptor::new(name, id, "10.0.0.1", 7000);
        d.set_meta(mesh_core::META_SVC_GROUP, group);
        d.set_meta("SvcIndex", index);
        serde_json::to_vec(&d).unwrap()
    }

    #[test]
    fn apply_change_indexes_service_keys_by_name() {
        let mirror = Mirror::new();
        mirror.apply_change("_svcdesc_game#1@g1", &desc_bytes("game", "game#1@g1", "g1", "1"));
        assert_eq!(mirror.query("game").len(), 1);
        assert!(mirror.get("_svcdesc_game#1@g1").is_some());
    }

    #[test]
    fn apply_change_on_plain_key_does_not_touch_the_service_index() {
        let mirror = Mirror::new();
        mirror.apply_change("cfg/foo", b"bar");
        assert!(mirror.query("cfg/foo").is_empty());
        assert_eq!(mirror.get("cfg/foo").unwrap(), b"bar");
    }

    #[test]
    fn re_registering_a_service_id_replaces_rather_than_duplicates() {
        let mirror = Mirror::new();
        mirror.apply_change("_svcdesc_game#1@g1", &desc_bytes("game", "game#1@g1", "g1", "1"));
        mirror.apply_change("_svcdesc_game#1@g1", &desc_bytes("game", "game#1@g1", "g2", "1"));
        let results = mirror.query("game");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_meta(mesh_core::META_SVC_GROUP), "g2");
    }

    #[test]
    fn apply_delete_removes_from_both_maps() {
        let mirror = Mirror::new();
        mirror.apply_change("_svcdesc_game#1@g1", &desc_bytes("game", "game#1@g1", "g1", "1"));
        mirror.apply_delete("_svcdesc_game#1@g1", "game");
        assert!(mirror.query("game").is_empty());
        assert!(mirror.get("_svcdesc_game#1@g1").is_none());
    }

    #[test]
    fn query_sorted_orders_by_group_then_index_as_strings() {
        let mirror = Mirror::new();
        mirror.apply_change("_svcdesc_game#10@g1", &desc_bytes("game", "game#10@g1", "g1", "10"));
        mirror.apply_change("_svcdesc_game#2@g1", &desc_bytes("game", "game#2@g1", "g1", "2"));
        let results = mirror.query_sorted("game");
        // "10" < "2" lexicographically, unlike numeric comparison.
        assert_eq!(results[0].get_meta("SvcIndex"), "10");
        assert_eq!(results[1].get_meta("SvcIndex"), "2");
    }

    #[test]
    fn subscribers_are_notified_on_change_and_delete() {
        let mirror = Mirror::new();
        let mut add_rx = mirror.subscribe("add");
        let mut remove_rx = mirror.subscribe("remove");

        mirror.apply_change("_svcdesc_game#1@g1", &desc_bytes("game", "game#1@g1", "g1", "1"));
        assert!(add_rx.try_recv().is_ok());
        assert!(remove_rx.try_recv().is_err());

        mirror.apply_delete("_svcdesc_game#1@g1", "game");
        assert!(remove_rx.try_recv().is_ok());
    }
}
