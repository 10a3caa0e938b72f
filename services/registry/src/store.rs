//! The authoritative key → value-meta map. Owned exclusively by the event
//! loop task — no internal locking.

use mesh_core::ValueMeta;
use std::collections::HashMap;

pub struct Store {
    values: HashMap<String, ValueMeta>,
    dirty: bool,
}

impl Store {
    pub fn new() -> Self {
        Store { values: HashMap::new(), dirty: false }
    }

    pub fn set(&mut self, meta: ValueMeta) {
        self.values.insert(meta.key.clone(), meta);
        self.dirty = true;
    }

    pub fn get(&self, key: &str) -> Option<&ValueMeta> {
        self.values.get(key)
    }

    /// Remove `key`, returning its prior value if present.
    pub fn delete(&mut self, key: &str) -> Option<ValueMeta> {
        let prev = self.values.remove(key);
        if prev.is_some() {
            self.dirty = true;
        }
        prev
    }

    /// Iterate all entries in undefined order; `f` returns `false` to stop.
    pub fn visit(&self, mut f: impl FnMut(&ValueMeta) -> bool) {
        for meta in self.values.values() {
            if !f(meta) {
                break;
            }
        }
    }

    /// Collect the keys of every entry whose key starts with `prefix`.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.values.keys().filter(|k| k.starts_with(prefix)).cloned().collect()
    }

    /// Collect the keys of every entry for which `predicate` holds.
    pub fn keys_matching(&self, mut predicate: impl FnMut(&ValueMeta) -> bool) -> Vec<String> {
        self.values
            .values()
            .filter(|meta| predicate(meta))
            .map(|meta| meta.key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Entries sorted ascending by key, for snapshotting.
    pub fn sorted_values(&self) -> Vec<&ValueMeta> {
        let mut entries: Vec<&ValueMeta> = self.values.values().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Replace the entire map wholesale (used when loading a snapshot at
    /// startup).
    pub fn replace_all(&mut self, entries: Vec<ValueMeta>) {
        self.values = entries.into_iter().map(|v| (v.key.clone(), v)).collect();
        self.dirty = false;
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
