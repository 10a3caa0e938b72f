//! Service descriptor and stored-value metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity and locator for one service instance.
///
/// `ID` follows the grammar `name#index@group` (see [`crate::svcid`]).
/// Equality is field-wise, including tag order (a reordered tag list is a
/// different descriptor) and full meta-map contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub id: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        ServiceDescriptor {
            name: name.into(),
            id: id.into(),
            host: host.into(),
            port,
            tags: Vec::new(),
            meta: BTreeMap::new(),
        }
    }

    /// `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn contains_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn get_meta(&self, key: &str) -> &str {
        self.meta.get(key).map(String::as_str).unwrap_or("")
    }

    /// Parses the meta value as an integer, returning 0 if absent or
    /// unparseable (matching the original's `strconv.ParseInt`-or-zero
    /// convenience).
    pub fn get_meta_as_int(&self, key: &str) -> i64 {
        self.meta.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    /// A stable, human-readable rendering with meta entries sorted by key
    /// (the map is already a `BTreeMap`, so iteration order is the sort
    /// order) — used for diagnostics, not parsed by anything.
    pub fn format_string(&self) -> String {
        let mut meta_str = String::new();
        for (k, v) in &self.meta {
            meta_str.push_str(&format!(" {}={}", k, v));
        }
        format!(
            "{:>25} host: {:>15} port: {:>5}{}",
            self.name,
            self.host,
            self.port,
            meta_str
        )
    }
}

/// A stored entry in the registry.
///
/// `svc_name` is non-empty iff `key` carries the reserved service prefix
/// (see [`crate::is_service_key`]); `token` is the owning session's token,
/// empty for persistent/tool-written entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMeta {
    pub key: String,
    pub value: Vec<u8>,
    #[serde(default)]
    pub svc_name: String,
    #[serde(default)]
    pub token: String,
}

impl ValueMeta {
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        ValueMeta {
            key: key.into(),
            value,
            svc_name: String::new(),
            token: String::new(),
        }
    }

    /// Decode the value as a `ServiceDescriptor`. Returns `None` on
    /// malformed JSON rather than the original's poisoned sentinel value,
    /// since Rust callers can express absence directly.
    pub fn value_as_service_desc(&self) -> Option<ServiceDescriptor> {
        serde_json::from_slice(&self.value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_joins_host_and_port() {
        let sd = ServiceDescriptor::new("game", "game#1@g1", "10.0.0.1", 7000);
        assert_eq!(sd.address(), "10.0.0.1:7000");
    }

    #[test]
    fn get_meta_as_int_returns_zero_when_absent_or_unparseable() {
        let mut sd = ServiceDescriptor::new("game", "game#1@g1", "10.0.0.1", 7000);
        assert_eq!(sd.get_meta_as_int("SvcIndex"), 0);
        sd.set_meta("SvcIndex", "not-a-number");
        assert_eq!(sd.get_meta_as_int("SvcIndex"), 0);
        sd.set_meta("SvcIndex", "42");
        assert_eq!(sd.get_meta_as_int("SvcIndex"), 42);
    }

    #[test]
    fn equality_is_sensitive_to_tag_order() {
        let mut a = ServiceDescriptor::new("game", "game#1@g1", "h", 1);
        a.tags = vec!["red".to_owned(), "blue".to_owned()];
        let mut b = a.clone();
        b.tags = vec!["blue".to_owned(), "red".to_owned()];
        assert_ne!(a, b);
    }

    #[test]
    fn value_as_service_desc_returns_none_for_non_descriptor_bytes() {
        let vm = ValueMeta::new("cfg/foo", b"not json".to_vec());
        assert!(vm.value_as_service_desc().is_none());
    }

    #[test]
    fn value_as_service_desc_round_trips_valid_descriptor() {
        let sd = ServiceDescriptor::new("game", "game#1@g1", "10.0.0.1", 7000);
        let bytes = serde_json::to_vec(&sd).unwrap();
        let vm = ValueMeta::new("_svcdesc_game#1@g1", bytes);
        assert_eq!(vm.value_as_service_desc().unwrap(), sd);
    }
}
