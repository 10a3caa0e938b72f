//! Value objects and pure algorithms shared by the registry server and the
//! discovery client: descriptor model, service-ID grammar, wildcard
//! matching, the UUID64 token generator, the typed value codec, the
//! query/filter pipeline, and the large-value chunker.

pub mod chunk;
pub mod codec;
pub mod desc;
pub mod query;
pub mod svcid;
pub mod uuid64;
pub mod wildcard;

pub use desc::{ServiceDescriptor, ValueMeta};
pub use svcid::{parse_svc_id, make_svc_id, SvcIdError};
pub use uuid64::Uuid64Generator;
pub use wildcard::wildcard_match;

/// Reserved key prefix identifying a service descriptor entry.
pub const SERVICE_KEY_PREFIX: &str = "_svcdesc_";

/// Meta key instructing the server to preserve an entry across owner
/// disconnect.
pub const META_PERSIST: &str = "@Persist";
pub const META_SVC_GROUP: &str = "SvcGroup";
pub const META_SVC_INDEX: &str = "SvcIndex";
pub const META_WAN_ADDRESS: &str = "WANAddress";

/// True if `key` carries the reserved service-descriptor prefix.
pub fn is_service_key(key: &str) -> bool {
    key.starts_with(SERVICE_KEY_PREFIX)
}

/// Strip the reserved prefix, returning the bare service ID.
pub fn svc_id_from_service_key(key: &str) -> Option<&str> {
    key.strip_prefix(SERVICE_KEY_PREFIX)
}

/// Result codes shared across the server/client boundary, independent of
/// the wire encoding in `mesh_protocol`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    NotExists,
    AuthRequire,
}
