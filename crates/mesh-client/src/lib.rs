//! mesh-client: a reconnecting TCP client for the registry server.
//!
//! Holds a local mirror of the server's store, exposes a blocking
//! request/response API to application code, and drives the multi-peer
//! reconciler and large-value chunker on top of that API.

mod chunked;
pub mod config;
pub mod connection;
pub mod mirror;
pub mod multipeer;

pub use crate::config::ClientConfig;
pub use crate::connection::ClientError;
use crate::connection::Shared;
use crate::mirror::Mirror;
use mesh_core::ServiceDescriptor;
use mesh_protocol::{
    ClearKeyReq, ClearSvcReq, DeleteValueReq, GetValueReq, SetValueReq, StatusCode, WireMessage,
};
use std::sync::Arc;

/// A connected session against the registry. Cheap to clone: internally
/// an `Arc` around the connection state and the mirror.
#[derive(Clone)]
pub struct DiscoveryClient {
    shared: Arc<Shared>,
    mirror: Arc<Mirror>,
}

impl DiscoveryClient {
    /// Connect to `config.server_addr`. Blocks until the initial snapshot
    /// — the flood of `ValueChange` pushes the server emits ahead of its
    /// `AuthAck` — has been fully absorbed into the mirror (§4.4's
    /// `InitWait`).
    pub async fn connect(config: ClientConfig) -> Self {
        let mirror = Arc::new(Mirror::new());
        let shared = connection::connect(config.server_addr, config.request_timeout, mirror.clone()).await;
        DiscoveryClient { shared, mirror }
    }

    /// The token bound to this session, once Auth has completed.
    pub fn token(&self) -> Option<String> {
        self.shared.token()
    }

    pub(crate) fn mirror_handle(&self) -> Arc<Mirror> {
        self.mirror.clone()
    }

    pub async fn set_value(&self, key: impl Into<String>, value: Vec<u8>) -> Result<(), ClientError> {
        let req = WireMessage::SetValueReq(SetValueReq { key: key.into(), value });
        match self.shared.request(req).await? {
            WireMessage::SetValueAck(_) => Ok(()),
            other => unreachable!("ack_kind_for(SetValueReq) only ever resolves a SetValueAck: {other:?}"),
        }
    }

    /// Read `key` from the server. `Ok(None)` on `NotExists`.
    pub async fn get_value(&self, key: impl Into<String>) -> Result<Option<Vec<u8>>, ClientError> {
        let req = WireMessage::GetValueReq(GetValueReq { key: key.into() });
        match self.shared.request(req).await? {
            WireMessage::GetValueAck(ack) => match ack.code {
                StatusCode::Ok => Ok(ack.value),
                StatusCode::NotExists => Ok(None),
                StatusCode::AuthRequire => Err(ClientError::Disconnected),
            },
            other => unreachable!("ack_kind_for(GetValueReq) only ever resolves a GetValueAck: {other:?}"),
        }
    }

    pub async fn delete_value(&self, key: impl Into<String>) -> Result<(), ClientError> {
        let req = WireMessage::DeleteValueReq(DeleteValueReq { key: key.into() });
        match self.shared.request(req).await? {
            WireMessage::DeleteValueAck(_) => Ok(()),
            other => unreachable!("ack_kind_for(DeleteValueReq) only ever resolves a DeleteValueAck: {other:?}"),
        }
    }

    /// Delete every entry carrying a non-empty service name, regardless
    /// of owner.
    pub async fn clear_svc(&self) -> Result<(), ClientError> {
        match self.shared.request(WireMessage::ClearSvcReq(ClearSvcReq {})).await? {
            WireMessage::ClearSvcAck(_) => Ok(()),
            other => unreachable!("ack_kind_for(ClearSvcReq) only ever resolves a ClearSvcAck: {other:?}"),
        }
    }

    /// Delete every entry that does NOT carry a service name, regardless
    /// of owner (§9.3: no ACL on this operation).
    pub async fn clear_key(&self) -> Result<(), ClientError> {
        match self.shared.request(WireMessage::ClearKeyReq(ClearKeyReq {})).await? {
            WireMessage::ClearKeyAck(_) => Ok(()),
            other => unreachable!("ack_kind_for(ClearKeyReq) only ever resolves a ClearKeyAck: {other:?}"),
        }
    }

    /// Write a value of any size under `key`, transparently splitting it
    /// into `key`, `key.1`, `key.2`, ... if it exceeds the chunk
    /// threshold (§4.8).
    pub async fn safe_set_value(&self, key: &str, value: &[u8], use_compression: bool) -> Result<(), ClientError> {
        chunked::safe_set_value(self, key, value, use_compression).await
    }

    /// Read back a value written by [`Self::safe_set_value`].
    pub async fn safe_get_value(&self, key: &str, use_compression: bool) -> Result<Option<Vec<u8>>, ClientError> {
        chunked::safe_get_value(self, key, use_compression).await
    }

    /// Registered descriptors under `name`, read from the local mirror —
    /// no round trip to the server.
    pub fn query(&self, name: &str) -> Vec<ServiceDescriptor> {
        self.mirror.query(name)
    }

    /// `query`, ordered by `(SvcGroup, SvcIndex)` as in
    /// `mesh_core::query::QueryOptions { sort: true }`.
    pub fn query_sorted(&self, name: &str) -> Vec<ServiceDescriptor> {
        self.mirror.query_sorted(name)
    }

    /// Read `key` from the local mirror without a round trip.
    pub fn mirror_get(&self, key: &str) -> Option<Vec<u8>> {
        self.mirror.get(key)
    }

    /// Subscribe to lossy wake-ups for mirror changes of `mode` (`"add"`
    /// / `"remove"`, §4.5).
    pub fn subscribe(&self, mode: &str) -> tokio::sync::broadcast::Receiver<()> {
        self.mirror.subscribe(mode)
    }
}
