//! Multi-peer reconciler: reconciles a target service's live descriptor
//! set against a set of outbound peer connections, adding, replacing, and
//! dropping peers as the mirror changes.
//!
//! Grounded directly on `cellmesh`'s `service.multiPeer` /
//! `service.DiscoveryService` (see `original_source/service/multipeer.go`):
//! the map-of-peers-by-service-ID, the `GetPeer`/`AddPeer`/`RemovePeer`
//! surface, and the reconcile-on-notify loop are kept; `cellnet.Peer`
//! becomes the local [`Peer`] trait since there is no cellnet dependency
//! here, and the background task is a Tokio task instead of a goroutine.

use mesh_core::query::{
    filter_match_rule, filter_match_svc_group, query_ex, MatchRule, QueryOptions,
};
use mesh_core::ServiceDescriptor;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::error::RecvError;

/// An outbound connection created for one discovered service instance.
///
/// Implementors are responsible for calling [`MultiPeer::add_peer`]
/// *before* starting the connection, so the descriptor context is
/// attached in time for the eventual handshake exchange (§4.7).
pub trait Peer: Send + Sync {
    fn is_ready(&self) -> bool;
    fn stop(&self);
}

struct Entry {
    desc: ServiceDescriptor,
    peer: Arc<dyn Peer>,
}

/// Ordered set of outbound peers keyed by service ID, with at most one
/// peer per ID.
#[derive(Clone, Default)]
pub struct MultiPeer {
    peers: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MultiPeer {
    pub fn new() -> Self {
        MultiPeer::default()
    }

    pub fn get_peer(&self, svc_id: &str) -> Option<Arc<dyn Peer>> {
        self.peers.read().unwrap().get(svc_id).map(|e| e.peer.clone())
    }

    fn get_peer_desc(&self, svc_id: &str) -> Option<ServiceDescriptor> {
        self.peers.read().unwrap().get(svc_id).map(|e| e.desc.clone())
    }

    /// Record `peer` under `desc.id`. Must be called before the caller
    /// starts `peer`.
    pub fn add_peer(&self, desc: ServiceDescriptor, peer: Arc<dyn Peer>) {
        self.peers.write().unwrap().insert(desc.id.clone(), Entry { desc, peer });
    }

    pub fn remove_peer(&self, svc_id: &str) -> Option<Arc<dyn Peer>> {
        self.peers.write().unwrap().remove(svc_id).map(|e| e.peer)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().unwrap().len()
    }

    /// True iff there is at least one peer and every peer reports ready.
    pub fn is_ready(&self) -> bool {
        let peers = self.peers.read().unwrap();
        !peers.is_empty() && peers.values().all(|e| e.peer.is_ready())
    }
}

/// Options narrowing which descriptors of the target service are
/// reconciled (§4.7).
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    pub rules: Vec<MatchRule>,
    /// 0 means unlimited.
    pub max_count: usize,
    pub match_svc_group: String,
}

/// Subscribe to the mirror's `"add"` wake-ups and reconcile
/// `tgt_svc_name`'s live descriptor set against outbound peers, calling
/// `peer_creator` for every newly discovered or changed instance. Runs
/// until the mirror's notifier channel closes.
pub fn discovery_service(
    client: &crate::DiscoveryClient,
    tgt_svc_name: impl Into<String>,
    opt: DiscoveryOptions,
    peer_creator: impl Fn(&MultiPeer, &ServiceDescriptor) + Send + Sync + 'static,
) -> MultiPeer {
    let tgt_svc_name = tgt_svc_name.into();
    let multi_peer = MultiPeer::new();
    let mirror = client.mirror_handle();
    let mut notify = mirror.subscribe("add");
    let returned = multi_peer.clone();

    tokio::spawn(async move {
        loop {
            reconcile(&mirror, &multi_peer, &tgt_svc_name, &opt, &peer_creator);

            match notify.recv().await {
                Ok(()) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    returned
}

fn reconcile(
    mirror: &crate::mirror::Mirror,
    multi_peer: &MultiPeer,
    tgt_svc_name: &str,
    opt: &DiscoveryOptions,
    peer_creator: &(impl Fn(&MultiPeer, &ServiceDescriptor) + Send + Sync),
) {
    let candidates = mirror.query(tgt_svc_name);
    let group_filter = filter_match_svc_group::<ServiceDescriptor>(opt.match_svc_group.clone());
    // `filter_match_rule` drops everything when `rules` is empty (no rule
    // can match), but an empty rule list here means "no restriction", not
    // "match nothing" — so the filter is only applied when rules are set.
    let matched = if opt.rules.is_empty() {
        query_ex(&candidates, QueryOptions::default(), &[&group_filter], |d| d.clone())
    } else {
        let rule_filter = filter_match_rule::<ServiceDescriptor>(opt.rules.clone());
        query_ex(&candidates, QueryOptions::default(), &[&group_filter, &rule_filter], |d| d.clone())
    };

    for desc in matched {
        if let Some(prev) = multi_peer.get_peer_desc(&desc.id) {
            if prev == desc {
                continue;
            }
            // Advertised descriptor changed: stop the stale peer and let
            // a later pass create its replacement.
            if let Some(peer) = multi_peer.remove_peer(&desc.id) {
                peer.stop();
            }
        }

        if opt.max_count > 0 && multi_peer.peer_count() >= opt.max_count {
            continue;
        }

        peer_creator(multi_peer, &desc);
    }
}
