//! The single-writer event loop: the sole owner of the store, the session
//! table and the token generator. Every state mutation is posted here as a
//! [`Command`] from a connection task or the persistence ticker; nothing
//! outside this module ever touches the store directly, so handlers never
//! need a lock.

use crate::config::PersistenceConfig;
use crate::persist;
use crate::store::Store;
use mesh_core::{svc_id_from_service_key, ValueMeta};
use mesh_protocol::{
    AuthAck, ClearKeyAck, ClearSvcAck, DeleteValueAck, GetValueAck, SetValueAck, StatusCode,
    ValueChangeNotifyAck, ValueDeleteNotifyAck, WireMessage,
};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

pub type SessionId = u64;

/// Everything a connection task or the ticker can ask the loop to do.
pub enum Command {
    Connected { session_id: SessionId, outbound: mpsc::UnboundedSender<WireMessage> },
    Disconnected { session_id: SessionId },
    Incoming { session_id: SessionId, message: WireMessage },
    PersistTick,
}

struct Session {
    token: Option<String>,
    outbound: mpsc::UnboundedSender<WireMessage>,
}

impl Session {
    fn send(&self, msg: WireMessage) {
        // A closed receiver means the connection task has already torn
        // down; the Disconnected command for it is already queued or on
        // its way, so there is nothing more to do here.
        let _ = self.outbound.send(msg);
    }
}

pub struct EventLoop {
    store: Store,
    sessions: HashMap<SessionId, Session>,
    token_gen: mesh_core::Uuid64Generator,
    persistence: PersistenceConfig,
}

impl EventLoop {
    pub fn new(persistence: PersistenceConfig) -> Self {
        let snapshot_path = PathBuf::from(&persistence.path);
        let loaded = match persist::load_snapshot(&snapshot_path) {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(%err, "failed to load startup snapshot, starting with an empty store");
                Vec::new()
            }
        };
        let mut store = Store::new();
        let count = loaded.len();
        store.replace_all(loaded);
        tracing::info!(count, "loaded startup snapshot");

        EventLoop {
            store,
            sessions: HashMap::new(),
            token_gen: mesh_core::Uuid64Generator::new(),
            persistence,
        }
    }

    /// Drain `commands` until the sender side is dropped (process shutdown).
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(cmd) = commands.recv().await {
            self.handle(cmd);
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Connected { session_id, outbound } => {
                self.sessions.insert(session_id, Session { token: None, outbound });
            }
            Command::Disconnected { session_id } => self.on_disconnect(session_id),
            Command::Incoming { session_id, message } => self.on_incoming(session_id, message),
            Command::PersistTick => self.on_persist_tick(),
        }
    }

    fn broadcast(&self, msg: WireMessage) {
        for session in self.sessions.values() {
            session.send(msg.clone());
        }
    }

    fn on_incoming(&mut self, session_id: SessionId, message: WireMessage) {
        let is_authenticated = self
            .sessions
            .get(&session_id)
            .map(|s| s.token.is_some())
            .unwrap_or(false);

        if !is_authenticated {
            if let WireMessage::AuthReq(req) = message {
                self.handle_auth(session_id, req.token);
                return;
            }
            self.reply_auth_require(session_id, &message);
            return;
        }

        match message {
            WireMessage::AuthReq(req) => self.handle_auth(session_id, req.token),
            WireMessage::SetValueReq(req) => self.handle_set(session_id, req.key, req.value),
            WireMessage::GetValueReq(req) => self.handle_get(session_id, req.key),
            WireMessage::DeleteValueReq(req) => self.handle_delete(session_id, req.key),
            WireMessage::ClearSvcReq(_) => self.handle_clear_svc(session_id),
            WireMessage::ClearKeyReq(_) => self.handle_clear_key(session_id),
            // Acks and pushes are server-originated; a client sending one
            // back is a protocol violation we silently ignore rather than
            // let it take down the loop (see error-handling design).
            _ => tracing::warn!(session_id, "ignoring unexpected client-originated ack/push"),
        }
    }

    fn reply_auth_require(&self, session_id: SessionId, request: &WireMessage) {
        let Some(session) = self.sessions.get(&session_id) else { return };
        let ack = match request {
            WireMessage::SetValueReq(_) => WireMessage::SetValueAck(SetValueAck { code: StatusCode::AuthRequire }),
            WireMessage::GetValueReq(_) => WireMessage::GetValueAck(GetValueAck {
                code: StatusCode::AuthRequire,
                value: None,
            }),
            WireMessage::DeleteValueReq(req) => WireMessage::DeleteValueAck(DeleteValueAck {
                code: StatusCode::AuthRequire,
                key: req.key.clone(),
            }),
            WireMessage::ClearSvcReq(_) => WireMessage::ClearSvcAck(ClearSvcAck { code: StatusCode::AuthRequire }),
            WireMessage::ClearKeyReq(_) => WireMessage::ClearKeyAck(ClearKeyAck { code: StatusCode::AuthRequire }),
            _ => return,
        };
        session.send(ack);
    }

    fn handle_auth(&mut self, session_id: SessionId, requested_token: String) {
        // Flood the full initial snapshot before minting/binding the token,
        // so a client's first read of its mirror already reflects every
        // entry the server currently holds.
        let entries: Vec<(String, Vec<u8>)> =
            self.store.sorted_values().into_iter().map(|m| (m.key.clone(), m.value.clone())).collect();
        if let Some(session) = self.sessions.get(&session_id) {
            for (key, value) in entries {
                session.send(WireMessage::ValueChangeNotifyAck(ValueChangeNotifyAck { key, value }));
            }
        }

        let token = if requested_token.is_empty() {
            self.token_gen.generate_token()
        } else {
            requested_token
        };

        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.token = Some(token.clone());
            session.send(WireMessage::AuthAck(AuthAck { token }));
        }
    }

    fn handle_set(&mut self, session_id: SessionId, key: String, value: Vec<u8>) {
        let token = self.sessions.get(&session_id).and_then(|s| s.token.clone()).unwrap_or_default();
        let svc_name = svc_id_from_service_key(&key)
            .and_then(|svc_id| mesh_core::parse_svc_id(svc_id).ok())
            .map(|(name, _, _)| name)
            .unwrap_or_default();

        let is_service = !svc_name.is_empty();
        self.store.set(ValueMeta { key: key.clone(), value: value.clone(), svc_name, token });

        if is_service {
            tracing::info!(key, "register_service");
        } else {
            tracing::info!(key, "set_value");
        }

        self.broadcast(WireMessage::ValueChangeNotifyAck(ValueChangeNotifyAck { key, value }));
        if let Some(session) = self.sessions.get(&session_id) {
            session.send(WireMessage::SetValueAck(SetValueAck { code: StatusCode::Ok }));
        }
    }

    fn handle_get(&mut self, session_id: SessionId, key: String) {
        let Some(session) = self.sessions.get(&session_id) else { return };
        let ack = match self.store.get(&key) {
            Some(meta) => GetValueAck { code: StatusCode::Ok, value: Some(meta.value.clone()) },
            None => GetValueAck { code: StatusCode::NotExists, value: None },
        };
        session.send(WireMessage::GetValueAck(ack));
    }

    fn handle_delete(&mut self, session_id: SessionId, key: String) {
        self.delete_matching_keys(self.store.keys_with_prefix(&key), "api");
        if let Some(session) = self.sessions.get(&session_id) {
            session.send(WireMessage::DeleteValueAck(DeleteValueAck { code: StatusCode::Ok, key }));
        }
    }

    fn handle_clear_svc(&mut self, session_id: SessionId) {
        let keys = self.store.keys_matching(|m| !m.svc_name.is_empty());
        self.delete_matching_keys(keys, "clearsvc");
        if let Some(session) = self.sessions.get(&session_id) {
            session.send(WireMessage::ClearSvcAck(ClearSvcAck { code: StatusCode::Ok }));
        }
    }

    fn handle_clear_key(&mut self, session_id: SessionId) {
        let keys = self.store.keys_matching(|m| m.svc_name.is_empty());
        self.delete_matching_keys(keys, "clearkey");
        if let Some(session) = self.sessions.get(&session_id) {
            session.send(WireMessage::ClearKeyAck(ClearKeyAck { code: StatusCode::Ok }));
        }
    }

    /// Delete every key in `keys`, broadcasting one delete notification
    /// each. `reason` is logged only — it is not part of the wire push.
    fn delete_matching_keys(&mut self, keys: Vec<String>, reason: &'static str) {
        for key in keys {
            if let Some(prev) = self.store.delete(&key) {
                tracing::info!(key = %prev.key, reason, "delete_value");
                self.broadcast(WireMessage::ValueDeleteNotifyAck(ValueDeleteNotifyAck {
                    key: prev.key,
                    svc_name: prev.svc_name,
                }));
            }
        }
    }

    fn on_disconnect(&mut self, session_id: SessionId) {
        let Some(session) = self.sessions.remove(&session_id) else { return };
        let Some(token) = session.token else { return };

        let owned_keys = self.store.keys_matching(|m| m.token == token);
        let mut to_delete = Vec::new();
        for key in owned_keys {
            let survives = self
                .store
                .get(&key)
                .and_then(|meta| meta.value_as_service_desc())
                .map(|desc| !desc.get_meta(mesh_core::META_PERSIST).is_empty())
                .unwrap_or(false);
            if !survives {
                to_delete.push(key);
            }
        }
        self.delete_matching_keys(to_delete, "offline");
    }

    fn on_persist_tick(&mut self) {
        if !self.store.is_dirty() {
            return;
        }
        let path = PathBuf::from(&self.persistence.path);
        match persist::save_snapshot(&self.store, &path) {
            Ok(()) => self.store.clear_dirty(),
            Err(err) => tracing::error!(%err, "failed to write snapshot"),
        }
    }
}
