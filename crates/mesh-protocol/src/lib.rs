// mesh-protocol: wire message types for the registry's client/server protocol.
//
// Every message carries a top-level `kind` field for discriminated
// deserialization. Requests are correlated with their reply by message kind
// alone, not by a request id — a session has at most one outstanding request
// of a given kind at a time.

use serde::{Deserialize, Serialize};

pub mod framing;

// ---------------------------------------------------------------------------
// Shared sub-types
// ---------------------------------------------------------------------------

/// Result/status codes carried on ack messages.
///
/// `Ok` covers the common success path; the remaining variants are the only
/// ones a session handler ever returns directly to a caller — everything
/// else is logged server-side and never surfaces on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    NotExists,
    AuthRequire,
}

/// A key/value pair as observed by a `set_value` caller or delivered in a
/// change notification. The value is carried pre-encoded (see `mesh_core::codec`)
/// so the wire layer never needs to know about the typed value model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueEntry {
    pub key: String,
    pub value: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Client -> Server requests
// ---------------------------------------------------------------------------

/// First message a client sends after connecting.
///
/// An empty `token` asks the server to mint a fresh one; a non-empty token
/// asks the server to re-bind an existing token to this (new) connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthReq {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthAck {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetValueReq {
    pub key: String,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetValueAck {
    pub code: StatusCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetValueReq {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetValueAck {
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteValueReq {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteValueAck {
    pub code: StatusCode,
    pub key: String,
}

/// Delete every entry that carries a non-empty service name (i.e. every
/// service descriptor), regardless of owning session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSvcReq {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSvcAck {
    pub code: StatusCode,
}

/// Delete every entry that does NOT carry a service name (plain key/value
/// pairs), regardless of owning session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearKeyReq {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearKeyAck {
    pub code: StatusCode,
}

// ---------------------------------------------------------------------------
// Server -> Client pushes (broadcast, non-selective)
// ---------------------------------------------------------------------------

/// Sent to every connected session (including the one that caused the
/// change) whenever a value is created or overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueChangeNotifyAck {
    pub key: String,
    pub value: Vec<u8>,
}

/// Sent to every connected session whenever a value is removed, whether by
/// explicit request, clear-svc/clear-key, or disconnect cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDeleteNotifyAck {
    pub key: String,
    /// Non-empty when the deleted entry was a service descriptor.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub svc_name: String,
}

// ---------------------------------------------------------------------------
// Top-level discriminated union
// ---------------------------------------------------------------------------

/// All wire message kinds in the registry protocol.
///
/// ```json
/// { "kind": "auth_req", "token": "" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
#[serde(rename_all = "snake_case")]
pub enum WireMessage {
    AuthReq(AuthReq),
    AuthAck(AuthAck),
    SetValueReq(SetValueReq),
    SetValueAck(SetValueAck),
    GetValueReq(GetValueReq),
    GetValueAck(GetValueAck),
    DeleteValueReq(DeleteValueReq),
    DeleteValueAck(DeleteValueAck),
    ClearSvcReq(ClearSvcReq),
    ClearSvcAck(ClearSvcAck),
    ClearKeyReq(ClearKeyReq),
    ClearKeyAck(ClearKeyAck),
    ValueChangeNotifyAck(ValueChangeNotifyAck),
    ValueDeleteNotifyAck(ValueDeleteNotifyAck),
}

impl WireMessage {
    /// The `kind` discriminant as it appears on the wire, used for the
    /// one-outstanding-request-per-kind correlation rule on the client side.
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::AuthReq(_) => "auth_req",
            WireMessage::AuthAck(_) => "auth_ack",
            WireMessage::SetValueReq(_) => "set_value_req",
            WireMessage::SetValueAck(_) => "set_value_ack",
            WireMessage::GetValueReq(_) => "get_value_req",
            WireMessage::GetValueAck(_) => "get_value_ack",
            WireMessage::DeleteValueReq(_) => "delete_value_req",
            WireMessage::DeleteValueAck(_) => "delete_value_ack",
            WireMessage::ClearSvcReq(_) => "clear_svc_req",
            WireMessage::ClearSvcAck(_) => "clear_svc_ack",
            WireMessage::ClearKeyReq(_) => "clear_key_req",
            WireMessage::ClearKeyAck(_) => "clear_key_ack",
            WireMessage::ValueChangeNotifyAck(_) => "value_change_notify_ack",
            WireMessage::ValueDeleteNotifyAck(_) => "value_delete_notify_ack",
        }
    }
}
