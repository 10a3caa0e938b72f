//! Discovery-client connection: dials the registry, frames the wire
//! protocol, and correlates each request with its reply by message kind.
//!
//! Structurally this is the registry's own per-connection actor
//! (`registry::connection::handle_connection`) seen from the other end of
//! the wire — one task owns the socket and relays frames to/from an
//! internal channel — adapted with a request table so blocking callers
//! can `.await` a specific reply, and a supervisor loop that redials on
//! disconnect (grounded on the forwarder's `UplinkSession::connect`
//! handshake-then-serve shape).

use crate::mirror::Mirror;
use futures::{SinkExt, StreamExt};
use mesh_protocol::framing::{FramingError, MessageCodec};
use mesh_protocol::{AuthAck, AuthReq, WireMessage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio_util::codec::Framed;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    #[error("request timed out")]
    Timeout,
    #[error("disconnected from server")]
    Disconnected,
    #[error("decompression failed: {0}")]
    Decompress(std::io::Error),
}

/// The ack kind a request is waiting for. One outstanding request per
/// kind at a time (§4.4): issuing a second request of the same kind while
/// one is already in flight replaces the earlier waiter, which then times
/// out rather than being answered.
fn ack_kind_for(req: &WireMessage) -> &'static str {
    match req {
        WireMessage::AuthReq(_) => "auth_ack",
        WireMessage::SetValueReq(_) => "set_value_ack",
        WireMessage::GetValueReq(_) => "get_value_ack",
        WireMessage::DeleteValueReq(_) => "delete_value_ack",
        WireMessage::ClearSvcReq(_) => "clear_svc_ack",
        WireMessage::ClearKeyReq(_) => "clear_key_ack",
        other => unreachable!("{other:?} is a reply, not a request"),
    }
}

type PendingMap = Mutex<HashMap<&'static str, oneshot::Sender<WireMessage>>>;

/// State shared between the public request API and the background
/// connection supervisor.
pub(crate) struct Shared {
    mirror: Arc<Mirror>,
    outbound: Mutex<Option<mpsc::UnboundedSender<WireMessage>>>,
    pending: PendingMap,
    token: Mutex<Option<String>>,
    request_timeout: Duration,
}

impl Shared {
    pub(crate) fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    /// Send `req` and block for its correlated ack. Fails fast with
    /// `Disconnected` if no socket is currently live, or with `Timeout`
    /// after `request_timeout` (§5: default 10s).
    pub(crate) async fn request(&self, req: WireMessage) -> Result<WireMessage, ClientError> {
        let kind = ack_kind_for(&req);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(kind, tx);

        let sent = {
            let outbound = self.outbound.lock().unwrap();
            outbound.as_ref().map(|sender| sender.send(req).is_ok())
        };
        if sent != Some(true) {
            self.pending.lock().unwrap().remove(kind);
            return Err(ClientError::Disconnected);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(_)) => Err(ClientError::Disconnected),
            Err(_) => {
                self.pending.lock().unwrap().remove(kind);
                Err(ClientError::Timeout)
            }
        }
    }
}

/// Dial `addr` and block until the constructor's `InitWait` is satisfied:
/// the first `AuthAck` has arrived, meaning every `ValueChange` the server
/// emitted ahead of it (the initial snapshot) has already been applied to
/// the mirror by the time this returns.
pub(crate) async fn connect(
    addr: String,
    request_timeout: Duration,
    mirror: Arc<Mirror>,
) -> Arc<Shared> {
    let shared = Arc::new(Shared {
        mirror,
        outbound: Mutex::new(None),
        pending: Mutex::new(HashMap::new()),
        token: Mutex::new(None),
        request_timeout,
    });

    let ready = Arc::new(Notify::new());
    tokio::spawn(supervisor(shared.clone(), addr, ready.clone()));
    ready.notified().await;
    shared
}

/// Redials `addr` forever, re-authenticating with the prior token (if
/// any) on every attempt. Per the decided open question (§9.1), the
/// mirror is never cleared across a reconnect — each push overlays it.
async fn supervisor(shared: Arc<Shared>, addr: String, ready: Arc<Notify>) {
    loop {
        match TcpStream::connect(&addr).await {
            Ok(socket) => {
                let framed = Framed::new(socket, MessageCodec);
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                *shared.outbound.lock().unwrap() = Some(outbound_tx);
                drive_socket(&shared, framed, outbound_rx, &ready).await;
            }
            Err(err) => {
                tracing::warn!(%addr, %err, "failed to connect to registry, retrying");
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Own one live socket until it closes: send the handshake `AuthReq`,
/// then multiplex inbound frames against outbound requests until either
/// side errors out.
async fn drive_socket(
    shared: &Arc<Shared>,
    mut framed: Framed<TcpStream, MessageCodec>,
    mut outbound_rx: mpsc::UnboundedReceiver<WireMessage>,
    ready: &Arc<Notify>,
) {
    let prior_token = shared.token().unwrap_or_default();
    if framed.send(WireMessage::AuthReq(AuthReq { token: prior_token })).await.is_err() {
        *shared.outbound.lock().unwrap() = None;
        return;
    }

    loop {
        tokio::select! {
            frame = framed.next() => {
                match frame {
                    Some(Ok(message)) => handle_inbound(shared, message, ready),
                    _ => break,
                }
            }
            outgoing = outbound_rx.recv() => {
                match outgoing {
                    Some(message) => {
                        if framed.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    *shared.outbound.lock().unwrap() = None;
    fail_all_pending(shared);
}

fn handle_inbound(shared: &Shared, message: WireMessage, ready: &Notify) {
    match &message {
        WireMessage::ValueChangeNotifyAck(body) => {
            shared.mirror.apply_change(&body.key, &body.value);
        }
        WireMessage::ValueDeleteNotifyAck(body) => {
            shared.mirror.apply_delete(&body.key, &body.svc_name);
        }
        WireMessage::AuthAck(AuthAck { token }) => {
            *shared.token.lock().unwrap() = Some(token.clone());
            ready.notify_one();
        }
        _ => {}
    }

    if let Some(tx) = shared.pending.lock().unwrap().remove(message.kind()) {
        let _ = tx.send(message);
    }
}

fn fail_all_pending(shared: &Shared) {
    shared.pending.lock().unwrap().clear();
}
