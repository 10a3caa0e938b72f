//! Per-connection task: frames one accepted TCP socket, posts decoded
//! messages to the event loop, and relays pushes/acks the loop sends back.

use crate::event_loop::{Command, SessionId};
use futures::{SinkExt, StreamExt};
use mesh_protocol::framing::MessageCodec;
use mesh_protocol::WireMessage;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

pub async fn handle_connection(
    socket: TcpStream,
    peer: std::net::SocketAddr,
    session_id: SessionId,
    commands: mpsc::Sender<Command>,
) {
    let mut framed = Framed::new(socket, MessageCodec);
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WireMessage>();

    if commands
        .send(Command::Connected { session_id, outbound: outbound_tx })
        .await
        .is_err()
    {
        tracing::error!(%peer, "event loop is gone, dropping connection");
        return;
    }

    loop {
        tokio::select! {
            frame = framed.next() => {
                match frame {
                    Some(Ok(message)) => {
                        if commands.send(Command::Incoming { session_id, message }).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        tracing::warn!(%peer, %err, "framing error, closing connection");
                        break;
                    }
                    None => {
                        tracing::info!(%peer, "connection closed by peer");
                        break;
                    }
                }
            }
            pushed = outbound_rx.recv() => {
                match pushed {
                    Some(message) => {
                        if let Err(err) = framed.send(message).await {
                            tracing::warn!(%peer, %err, "failed to write to socket, closing connection");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = commands.send(Command::Disconnected { session_id }).await;
}
