//! A thin, unscripted TCP peer speaking the wire protocol directly — for
//! tests that need to poke the registry with exact messages rather than go
//! through the discovery client's request/response API.

use futures::{SinkExt, StreamExt};
use mesh_protocol::framing::MessageCodec;
use mesh_protocol::WireMessage;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

pub struct RawClient {
    framed: Framed<TcpStream, MessageCodec>,
}

impl RawClient {
    pub async fn connect(addr: SocketAddr) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(RawClient { framed: Framed::new(stream, MessageCodec) })
    }

    pub async fn send(&mut self, msg: WireMessage) -> Result<(), mesh_protocol::framing::FramingError> {
        self.framed.send(msg).await
    }

    pub async fn recv(&mut self) -> Option<Result<WireMessage, mesh_protocol::framing::FramingError>> {
        self.framed.next().await
    }

    /// Authenticate and discard the initial snapshot flood, returning the
    /// bound token.
    pub async fn authenticate(&mut self, token: &str) -> String {
        self.send(WireMessage::AuthReq(mesh_protocol::AuthReq { token: token.to_owned() }))
            .await
            .expect("send auth_req");
        loop {
            match self.recv().await.expect("connection closed during auth").expect("framing error") {
                WireMessage::AuthAck(ack) => return ack.token,
                WireMessage::ValueChangeNotifyAck(_) => continue,
                other => panic!("unexpected message during auth: {other:?}"),
            }
        }
    }
}
