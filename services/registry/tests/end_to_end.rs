//! Exercises the registry over real loopback TCP connections, matching the
//! end-to-end scenarios named in the design notes: register/query/
//! disconnect, ClearSvc selectivity, and Auth gating.

use futures::{SinkExt, StreamExt};
use mesh_protocol::{
    AuthReq, ClearSvcReq, DeleteValueReq, GetValueReq, SetValueReq, StatusCode, WireMessage,
};
use registry::config::PersistenceConfig;
use registry::connection::handle_connection;
use registry::event_loop::{Command, EventLoop};
use mesh_protocol::framing::MessageCodec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

type ClientFramed = Framed<TcpStream, MessageCodec>;

async fn spawn_server() -> std::net::SocketAddr {
    // The persistence ticker never fires in these tests (interval far longer
    // than any test run), so no snapshot is ever written; a nonexistent path
    // is enough and needs no per-test cleanup.
    let persistence = PersistenceConfig {
        path: "/tmp/mesh-registry-test-snapshot-does-not-exist.json".to_owned(),
        interval_secs: 3600,
    };

    let event_loop = EventLoop::new(persistence);
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(1024);
    tokio::spawn(event_loop.run(cmd_rx));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let next_id = Arc::new(AtomicU64::new(1));

    tokio::spawn(async move {
        loop {
            let (socket, peer) = listener.accept().await.unwrap();
            let session_id = next_id.fetch_add(1, Ordering::Relaxed);
            tokio::spawn(handle_connection(socket, peer, session_id, cmd_tx.clone()));
        }
    });

    addr
}

async fn connect(addr: std::net::SocketAddr) -> ClientFramed {
    let stream = TcpStream::connect(addr).await.unwrap();
    Framed::new(stream, MessageCodec)
}

async fn authenticate(client: &mut ClientFramed, token: &str) -> String {
    client.send(WireMessage::AuthReq(AuthReq { token: token.to_owned() })).await.unwrap();
    loop {
        match client.next().await.unwrap().unwrap() {
            WireMessage::AuthAck(ack) => return ack.token,
            WireMessage::ValueChangeNotifyAck(_) => continue, // initial snapshot flood
            other => panic!("unexpected message while authenticating: {other:?}"),
        }
    }
}

#[tokio::test]
async fn register_query_disconnect() {
    let addr = spawn_server().await;

    let mut a = connect(addr).await;
    authenticate(&mut a, "").await;

    let desc = mesh_core::ServiceDescriptor::new("game", "game#1@g1", "10.0.0.1", 7000);
    let desc_bytes = serde_json::to_vec(&desc).unwrap();
    a.send(WireMessage::SetValueReq(SetValueReq {
        key: "_svcdesc_game#1@g1".to_owned(),
        value: desc_bytes.clone(),
    }))
    .await
    .unwrap();
    assert!(matches!(a.next().await.unwrap().unwrap(), WireMessage::ValueChangeNotifyAck(_)));
    assert!(matches!(a.next().await.unwrap().unwrap(), WireMessage::SetValueAck(_)));

    let mut b = connect(addr).await;
    authenticate(&mut b, "").await;
    // B authenticated after A's write, so the write already landed in the
    // snapshot B absorbed during Auth.

    a.send(WireMessage::GetValueReq(GetValueReq { key: "dummy".to_owned() })).await.unwrap();
    let _ = a.next().await; // drain the NotExists ack, not under test

    drop(a);

    match b.next().await.unwrap().unwrap() {
        WireMessage::ValueDeleteNotifyAck(notice) => {
            assert_eq!(notice.key, "_svcdesc_game#1@g1");
            assert_eq!(notice.svc_name, "game#1@g1");
        }
        other => panic!("expected a delete notification, got {other:?}"),
    }
}

#[tokio::test]
async fn clear_svc_removes_only_service_keys() {
    let addr = spawn_server().await;
    let mut client = connect(addr).await;
    authenticate(&mut client, "").await;

    for (key, value) in [("_svcdesc_game#1@g1", b"{}".to_vec()), ("plain", b"1".to_vec())] {
        client
            .send(WireMessage::SetValueReq(SetValueReq { key: key.to_owned(), value }))
            .await
            .unwrap();
        let _ = client.next().await; // ValueChangeNotifyAck
        let _ = client.next().await; // SetValueAck
    }

    client.send(WireMessage::ClearSvcReq(ClearSvcReq {})).await.unwrap();
    let mut deleted_keys = Vec::new();
    loop {
        match client.next().await.unwrap().unwrap() {
            WireMessage::ValueDeleteNotifyAck(notice) => deleted_keys.push(notice.key),
            WireMessage::ClearSvcAck(ack) => {
                assert_eq!(ack.code, StatusCode::Ok);
                break;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(deleted_keys, vec!["_svcdesc_game#1@g1".to_owned()]);

    client.send(WireMessage::GetValueReq(GetValueReq { key: "plain".to_owned() })).await.unwrap();
    match client.next().await.unwrap().unwrap() {
        WireMessage::GetValueAck(ack) => assert_eq!(ack.code, StatusCode::Ok),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn auth_gating_rejects_requests_before_auth_succeeds() {
    let addr = spawn_server().await;
    let mut client = connect(addr).await;

    client.send(WireMessage::GetValueReq(GetValueReq { key: "k".to_owned() })).await.unwrap();
    match client.next().await.unwrap().unwrap() {
        WireMessage::GetValueAck(ack) => {
            assert_eq!(ack.code, StatusCode::AuthRequire);
            assert!(ack.value.is_none());
        }
        other => panic!("unexpected {other:?}"),
    }

    authenticate(&mut client, "").await;
    client
        .send(WireMessage::SetValueReq(SetValueReq { key: "k".to_owned(), value: b"v".to_vec() }))
        .await
        .unwrap();
    let _ = client.next().await; // ValueChangeNotifyAck
    let _ = client.next().await; // SetValueAck

    client.send(WireMessage::GetValueReq(GetValueReq { key: "k".to_owned() })).await.unwrap();
    match client.next().await.unwrap().unwrap() {
        WireMessage::GetValueAck(ack) => {
            assert_eq!(ack.code, StatusCode::Ok);
            assert_eq!(ack.value.unwrap(), b"v");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn delete_value_req_removes_key_and_broadcasts_delete() {
    let addr = spawn_server().await;
    let mut client = connect(addr).await;
    authenticate(&mut client, "").await;

    client
        .send(WireMessage::SetValueReq(SetValueReq { key: "cfg/a".to_owned(), value: b"1".to_vec() }))
        .await
        .unwrap();
    let _ = client.next().await;
    let _ = client.next().await;

    client.send(WireMessage::DeleteValueReq(DeleteValueReq { key: "cfg/a".to_owned() })).await.unwrap();
    assert!(matches!(client.next().await.unwrap().unwrap(), WireMessage::ValueDeleteNotifyAck(_)));
    match client.next().await.unwrap().unwrap() {
        WireMessage::DeleteValueAck(ack) => assert_eq!(ack.key, "cfg/a"),
        other => panic!("unexpected {other:?}"),
    }

    client.send(WireMessage::GetValueReq(GetValueReq { key: "cfg/a".to_owned() })).await.unwrap();
    match client.next().await.unwrap().unwrap() {
        WireMessage::GetValueAck(ack) => assert_eq!(ack.code, StatusCode::NotExists),
        other => panic!("unexpected {other:?}"),
    }
}
