//! A real registry, wired up on a random loopback port, for use by tests of
//! the discovery client and its consumers.
//!
//! Unlike a hand-rolled protocol mock, this runs the actual event loop and
//! connection handling — the same code the binary entry point wires up — so
//! client tests exercise the real Auth/Set/Get/broadcast semantics instead
//! of a second, potentially-drifting reimplementation of them.

use registry::config::PersistenceConfig;
use registry::connection::handle_connection;
use registry::event_loop::EventLoop;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub struct MockRegistryServer {
    addr: SocketAddr,
    _accept_task: tokio::task::JoinHandle<()>,
    _loop_task: tokio::task::JoinHandle<()>,
}

impl MockRegistryServer {
    /// Start a registry backed by a snapshot file that is never written
    /// during the test (the caller is responsible for not outliving a
    /// shared tmp path across concurrent tests).
    pub async fn start(snapshot_path: &str) -> Self {
        let persistence = PersistenceConfig { path: snapshot_path.to_owned(), interval_secs: 3600 };
        let event_loop = EventLoop::new(persistence);
        let (cmd_tx, cmd_rx) = mpsc::channel(1024);
        let loop_task = tokio::spawn(event_loop.run(cmd_rx));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock registry");
        let addr = listener.local_addr().expect("local addr");
        let next_id = Arc::new(AtomicU64::new(1));

        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((socket, peer)) = listener.accept().await else { break };
                let session_id = next_id.fetch_add(1, Ordering::Relaxed);
                tokio::spawn(handle_connection(socket, peer, session_id, cmd_tx.clone()));
            }
        });

        MockRegistryServer { addr, _accept_task: accept_task, _loop_task: loop_task }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}
