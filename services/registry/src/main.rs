use registry::config::{self, RegistryConfig};
use registry::event_loop::{Command, EventLoop};
use registry::connection::handle_connection;
use std::env;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "/etc/mesh/registry.toml";

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(log_level)).init();

    let config_path = env::var("REGISTRY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let cfg = load_config_or_defaults(&config_path);

    let event_loop = EventLoop::new(cfg.persistence.clone());
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(1024);
    tokio::spawn(event_loop.run(cmd_rx));

    spawn_persistence_ticker(cmd_tx.clone(), cfg.persistence.interval_secs);

    let bind_addr = normalize_bind_addr(&cfg.bind);
    let listener = TcpListener::bind(&bind_addr).await.expect("failed to bind");
    info!(addr = %bind_addr, "registry listening");

    let next_session_id = Arc::new(AtomicU64::new(1));

    tokio::select! {
        _ = accept_loop(listener, cmd_tx, next_session_id) => {}
        _ = shutdown_signal() => { info!("shutting down"); }
    }
}

fn load_config_or_defaults(path: &str) -> RegistryConfig {
    match config::load_config_from_path(Path::new(path)) {
        Ok(cfg) => {
            info!(path, bind = %cfg.bind, "config loaded");
            cfg
        }
        Err(err) => {
            warn!(path, %err, "could not load config, using defaults");
            RegistryConfig::default()
        }
    }
}

fn normalize_bind_addr(bind: &str) -> String {
    if let Some(port) = bind.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        bind.to_owned()
    }
}

async fn accept_loop(listener: TcpListener, commands: mpsc::Sender<Command>, next_session_id: Arc<AtomicU64>) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                let session_id = next_session_id.fetch_add(1, Ordering::Relaxed);
                let commands = commands.clone();
                info!(%peer, session_id, "accepted connection");
                tokio::spawn(handle_connection(socket, peer, session_id, commands));
            }
            Err(err) => {
                error!(%err, "accept failed");
            }
        }
    }
}

fn spawn_persistence_ticker(commands: mpsc::Sender<Command>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            if commands.send(Command::PersistTick).await.is_err() {
                break;
            }
        }
    });
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C"); },
        _ = terminate => { info!("received SIGTERM"); },
    }
}
