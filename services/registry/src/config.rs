//! Registry server configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides
//! except `LOG_LEVEL`, handled in `main`. Default config path:
//! `/etc/mesh/registry.toml`.
//!
//! All sections are optional; missing sections fall back to the defaults
//! documented per field below.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub bind: String,
    pub socket_recv_buffer_bytes: usize,
    pub socket_send_buffer_bytes: usize,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub path: String,
    pub interval_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            bind: ":8900".to_owned(),
            socket_recv_buffer_bytes: 1024 * 1024,
            socket_send_buffer_bytes: 1024 * 1024,
            persistence: PersistenceConfig {
                path: "registry_snapshot.json".to_owned(),
                interval_secs: 60,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    server: Option<RawServerConfig>,
    persistence: Option<RawPersistenceConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RawServerConfig {
    bind: Option<String>,
    socket_recv_buffer_bytes: Option<usize>,
    socket_send_buffer_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPersistenceConfig {
    path: Option<String>,
    interval_secs: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file '{0}': {1}")]
    Io(String, std::io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_config_from_path(path: &Path) -> Result<RegistryConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
    load_config_from_str(&toml_str)
}

pub fn load_config_from_str(toml_str: &str) -> Result<RegistryConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str)?;
    let defaults = RegistryConfig::default();

    let server = raw.server.unwrap_or_default();
    let persistence = raw.persistence.unwrap_or_default();

    Ok(RegistryConfig {
        bind: server.bind.unwrap_or(defaults.bind),
        socket_recv_buffer_bytes: server
            .socket_recv_buffer_bytes
            .unwrap_or(defaults.socket_recv_buffer_bytes),
        socket_send_buffer_bytes: server
            .socket_send_buffer_bytes
            .unwrap_or(defaults.socket_send_buffer_bytes),
        persistence: PersistenceConfig {
            path: persistence.path.unwrap_or(defaults.persistence.path),
            interval_secs: persistence
                .interval_secs
                .unwrap_or(defaults.persistence.interval_secs),
        },
    })
}
