//! Discovery-client configuration loading.
//!
//! TOML is the sole config source, mirroring the registry server's own
//! loader. Default path: `/etc/mesh/client.toml`.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    /// Deadline for a single blocking request (§5: default 10s).
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server_addr: "127.0.0.1:8900".to_owned(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    client: Option<RawClientConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RawClientConfig {
    server_addr: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file '{0}': {1}")]
    Io(String, std::io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_config_from_path(path: &Path) -> Result<ClientConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
    load_config_from_str(&toml_str)
}

pub fn load_config_from_str(toml_str: &str) -> Result<ClientConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str)?;
    let defaults = ClientConfig::default();
    let client = raw.client.unwrap_or_default();

    Ok(ClientConfig {
        server_addr: client.server_addr.unwrap_or(defaults.server_addr),
        request_timeout: client
            .request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout),
    })
}
