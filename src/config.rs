use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::http::parser::INITIAL_BUFFER_CAP;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,

    /// Initial capacity of each connection's read buffer.
    pub buffer_size: usize,

    /// Seconds a single read may stall before the request is abandoned.
    /// `0` waits forever.
    #[serde(deserialize_with = "deserialize_duration")]
    pub read_timeout: Duration,

    pub static_files_root: String,

    pub server_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 42069,
            buffer_size: INITIAL_BUFFER_CAP,

            read_timeout: Duration::ZERO,

            static_files_root: "./assets".to_string(),

            server_name: "httpfromtcp/0.1".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read config, falling back to defaults");
                return ServerConfig::default();
            }
        };

        match toml::from_str::<ServerConfig>(&content) {
            Ok(server_config) => server_config,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to deserialize config, falling back to defaults");
                ServerConfig::default()
            }
        }
    }

    pub fn active_read_timeout(&self) -> Option<Duration> {
        Some(self.read_timeout).filter(|d| !d.is_zero())
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}
