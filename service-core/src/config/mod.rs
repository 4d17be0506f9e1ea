use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

/// Message bus connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct BusConfig {
    /// Comma separated list of NATS server URLs.
    #[serde(default = "default_bus_url")]
    pub url: String,
    /// Client name reported to the server.
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// Optional auth token.
    #[serde(default)]
    pub token: Option<Secret<String>>,
    /// Upper bound on connect and reconnect attempts.
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: usize,
    /// Base delay between reconnect attempts, in milliseconds.
    #[serde(default = "default_reconnect_wait_ms")]
    pub reconnect_wait_ms: u64,
    /// Cap on the backoff delay, in milliseconds.
    #[serde(default = "default_max_reconnect_wait_ms")]
    pub max_reconnect_wait_ms: u64,
    /// Abort start-up when the bus cannot be reached.
    /// When false the process starts degraded and every bus call fails as unavailable.
    #[serde(default)]
    pub required: bool,
    /// Subject this process answers pings on, if any.
    #[serde(default)]
    pub ping_subject: Option<String>,
}

fn default_bus_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_client_name() -> String {
    "bff-gateway".to_string()
}

fn default_max_reconnects() -> usize {
    10
}

fn default_reconnect_wait_ms() -> u64 {
    2000
}

fn default_max_reconnect_wait_ms() -> u64 {
    30_000
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_bus_url(),
            client_name: default_client_name(),
            token: None,
            max_reconnects: default_max_reconnects(),
            reconnect_wait_ms: default_reconnect_wait_ms(),
            max_reconnect_wait_ms: default_max_reconnect_wait_ms(),
            required: false,
            ping_subject: None,
        }
    }
}

impl BusConfig {
    pub fn reconnect_wait(&self) -> Duration {
        Duration::from_millis(self.reconnect_wait_ms)
    }

    pub fn max_reconnect_wait(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_wait_ms)
    }

    /// Server URLs split on commas, empty entries dropped.
    pub fn servers(&self) -> Vec<String> {
        self.url
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
