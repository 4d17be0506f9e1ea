use crate::services::registry::{apply_url_overrides, ServiceDescriptor};
use serde::Deserialize;
use service_core::bus::timeouts;
use service_core::config::BusConfig;
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub warmup: WarmupSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "bff-gateway".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct WarmupSettings {
    /// Per-service HTTP health probe timeout.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// Bus ping timeout; the QUICK tier unless overridden.
    #[serde(default = "default_bus_timeout_ms")]
    pub bus_timeout_ms: u64,
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_bus_timeout_ms() -> u64 {
    timeouts::QUICK.as_millis() as u64
}

impl Default for WarmupSettings {
    fn default() -> Self {
        Self {
            http_timeout_ms: default_http_timeout_ms(),
            bus_timeout_ms: default_bus_timeout_ms(),
        }
    }
}

impl WarmupSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn bus_timeout(&self) -> Duration {
        Duration::from_millis(self.bus_timeout_ms)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ObservabilitySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP gRPC endpoint; spans are only exported when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;

    // Works from the workspace root and from the crate directory.
    let configuration_directory = if base_path.ends_with("bff-gateway") {
        base_path.join("config")
    } else {
        base_path.join("bff-gateway").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let mut settings = settings.try_deserialize::<Settings>()?;
    apply_url_overrides(&mut settings.services, |var| std::env::var(var).ok());
    Ok(settings)
}
