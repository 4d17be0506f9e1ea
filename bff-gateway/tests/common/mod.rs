#![allow(dead_code)]

use bff_gateway::config::{ObservabilitySettings, ServerSettings, Settings, WarmupSettings};
use bff_gateway::services::registry::{ServiceDescriptor, ServiceRegistry};
use bff_gateway::services::warmup::WarmupService;
use bff_gateway::startup::Application;
use service_core::bus::{InMemoryBus, RpcGateway};
use service_core::config::BusConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const HTTP_TIMEOUT_MS: u64 = 1_000;
pub const BUS_TIMEOUT_MS: u64 = 300;

pub fn test_settings(services: Vec<ServiceDescriptor>) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            service_name: "bff-gateway-test".to_string(),
        },
        bus: BusConfig::default(),
        warmup: WarmupSettings {
            http_timeout_ms: HTTP_TIMEOUT_MS,
            bus_timeout_ms: BUS_TIMEOUT_MS,
        },
        observability: ObservabilitySettings::default(),
        services,
    }
}

pub fn warmup_service(services: Vec<ServiceDescriptor>, bus: &InMemoryBus) -> WarmupService {
    let registry = ServiceRegistry::new(services).expect("valid test registry");
    WarmupService::new(
        Arc::new(registry),
        RpcGateway::new(Arc::new(bus.clone())),
        Duration::from_millis(HTTP_TIMEOUT_MS),
        Duration::from_millis(BUS_TIMEOUT_MS),
    )
}

/// A mock downstream whose `/health` answers with `status`.
pub async fn health_endpoint(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

/// A mock downstream whose `/health` answers 200 after `delay`.
pub async fn slow_health_endpoint(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(delay))
        .mount(&server)
        .await;
    server
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub bus: InMemoryBus,
    pub client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub async fn spawn(services: Vec<ServiceDescriptor>, bus: InMemoryBus) -> Self {
        let app = Application::build_with_transport(test_settings(services), Arc::new(bus.clone()))
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            app.run_until(async {
                rx.await.ok();
            })
            .await
            .ok();
        });

        Self {
            address: format!("http://127.0.0.1:{}", port),
            port,
            bus,
            client: reqwest::Client::new(),
            shutdown: Some(tx),
        }
    }

    pub async fn get_json(&self, route: &str) -> (u16, serde_json::Value) {
        let response = self
            .client
            .get(format!("{}{}", self.address, route))
            .send()
            .await
            .expect("Failed to execute request");
        let status = response.status().as_u16();
        let body = response.json().await.expect("Response was not JSON");
        (status, body)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
