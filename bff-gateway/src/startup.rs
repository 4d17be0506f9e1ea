//! Application startup and lifecycle management.
//!
//! Order is fixed: connect the bus, bind the listener, serve; on shutdown stop
//! serving first, then stop the ping responder, then close the bus.

use crate::config::Settings;
use crate::handlers::{
    app::health_check,
    metrics::metrics,
    warmup::{warmup_all, warmup_bus, warmup_http},
};
use crate::services::registry::ServiceRegistry;
use crate::services::warmup::WarmupService;
use crate::AppState;
use axum::{middleware::from_fn, routing::get, Router};
use service_core::bus::{BusConnection, BusTransport, RpcGateway};
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use service_core::observability::REQUEST_ID_HEADER;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/system/warmup", get(warmup_all))
        .route("/system/warmup/http", get(warmup_http))
        .route("/system/warmup/bus", get(warmup_bus))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    bus: Option<Arc<BusConnection>>,
    ping_responder: Option<JoinHandle<()>>,
}

impl Application {
    /// Connect to the bus and bind the HTTP listener.
    pub async fn build(settings: Settings) -> Result<Self, AppError> {
        let bus = Arc::new(BusConnection::connect_or_degrade(&settings.bus).await?);

        let ping_responder = match &settings.bus.ping_subject {
            Some(subject) if bus.is_connected() => {
                match bus.serve_ping(subject, &settings.server.service_name).await {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        release_bus(None, Some(&bus)).await;
                        return Err(e);
                    }
                }
            }
            _ => None,
        };

        match Self::build_with_transport(settings, bus.clone()).await {
            Ok(mut app) => {
                app.bus = Some(bus);
                app.ping_responder = ping_responder;
                Ok(app)
            }
            Err(e) => {
                release_bus(ping_responder, Some(&bus)).await;
                Err(e)
            }
        }
    }

    /// Build on top of an existing transport. The caller owns its lifecycle.
    pub async fn build_with_transport(
        settings: Settings,
        transport: Arc<dyn BusTransport>,
    ) -> Result<Self, AppError> {
        let registry = ServiceRegistry::new(settings.services.clone())
            .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;

        tracing::info!(
            services = registry.len(),
            bus_participants = registry.bus_participant_count(),
            "Service registry loaded"
        );

        let gateway = RpcGateway::new(transport);
        let warmup = Arc::new(WarmupService::new(
            Arc::new(registry),
            gateway.clone(),
            settings.warmup.http_timeout(),
            settings.warmup.bus_timeout(),
        ));
        let state = AppState::new(&settings.server.service_name, gateway, warmup);

        // Bind listener (port 0 = random port for testing)
        let address = format!("{}:{}", settings.server.host, settings.server.port);
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("{} listening on port {}", settings.server.service_name, port);

        Ok(Self {
            port,
            listener,
            state,
            bus: None,
            ping_responder: None,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run until SIGINT/SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves, then release the bus.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.state);

        let served = axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        if let Err(e) = &served {
            tracing::error!("Server error: {}", e);
        }

        release_bus(self.ping_responder, self.bus.as_deref()).await;

        tracing::info!("Shutdown complete");
        served
    }
}

/// Stop answering pings, then close the bus.
async fn release_bus(ping_responder: Option<JoinHandle<()>>, bus: Option<&BusConnection>) {
    if let Some(responder) = ping_responder {
        responder.abort();
    }
    if let Some(bus) = bus {
        bus.close().await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_release_bus_stops_the_responder() {
        let (alive, stopped) = oneshot::channel::<()>();
        let responder = tokio::spawn(async move {
            let _alive = alive;
            std::future::pending::<()>().await;
        });
        let bus = BusConnection::disconnected();

        release_bus(Some(responder), Some(&bus)).await;

        // The sender is dropped once the aborted task is torn down.
        assert!(stopped.await.is_err());
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_registry() {
        use crate::config::{ObservabilitySettings, ServerSettings, WarmupSettings};
        use crate::services::registry::ServiceDescriptor;
        use service_core::bus::InMemoryBus;
        use service_core::config::BusConfig;

        let settings = Settings {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 0,
                service_name: "bff-gateway-test".to_string(),
            },
            bus: BusConfig::default(),
            warmup: WarmupSettings {
                http_timeout_ms: 100,
                bus_timeout_ms: 100,
            },
            observability: ObservabilitySettings::default(),
            services: vec![
                ServiceDescriptor::http_only("dup", "http://a:1"),
                ServiceDescriptor::http_only("dup", "http://b:1"),
            ],
        };

        let result = Application::build_with_transport(settings, Arc::new(InMemoryBus::new())).await;
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
