//! Long-lived NATS connection shared by the whole process.
//!
//! Constructed once by the entry point, handed out by `Arc`, and closed
//! explicitly on shutdown.

use super::reconnect::{ReconnectPolicy, connect_with_backoff};
use super::responder::spawn_ping_responder;
use super::transport::{BusTransport, TransportError};
use crate::config::BusConfig;
use crate::error::AppError;
use crate::observability::trace_context::{TRACEPARENT_HEADER, current_traceparent};
use async_nats::connection::State;
use async_nats::{Client, ConnectOptions, Event, HeaderMap, RequestErrorKind};
use async_trait::async_trait;
use bytes::Bytes;
use secrecy::ExposeSecret;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Header a NATS service responder sets when it answers with an error.
const SERVICE_ERROR_HEADER: &str = "Nats-Service-Error";

pub struct BusConnection {
    client: Option<Client>,
}

impl BusConnection {
    /// Connect to the configured servers.
    ///
    /// Initial connect is retried per [`ReconnectPolicy`]; later drops are
    /// handled by the client with the same bounded policy.
    pub async fn connect(config: &BusConfig) -> Result<Self, AppError> {
        let servers = config.servers();
        if servers.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "bus.url must name at least one server"
            )));
        }

        let policy = ReconnectPolicy::from_config(config);
        let target = servers.join(",");

        let client = connect_with_backoff(&policy, &target, || {
            async_nats::connect_with_options(servers.clone(), connect_options(config, &policy))
        })
        .await
        .map_err(|e| AppError::BusConnection(format!("{}: {}", target, e)))?;

        info!(servers = %target, client_name = %config.client_name, "Connected to message bus");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Connect, or fall back to a disconnected handle when the bus is optional.
    pub async fn connect_or_degrade(config: &BusConfig) -> Result<Self, AppError> {
        match Self::connect(config).await {
            Ok(connection) => Ok(connection),
            Err(AppError::BusConnection(msg)) if !config.required => {
                error!(
                    error = %msg,
                    "Message bus unreachable; continuing without it, bus calls will fail as unavailable"
                );
                Ok(Self::disconnected())
            }
            Err(e) => Err(e),
        }
    }

    /// A handle that never had a connection.
    pub fn disconnected() -> Self {
        Self { client: None }
    }

    /// Answer pings on `subject` as `service` for the life of the connection.
    pub async fn serve_ping(
        &self,
        subject: &str,
        service: &str,
    ) -> Result<JoinHandle<()>, AppError> {
        let client = self
            .client
            .clone()
            .ok_or_else(|| AppError::BusConnection("not connected".to_string()))?;
        spawn_ping_responder(client, subject.to_string(), service.to_string()).await
    }

    /// Flush buffered messages. The socket is released when the last
    /// handle is dropped.
    pub async fn close(&self) {
        let Some(client) = &self.client else {
            return;
        };
        if let Err(e) = client.flush().await {
            warn!(error = %e, "Failed to flush bus connection on close");
        }
        info!("Message bus connection closed");
    }

    fn usable_client(&self) -> Result<&Client, TransportError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| TransportError::Unavailable("bus not connected".to_string()))?;

        match client.connection_state() {
            State::Connected => Ok(client),
            state => Err(TransportError::Unavailable(format!(
                "bus connection is {:?}",
                state
            ))),
        }
    }
}

fn connect_options(config: &BusConfig, policy: &ReconnectPolicy) -> ConnectOptions {
    let delay_policy = policy.clone();

    let mut options = ConnectOptions::new()
        .name(&config.client_name)
        .max_reconnects(Some(policy.max_attempts))
        .reconnect_delay_callback(move |attempts| delay_policy.backoff_duration(attempts))
        // Deadlines are enforced per call by the gateway.
        .request_timeout(None)
        .event_callback(|event| async move {
            match event {
                Event::Connected => info!("Bus connection (re)established"),
                Event::Disconnected => warn!("Bus connection dropped, reconnecting"),
                other => debug!(event = %other, "Bus connection event"),
            }
        });

    if let Some(token) = &config.token {
        options = options.token(token.expose_secret().clone());
    }

    options
}

fn trace_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(traceparent) = current_traceparent() {
        headers.insert(TRACEPARENT_HEADER, traceparent.as_str());
    }
    headers
}

#[async_trait]
impl BusTransport for BusConnection {
    async fn request(&self, subject: &str, payload: Bytes) -> Result<Bytes, TransportError> {
        let client = self.usable_client()?;

        let message = client
            .request_with_headers(subject.to_string(), trace_headers(), payload)
            .await
            .map_err(|e| match e.kind() {
                RequestErrorKind::TimedOut => TransportError::TimedOut,
                RequestErrorKind::NoResponders => {
                    TransportError::Unavailable(format!("no responders on '{}'", subject))
                }
                RequestErrorKind::Other => TransportError::Other(e.to_string()),
            })?;

        if let Some(service_error) = message
            .headers
            .as_ref()
            .and_then(|h| h.get(SERVICE_ERROR_HEADER))
        {
            return Err(TransportError::Remote(service_error.as_str().to_string()));
        }

        Ok(message.payload)
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        let client = self.usable_client()?;

        client
            .publish_with_headers(subject.to_string(), trace_headers(), payload)
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.client
            .as_ref()
            .is_some_and(|c| matches!(c.connection_state(), State::Connected))
    }
}
