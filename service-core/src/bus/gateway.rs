//! Synchronous request/response over the asynchronous bus.

use super::envelope::{Reply, RequestEnvelope};
use super::timeouts::TimeoutTier;
use super::transport::{BusTransport, TransportError};
use super::translator::{RpcFailure, translate};
use crate::error::RpcError;
use bytes::Bytes;
use metrics::{counter, histogram};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Clone)]
pub struct RpcGateway {
    transport: Arc<dyn BusTransport>,
}

impl RpcGateway {
    pub fn new(transport: Arc<dyn BusTransport>) -> Self {
        Self { transport }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Send `payload` on `subject` and wait at most `timeout` for the reply.
    ///
    /// Never retried. If the timer wins, the pending exchange is dropped and
    /// whatever arrives afterwards is discarded.
    pub async fn send<P, T>(
        &self,
        subject: &str,
        payload: &P,
        timeout: impl Into<Duration>,
    ) -> Result<T, RpcError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let timeout = timeout.into();
        let start = Instant::now();
        let result = self.exchange(subject, payload, timeout).await;
        let elapsed = start.elapsed();

        let outcome = outcome_label(&result);
        counter!(
            "bus_requests_total",
            "subject" => subject.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!("bus_request_duration_seconds", "subject" => subject.to_string())
            .record(elapsed.as_secs_f64());

        match result {
            Ok(value) => {
                info!(
                    subject = subject,
                    duration_ms = elapsed.as_millis() as u64,
                    outcome = outcome,
                    "Bus request completed"
                );
                Ok(value)
            }
            Err(failure) => {
                let err = translate(&failure, subject);
                warn!(
                    subject = subject,
                    duration_ms = elapsed.as_millis() as u64,
                    outcome = outcome,
                    status = err.status.as_u16(),
                    code = %err.code,
                    "Bus request failed"
                );
                Err(err)
            }
        }
    }

    /// [`send`](Self::send) with the default tier.
    pub async fn send_default<P, T>(&self, subject: &str, payload: &P) -> Result<T, RpcError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(subject, payload, TimeoutTier::Default).await
    }

    /// [`send`](Self::send) with the caller's credential merged into the payload.
    pub async fn send_authenticated<P, T>(
        &self,
        subject: &str,
        payload: &P,
        token: &str,
        timeout: impl Into<Duration>,
    ) -> Result<T, RpcError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let envelope = RequestEnvelope::new(payload).with_token(token);
        self.send(subject, &envelope, timeout).await
    }

    /// Fire-and-forget publish. At most once; failures are only logged.
    pub async fn emit<P>(&self, subject: &str, payload: &P)
    where
        P: Serialize + ?Sized,
    {
        let body = match serde_json::to_vec(payload) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                warn!(subject = subject, error = %e, "Failed to encode emitted event");
                return;
            }
        };

        if let Err(e) = self.transport.publish(subject, body).await {
            warn!(subject = subject, error = %e, "Failed to emit event");
        }
    }

    async fn exchange<P, T>(&self, subject: &str, payload: &P, timeout: Duration) -> Result<T, RpcFailure>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(payload)
            .map(Bytes::from)
            .map_err(|e| RpcFailure::Codec(e.to_string()))?;

        let reply = tokio::time::timeout(timeout, self.transport.request(subject, body))
            .await
            .map_err(|_| RpcFailure::Timeout { after: timeout })?
            .map_err(RpcFailure::Transport)?;

        let value: Value = if reply.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&reply).map_err(|e| RpcFailure::Codec(e.to_string()))?
        };

        match Reply::classify(value) {
            Reply::Success(value) => {
                serde_json::from_value(value).map_err(|e| RpcFailure::Codec(e.to_string()))
            }
            Reply::Declared(error) => Err(RpcFailure::Declared(error)),
            Reply::Malformed(value) => Err(RpcFailure::MalformedEnvelope(value)),
        }
    }
}

fn outcome_label<T>(result: &Result<T, RpcFailure>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(RpcFailure::Timeout { .. }) | Err(RpcFailure::Transport(TransportError::TimedOut)) => {
            "timeout"
        }
        Err(RpcFailure::Declared(_)) => "declared_error",
        Err(RpcFailure::Transport(TransportError::Unavailable(_))) => "unavailable",
        Err(_) => "error",
    }
}
