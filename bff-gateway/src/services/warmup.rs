//! Concurrent HTTP and bus health probes across every registered service.
//!
//! A run fans out one task per probe, joins them all, and folds the
//! outcomes into a [`WarmupResult`]. A failing or panicking probe only
//! affects its own service's record; the run itself always produces a report.

use crate::services::registry::ServiceRegistry;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::bus::RpcGateway;
use service_core::observability::TracedClientExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const HTTP_ONLY_MESSAGE: &str = "HTTP-only service";
pub const INVALID_PONG_MESSAGE: &str = "Invalid response";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Ok,
    Error,
    Skipped,
}

/// Which probes a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupMode {
    Full,
    HttpOnly,
    BusOnly,
}

impl WarmupMode {
    fn as_str(self) -> &'static str {
        match self {
            WarmupMode::Full => "full",
            WarmupMode::HttpOnly => "http",
            WarmupMode::BusOnly => "bus",
        }
    }
}

/// Result of one probe against one service.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    pub response_time_ms: u64,
    pub message: Option<String>,
}

impl ProbeOutcome {
    fn ok(elapsed: Duration) -> Self {
        Self {
            status: ProbeStatus::Ok,
            response_time_ms: elapsed.as_millis() as u64,
            message: None,
        }
    }

    fn error(elapsed: Duration, message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Error,
            response_time_ms: elapsed.as_millis() as u64,
            message: Some(message.into()),
        }
    }

    fn skipped(message: Option<&str>) -> Self {
        Self {
            status: ProbeStatus::Skipped,
            response_time_ms: 0,
            message: message.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub name: String,
    pub http_status: ProbeStatus,
    pub http_response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_message: Option<String>,
    pub bus_status: ProbeStatus,
    pub bus_response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_message: Option<String>,
}

impl ServiceHealth {
    fn from_outcomes(name: &str, http: ProbeOutcome, bus: ProbeOutcome) -> Self {
        Self {
            name: name.to_string(),
            http_status: http.status,
            http_response_time_ms: http.response_time_ms,
            http_message: http.message,
            bus_status: bus.status,
            bus_response_time_ms: bus.response_time_ms,
            bus_message: bus.message,
        }
    }

    /// HTTP answered and the bus did not fail.
    pub fn is_fully_healthy(&self) -> bool {
        self.http_status == ProbeStatus::Ok && self.bus_status != ProbeStatus::Error
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmupSummary {
    pub total: usize,
    pub http_healthy: usize,
    pub bus_healthy: usize,
    pub fully_healthy: usize,
    pub total_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmupResult {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub services: Vec<ServiceHealth>,
    pub summary: WarmupSummary,
    pub bus_connected: bool,
}

#[derive(Serialize)]
struct PingRequest {
    ping: bool,
    timestamp: DateTime<Utc>,
}

pub struct WarmupService {
    registry: Arc<ServiceRegistry>,
    gateway: RpcGateway,
    http_client: reqwest::Client,
    http_timeout: Duration,
    bus_timeout: Duration,
}

impl WarmupService {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        gateway: RpcGateway,
        http_timeout: Duration,
        bus_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            gateway,
            http_client: reqwest::Client::new(),
            http_timeout,
            bus_timeout,
        }
    }

    /// Probe every registered service. Never fails; problems are reported
    /// per service inside the result.
    #[tracing::instrument(name = "warmup", skip_all, fields(mode = mode.as_str()))]
    pub async fn run(&self, mode: WarmupMode) -> WarmupResult {
        let started = Instant::now();
        info!(services = self.registry.len(), "Starting warmup");

        let (mut http, mut bus) = match mode {
            WarmupMode::Full => tokio::join!(self.probe_http(), self.probe_bus()),
            WarmupMode::HttpOnly => (self.probe_http().await, HashMap::new()),
            WarmupMode::BusOnly => (HashMap::new(), self.probe_bus().await),
        };

        let services = self
            .registry
            .services()
            .iter()
            .map(|service| {
                let http_outcome = http
                    .remove(&service.name)
                    .unwrap_or_else(|| ProbeOutcome::skipped(None));
                let bus_outcome = bus
                    .remove(&service.name)
                    .unwrap_or_else(|| skipped_bus_outcome(service.is_bus_participant));
                ServiceHealth::from_outcomes(&service.name, http_outcome, bus_outcome)
            })
            .collect();

        let result = aggregate(
            mode,
            services,
            self.registry.bus_participant_count(),
            started.elapsed(),
        );

        counter!(
            "warmup_runs_total",
            "mode" => mode.as_str(),
            "success" => result.success.to_string()
        )
        .increment(1);
        histogram!("warmup_duration_seconds", "mode" => mode.as_str())
            .record(started.elapsed().as_secs_f64());

        info!(
            total_time_ms = result.summary.total_time_ms,
            http_healthy = result.summary.http_healthy,
            bus_healthy = result.summary.bus_healthy,
            fully_healthy = result.summary.fully_healthy,
            total = result.summary.total,
            "Warmup completed"
        );

        result
    }

    async fn probe_http(&self) -> HashMap<String, ProbeOutcome> {
        let handles = self
            .registry
            .services()
            .iter()
            .map(|service| {
                let client = self.http_client.clone();
                let name = service.name.clone();
                let url = service.health_url();
                let timeout = self.http_timeout;
                let handle = tokio::spawn(async move { http_probe(&client, &name, &url, timeout).await });
                (service.name.clone(), handle)
            })
            .collect();

        collect_outcomes("http", handles).await
    }

    async fn probe_bus(&self) -> HashMap<String, ProbeOutcome> {
        let mut outcomes = HashMap::new();
        let mut handles = Vec::new();

        for service in self.registry.services() {
            let Some(subject) = service.ping_subject() else {
                debug!(service = %service.name, "Bus probe skipped for HTTP-only service");
                outcomes.insert(service.name.clone(), skipped_bus_outcome(false));
                continue;
            };

            let gateway = self.gateway.clone();
            let name = service.name.clone();
            let subject = subject.to_string();
            let timeout = self.bus_timeout;
            let handle =
                tokio::spawn(async move { bus_probe(&gateway, &name, &subject, timeout).await });
            handles.push((service.name.clone(), handle));
        }

        outcomes.extend(collect_outcomes("bus", handles).await);
        outcomes
    }
}

fn skipped_bus_outcome(is_bus_participant: bool) -> ProbeOutcome {
    if is_bus_participant {
        ProbeOutcome::skipped(None)
    } else {
        ProbeOutcome::skipped(Some(HTTP_ONLY_MESSAGE))
    }
}

async fn http_probe(client: &reqwest::Client, name: &str, url: &str, timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();
    let result = client.traced_get(url).timeout(timeout).send().await;
    let elapsed = start.elapsed();

    match result {
        Ok(response) if response.status().is_success() => {
            debug!(service = name, response_time_ms = elapsed.as_millis() as u64, "HTTP probe ok");
            ProbeOutcome::ok(elapsed)
        }
        Ok(response) => {
            let status = response.status().as_u16();
            warn!(service = name, status = status, "HTTP probe returned non-success status");
            ProbeOutcome::error(elapsed, format!("HTTP {}", status))
        }
        Err(e) if e.is_timeout() => {
            error!(service = name, timeout_ms = timeout.as_millis() as u64, "HTTP probe timed out");
            ProbeOutcome::error(elapsed, format!("Timed out after {}ms", timeout.as_millis()))
        }
        Err(e) => {
            error!(service = name, error = %e, "HTTP probe failed");
            ProbeOutcome::error(elapsed, e.to_string())
        }
    }
}

async fn bus_probe(gateway: &RpcGateway, name: &str, subject: &str, timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();
    let ping = PingRequest {
        ping: true,
        timestamp: Utc::now(),
    };
    let result = gateway.send::<_, Value>(subject, &ping, timeout).await;
    let elapsed = start.elapsed();

    match result {
        Ok(reply) if reply.get("pong") == Some(&Value::Bool(true)) => {
            debug!(service = name, response_time_ms = elapsed.as_millis() as u64, "Bus probe pong");
            ProbeOutcome::ok(elapsed)
        }
        Ok(_) => {
            warn!(service = name, subject = subject, "Bus probe got an invalid reply");
            ProbeOutcome::error(elapsed, INVALID_PONG_MESSAGE)
        }
        Err(e) => {
            error!(service = name, subject = subject, code = %e.code, error = %e.message, "Bus probe failed");
            ProbeOutcome::error(elapsed, e.message)
        }
    }
}

/// Join every probe task. A task that panicked or was cancelled becomes an
/// error for its own service.
async fn collect_outcomes(
    kind: &'static str,
    handles: Vec<(String, JoinHandle<ProbeOutcome>)>,
) -> HashMap<String, ProbeOutcome> {
    let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();

    names
        .into_iter()
        .zip(join_all(handles).await)
        .map(|(name, joined)| {
            let outcome = joined.unwrap_or_else(|e| {
                error!(service = %name, probe = kind, error = %e, "Probe task failed");
                ProbeOutcome::error(Duration::ZERO, format!("Probe task failed: {}", e))
            });
            (name, outcome)
        })
        .collect()
}

/// Fold per-service records into a result.
///
/// A bus-only run never probes HTTP, so there only a pong counts as fully
/// healthy.
pub fn aggregate(
    mode: WarmupMode,
    services: Vec<ServiceHealth>,
    bus_participants: usize,
    elapsed: Duration,
) -> WarmupResult {
    let total = services.len();
    let http_healthy = services
        .iter()
        .filter(|s| s.http_status == ProbeStatus::Ok)
        .count();
    let bus_healthy = services
        .iter()
        .filter(|s| s.bus_status == ProbeStatus::Ok)
        .count();
    let fully_healthy = match mode {
        WarmupMode::BusOnly => bus_healthy,
        WarmupMode::Full | WarmupMode::HttpOnly => {
            services.iter().filter(|s| s.is_fully_healthy()).count()
        }
    };

    WarmupResult {
        success: fully_healthy == total,
        timestamp: Utc::now(),
        services,
        summary: WarmupSummary {
            total,
            http_healthy,
            bus_healthy,
            fully_healthy,
            total_time_ms: elapsed.as_millis() as u64,
        },
        bus_connected: bus_healthy == bus_participants,
    }
}
