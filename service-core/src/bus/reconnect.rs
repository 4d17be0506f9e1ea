//! Connection-level retry policy for the bus client.
//!
//! This governs establishing and re-establishing the connection only.
//! Individual requests are never retried.

use crate::config::BusConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Configuration for reconnect behavior.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    /// Maximum number of connection attempts.
    pub max_attempts: usize,
    /// Backoff before the second attempt.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff duration.
    pub add_jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &BusConfig) -> Self {
        Self {
            max_attempts: config.max_reconnects.max(1),
            initial_backoff: config.reconnect_wait(),
            max_backoff: config.max_reconnect_wait(),
            ..Default::default()
        }
    }

    /// Delay to wait after `attempt` consecutive failures (zero-based).
    pub fn backoff_duration(&self, attempt: usize) -> Duration {
        let exponent = attempt.min(i32::MAX as usize) as i32;
        let backoff =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let backoff_ms = backoff.min(self.max_backoff.as_millis() as f64) as u64;

        let mut duration = Duration::from_millis(backoff_ms);

        if self.add_jitter {
            // Add up to 25% jitter
            let jitter = (backoff_ms as f64 * 0.25 * rand::thread_rng().gen_range(0.0..1.0)) as u64;
            duration += Duration::from_millis(jitter);
        }

        duration
    }
}

/// Run `connect` until it succeeds or the policy's attempts are used up.
pub async fn connect_with_backoff<F, Fut, T, E>(
    policy: &ReconnectPolicy,
    server: &str,
    connect: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match connect().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(server = server, attempt = attempt + 1, "Bus connected after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt + 1 >= policy.max_attempts {
                    warn!(
                        server = server,
                        attempts = attempt + 1,
                        error = %err,
                        "Bus connection failed after max attempts"
                    );
                    return Err(err);
                }

                let backoff = policy.backoff_duration(attempt);
                warn!(
                    server = server,
                    attempt = attempt + 1,
                    error = %err,
                    backoff_ms = backoff.as_millis() as u64,
                    "Bus connection failed, retrying after backoff"
                );

                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
