//! Ping responder so peers can probe this process over the bus.

use crate::error::AppError;
use async_nats::Client;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reply to `<family>.ping`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pong {
    pub pong: bool,
    pub service: String,
    pub timestamp: DateTime<Utc>,
}

impl Pong {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            pong: true,
            service: service.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Subscribe to `subject` and answer every request with a [`Pong`].
///
/// The task ends when the subscription closes.
pub async fn spawn_ping_responder(
    client: Client,
    subject: String,
    service: String,
) -> Result<JoinHandle<()>, AppError> {
    let mut subscriber = client
        .subscribe(subject.clone())
        .await
        .map_err(|e| AppError::BusConnection(format!("subscribe to '{}': {}", subject, e)))?;

    info!(subject = %subject, service = %service, "Ping responder listening");

    Ok(tokio::spawn(async move {
        while let Some(message) = subscriber.next().await {
            let Some(reply) = message.reply else {
                debug!(subject = %subject, "Ping without reply subject ignored");
                continue;
            };

            let body = match serde_json::to_vec(&Pong::new(&service)) {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "Failed to encode pong");
                    continue;
                }
            };

            if let Err(e) = client.publish(reply, body.into()).await {
                warn!(subject = %subject, error = %e, "Failed to answer ping");
            }
        }
        debug!(subject = %subject, "Ping responder stopped");
    }))
}
