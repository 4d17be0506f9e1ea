//! The seam between the RPC gateway and whatever actually moves bytes.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failures a transport can report for a single exchange.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// No usable connection: never connected, reconnect exhausted, refused,
    /// or nobody is subscribed to the subject.
    #[error("bus unavailable: {0}")]
    Unavailable(String),

    /// The transport gave up waiting on its own.
    #[error("bus request timed out")]
    TimedOut,

    /// The responder signalled a failure out of band and attached a message.
    #[error("{0}")]
    Remote(String),

    #[error("bus error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, TransportError::Unavailable(_))
    }

    /// Free text attached to the failure, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            TransportError::Unavailable(msg)
            | TransportError::Remote(msg)
            | TransportError::Other(msg) => Some(msg),
            TransportError::TimedOut => None,
        }
    }
}

/// Request/reply and publish primitives over the message bus.
///
/// Implementations own correlation: each `request` call receives exactly the
/// reply addressed to it.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Publish `payload` on `subject` and wait for one reply.
    async fn request(&self, subject: &str, payload: Bytes) -> Result<Bytes, TransportError>;

    /// Publish `payload` on `subject` without waiting for anything.
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Whether requests can currently be attempted.
    fn is_connected(&self) -> bool {
        true
    }
}
