//! Turns every way a bus call can fail into one [`RpcError`].
//!
//! Resolution order, first match wins:
//!
//! 1. timeout → 408 `SYSTEM_TIMEOUT`
//! 2. declared error envelope → status from [`error_codes`](super::error_codes),
//!    code/message/details preserved (with a legacy fallback that parses an
//!    envelope out of an error message string)
//! 3. connectivity fault → 503 `SYSTEM_UNAVAILABLE`
//! 4. anything else → 500 `SYSTEM_INTERNAL`, logged at error level

use super::envelope::{DeclaredError, legacy_declared_error_from_message};
use super::error_codes::status_for_code;
use super::transport::TransportError;
use crate::error::RpcError;
use serde_json::Value;
use std::time::Duration;

/// Raw outcome of a failed exchange, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcFailure {
    /// The caller's deadline elapsed first.
    Timeout { after: Duration },
    /// The reply was a declared error envelope.
    Declared(DeclaredError),
    /// The reply said `success: false` but carried no usable error object.
    MalformedEnvelope(Value),
    Transport(TransportError),
    /// The payload could not be encoded or the reply could not be decoded.
    Codec(String),
}

impl RpcFailure {
    fn message(&self) -> Option<&str> {
        match self {
            RpcFailure::Transport(err) => err.message(),
            RpcFailure::Codec(msg) => Some(msg),
            RpcFailure::Timeout { .. }
            | RpcFailure::Declared(_)
            | RpcFailure::MalformedEnvelope(_) => None,
        }
    }
}

pub fn translate(failure: &RpcFailure, subject: &str) -> RpcError {
    if let RpcFailure::Timeout { after } = failure {
        return RpcError::timeout(subject, *after);
    }
    if let RpcFailure::Transport(TransportError::TimedOut) = failure {
        return RpcError::new(
            http::StatusCode::REQUEST_TIMEOUT,
            crate::error::SYSTEM_TIMEOUT,
            format!("Bus request on '{}' timed out", subject),
        );
    }

    if let RpcFailure::Declared(declared) = failure {
        return from_declared(declared.clone());
    }

    if let Some(declared) = legacy_envelope(failure) {
        tracing::debug!(
            subject = subject,
            code = %declared.code,
            "Recovered declared error from message text"
        );
        return from_declared(declared);
    }

    if let RpcFailure::Transport(err) = failure
        && err.is_connectivity()
    {
        return RpcError::unavailable(err.to_string());
    }

    tracing::error!(
        subject = subject,
        failure = ?failure,
        "Unclassified bus failure"
    );
    RpcError::internal(match failure.message() {
        Some(msg) => msg.to_string(),
        None => "Internal server error".to_string(),
    })
}

/// Legacy fallback: some producers throw with the envelope serialized into
/// the error message. Kept separate so it can be dropped once they stop.
fn legacy_envelope(failure: &RpcFailure) -> Option<DeclaredError> {
    failure.message().and_then(legacy_declared_error_from_message)
}

fn from_declared(declared: DeclaredError) -> RpcError {
    let status = status_for_code(&declared.code, &declared.message);
    RpcError::new(status, declared.code, declared.message).with_details(declared.details)
}
