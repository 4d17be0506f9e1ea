//! Wire shapes exchanged with domain services.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing request: the caller's payload with an optional credential merged
/// into the same JSON object.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope<P> {
    #[serde(flatten)]
    pub payload: P,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl<P> RequestEnvelope<P> {
    pub fn new(payload: P) -> Self {
        Self {
            payload,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// The `error` object of a declared failure envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// `{ success: false, error: { code, message, details? } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: DeclaredError,
}

impl ErrorEnvelope {
    pub fn new(error: DeclaredError) -> Self {
        Self {
            success: false,
            error,
        }
    }
}

/// How a reply body should be treated.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Anything that is not a failure envelope; handed back to the caller.
    Success(Value),
    /// A well-formed declared error.
    Declared(DeclaredError),
    /// `success: false` without a usable `error.code`/`error.message`.
    Malformed(Value),
}

impl Reply {
    pub fn classify(value: Value) -> Self {
        if value.get("success") != Some(&Value::Bool(false)) {
            return Reply::Success(value);
        }
        match declared_error(&value) {
            Some(error) => Reply::Declared(error),
            None => Reply::Malformed(value),
        }
    }
}

/// Extract the declared error from an already-parsed failure envelope.
pub fn declared_error(value: &Value) -> Option<DeclaredError> {
    if value.get("success") != Some(&Value::Bool(false)) {
        return None;
    }
    let error = value.get("error")?.as_object()?;
    let code = error.get("code")?.as_str()?;
    let message = error.get("message")?.as_str()?;
    let details = error.get("details").filter(|d| !d.is_null()).cloned();

    Some(DeclaredError {
        code: code.to_string(),
        message: message.to_string(),
        details,
    })
}

/// Compatibility shim for producers that serialize the envelope into an error
/// message string instead of replying with it.
///
/// Returns `None` when the text is not JSON or not an envelope.
pub fn legacy_declared_error_from_message(message: &str) -> Option<DeclaredError> {
    let value: Value = serde_json::from_str(message.trim()).ok()?;
    declared_error(&value)
}
