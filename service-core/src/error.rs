use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Code raised when a bus reply does not arrive before the caller's deadline.
pub const SYSTEM_TIMEOUT: &str = "SYSTEM_TIMEOUT";
/// Code raised when the bus cannot be reached.
pub const SYSTEM_UNAVAILABLE: &str = "SYSTEM_UNAVAILABLE";
/// Code raised for failures nothing else recognised.
pub const SYSTEM_INTERNAL: &str = "SYSTEM_INTERNAL";

/// A classified failure of a bus call.
///
/// Every error that leaves the RPC gateway has this shape: an HTTP-like status,
/// the originating error code and message, and optional details carried
/// verbatim from the domain service.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("[{code}] {message}")]
pub struct RpcError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

impl RpcError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<Value>) -> Self {
        self.details = details;
        self
    }

    pub fn timeout(subject: &str, after: Duration) -> Self {
        Self::new(
            StatusCode::REQUEST_TIMEOUT,
            SYSTEM_TIMEOUT,
            format!(
                "No reply on '{}' within {}ms",
                subject,
                after.as_millis()
            ),
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, SYSTEM_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, SYSTEM_INTERNAL, message)
    }

    pub fn is_timeout(&self) -> bool {
        self.code == SYSTEM_TIMEOUT
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    success: bool,
    error: ErrorBody<'a>,
    timestamp: String,
}

fn error_response(
    status: StatusCode,
    code: &str,
    message: &str,
    details: Option<&Value>,
) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: ErrorBody {
                code,
                message,
                details,
            },
            timestamp: Utc::now().to_rfc3339(),
        }),
    )
        .into_response()
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        error_response(
            self.status,
            &self.code,
            &self.message,
            self.details.as_ref(),
        )
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("Bus connection error: {0}")]
    BusConnection(String),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Rpc(err) => err.into_response(),
            AppError::BusConnection(msg) => {
                tracing::error!(error = %msg, "Bus connection error");
                error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    SYSTEM_UNAVAILABLE,
                    "Service unavailable",
                    None,
                )
            }
            AppError::InternalError(err) => {
                tracing::error!(error = ?err, "Internal error");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    SYSTEM_INTERNAL,
                    "Internal server error",
                    None,
                )
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    SYSTEM_INTERNAL,
                    "Configuration error",
                    None,
                )
            }
        }
    }
}
