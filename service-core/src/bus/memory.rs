//! In-process bus with scripted responders, used by tests across the workspace.

use super::envelope::{DeclaredError, ErrorEnvelope};
use super::transport::{BusTransport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

#[derive(Clone)]
enum Route {
    Reply { body: Bytes, delay: Duration },
    Fail(TransportError),
    /// Never answers.
    Hang,
}

/// A published message recorded by [`InMemoryBus`].
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub subject: String,
    pub payload: Bytes,
}

/// Scriptable stand-in for a broker.
///
/// Subjects without a route behave like a subject nobody subscribed to.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    routes: Arc<RwLock<HashMap<String, Route>>>,
    requests: Arc<RwLock<Vec<Published>>>,
    published: Arc<RwLock<Vec<Published>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(&self, subject: &str, route: Route) {
        write(&self.routes).insert(subject.to_string(), route);
    }

    /// Reply to `subject` with `body` serialized as JSON.
    pub fn reply<T: Serialize>(&self, subject: &str, body: &T) -> &Self {
        self.reply_after(subject, body, Duration::ZERO)
    }

    /// Reply to `subject` after `delay`.
    pub fn reply_after<T: Serialize>(&self, subject: &str, body: &T, delay: Duration) -> &Self {
        let body = serde_json::to_vec(body).map(Bytes::from).unwrap_or_default();
        self.route(subject, Route::Reply { body, delay });
        self
    }

    /// Reply to `subject` with raw bytes.
    pub fn reply_raw(&self, subject: &str, body: impl Into<Bytes>) -> &Self {
        self.route(
            subject,
            Route::Reply {
                body: body.into(),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Answer `subject` with a declared error envelope.
    pub fn reject(&self, subject: &str, code: &str, message: &str) -> &Self {
        let envelope = ErrorEnvelope::new(DeclaredError {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        });
        self.reply(subject, &envelope)
    }

    pub fn fail(&self, subject: &str, error: TransportError) -> &Self {
        self.route(subject, Route::Fail(error));
        self
    }

    pub fn hang(&self, subject: &str) -> &Self {
        self.route(subject, Route::Hang);
        self
    }

    /// Requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<Published> {
        read(&self.requests).clone()
    }

    /// Fire-and-forget messages seen so far, in arrival order.
    pub fn published(&self) -> Vec<Published> {
        read(&self.published).clone()
    }
}

#[async_trait]
impl BusTransport for InMemoryBus {
    async fn request(&self, subject: &str, payload: Bytes) -> Result<Bytes, TransportError> {
        write(&self.requests).push(Published {
            subject: subject.to_string(),
            payload,
        });

        let route = read(&self.routes).get(subject).cloned();

        match route {
            Some(Route::Reply { body, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(body)
            }
            Some(Route::Fail(err)) => Err(err),
            Some(Route::Hang) => std::future::pending().await,
            None => Err(TransportError::Unavailable(format!(
                "no responders on '{}'",
                subject
            ))),
        }
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        write(&self.published).push(Published {
            subject: subject.to_string(),
            payload,
        });
        Ok(())
    }
}

// A panicking test thread must not hide routes or recorded traffic from the rest.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
