//! Static catalogue of the services the gateway probes.

use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Base URL; the health probe hits `{http_url}/health`.
    pub http_url: String,
    #[serde(default)]
    pub bus_ping_subject: Option<String>,
    #[serde(default)]
    pub is_bus_participant: bool,
}

impl ServiceDescriptor {
    pub fn bus_participant(
        name: impl Into<String>,
        http_url: impl Into<String>,
        ping_subject: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            http_url: http_url.into(),
            bus_ping_subject: Some(ping_subject.into()),
            is_bus_participant: true,
        }
    }

    pub fn http_only(name: impl Into<String>, http_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            http_url: http_url.into(),
            bus_ping_subject: None,
            is_bus_participant: false,
        }
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.http_url.trim_end_matches('/'))
    }

    /// Environment variable that overrides `http_url`, e.g. `AUTH_SERVICE_URL`.
    pub fn url_override_var(&self) -> String {
        format!("{}_URL", self.name.to_uppercase().replace('-', "_"))
    }

    /// The subject to ping, if this service takes part in the bus.
    pub fn ping_subject(&self) -> Option<&str> {
        if self.is_bus_participant {
            self.bus_ping_subject.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service #{0} has an empty name")]
    EmptyName(usize),

    #[error("service '{0}' is registered more than once")]
    DuplicateName(String),

    #[error("service '{0}' takes part in the bus but has no ping subject")]
    MissingPingSubject(String),

    #[error("service '{0}' has a ping subject but does not take part in the bus")]
    UnexpectedPingSubject(String),

    #[error("service '{name}' has an invalid http_url '{url}'")]
    InvalidUrl { name: String, url: String },
}

/// Validated, immutable list of service descriptors in configuration order.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<ServiceDescriptor>,
}

impl ServiceRegistry {
    pub fn new(services: Vec<ServiceDescriptor>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();

        for (index, service) in services.iter().enumerate() {
            if service.name.trim().is_empty() {
                return Err(RegistryError::EmptyName(index));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(RegistryError::DuplicateName(service.name.clone()));
            }

            let has_subject = service
                .bus_ping_subject
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty());
            match (service.is_bus_participant, has_subject) {
                (true, false) => {
                    return Err(RegistryError::MissingPingSubject(service.name.clone()));
                }
                (false, true) => {
                    return Err(RegistryError::UnexpectedPingSubject(service.name.clone()));
                }
                _ => {}
            }

            let valid_url = reqwest::Url::parse(&service.http_url)
                .is_ok_and(|url| matches!(url.scheme(), "http" | "https"));
            if !valid_url {
                return Err(RegistryError::InvalidUrl {
                    name: service.name.clone(),
                    url: service.http_url.clone(),
                });
            }
        }

        Ok(Self { services })
    }

    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn bus_participant_count(&self) -> usize {
        self.services.iter().filter(|s| s.is_bus_participant).count()
    }
}

/// Replace `http_url` for every service whose override variable is set.
pub fn apply_url_overrides<F>(services: &mut [ServiceDescriptor], lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for service in services.iter_mut() {
        let var = service.url_override_var();
        if let Some(url) = lookup(&var).filter(|u| !u.trim().is_empty()) {
            tracing::debug!(service = %service.name, var = %var, "Service URL overridden from environment");
            service.http_url = url;
        }
    }
}
