pub mod config;
pub mod handlers;
pub mod services;
pub mod startup;

use service_core::bus::RpcGateway;
use services::warmup::WarmupService;
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service_name: Arc<str>,
    pub gateway: RpcGateway,
    pub warmup: Arc<WarmupService>,
}

impl AppState {
    pub fn new(service_name: &str, gateway: RpcGateway, warmup: Arc<WarmupService>) -> Self {
        Self {
            service_name: Arc::from(service_name),
            gateway,
            warmup,
        }
    }
}
