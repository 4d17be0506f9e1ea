//! service-core: Shared infrastructure for the bus-backed BFF gateway.
pub mod bus;
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

pub use async_nats;
pub use async_trait;
pub use axum;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tower_http;
pub use tracing;
