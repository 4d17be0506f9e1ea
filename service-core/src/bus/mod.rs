//! RPC over the message bus: connection, request/reply gateway and error
//! classification.

pub mod connection;
pub mod envelope;
pub mod error_codes;
pub mod gateway;
pub mod memory;
pub mod reconnect;
pub mod responder;
pub mod timeouts;
pub mod transport;
pub mod translator;

pub use connection::BusConnection;
pub use envelope::{DeclaredError, ErrorEnvelope, RequestEnvelope};
pub use gateway::RpcGateway;
pub use memory::InMemoryBus;
pub use responder::Pong;
pub use timeouts::TimeoutTier;
pub use transport::{BusTransport, TransportError};
pub use translator::{RpcFailure, translate};
