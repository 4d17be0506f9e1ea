pub mod metrics;
pub mod registry;
pub mod warmup;

pub use registry::{ServiceDescriptor, ServiceRegistry};
pub use warmup::{WarmupMode, WarmupResult, WarmupService};
