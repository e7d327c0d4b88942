//! Tower middleware layers for the service pipeline.
//!
//! - [`timeout`]: Per-call timeout enforcement
//! - [`metrics`]: Call timing and counting via `tracing` spans and the `metrics` facade
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use metrics::MetricsLayer;
pub use pipeline::build_service_pipeline;
pub use timeout::TimeoutLayer;
