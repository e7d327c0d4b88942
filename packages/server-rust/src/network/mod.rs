//! HTTP binding: configuration, middleware, handlers and router assembly.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use config::NetworkConfig;
pub use handlers::AppState;
pub use middleware::with_http_layers;
pub use module::build_router;
