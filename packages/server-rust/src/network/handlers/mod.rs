//! HTTP handler definitions for the service binding.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports the handler functions used when building the
//! router.

pub mod service;

pub use service::{rest_handler, service_handler, ServiceTarget};

use std::sync::Arc;

use super::NetworkConfig;
use crate::auth::TokenAuthority;
use crate::service::ServiceRouter;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Router resolving calls against the service registry.
    pub router: ServiceRouter,
    /// Verifies bearer tokens; without one every caller is anonymous.
    pub authority: Option<Arc<TokenAuthority>>,
    /// HTTP binding configuration.
    pub config: Arc<NetworkConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(router: ServiceRouter, config: NetworkConfig) -> Self {
        Self {
            router,
            authority: None,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn with_authority(mut self, authority: Arc<TokenAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }
}
