//! Pipeline composition: combines all middleware layers into a single service stack.

use tower::ServiceBuilder;
use waymark_core::RunnerStat;

use super::metrics::MetricsLayer;
use super::timeout::TimeoutLayer;
use crate::service::config::RunnerConfig;
use crate::service::operation::{RunnerError, ServiceCall};
use crate::service::router::{ServiceFuture, ServiceRouter};

/// Build the service pipeline by wrapping the [`ServiceRouter`] with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- record timing and outcome, timeouts included
/// 2. `TimeoutLayer` -- enforce per-call timeouts
///
/// The returned service implements `tower::Service<ServiceCall>` and is `Clone`,
/// so each request handler can drive its own copy.
#[must_use]
pub fn build_service_pipeline(
    router: ServiceRouter,
    config: &RunnerConfig,
) -> impl tower::Service<ServiceCall, Response = RunnerStat, Error = RunnerError, Future = ServiceFuture>
       + Clone
       + Send
       + 'static {
    ServiceBuilder::new()
        .layer(MetricsLayer)
        .layer(TimeoutLayer::new(config.default_call_timeout_ms))
        .service(router)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tower::ServiceExt;
    use waymark_core::{InvocationArgs, JsonSchemaValidator};

    use super::*;
    use crate::service::context::ModuleContext;
    use crate::service::definition::ServiceDefinition;
    use crate::service::registry::ServiceRegistry;
    use crate::service::runner::Runner;

    fn router(registry: ServiceRegistry, config: &RunnerConfig) -> ServiceRouter {
        let runner = Runner::new(
            Arc::new(registry),
            Arc::new(ModuleContext::new()),
            Arc::new(JsonSchemaValidator),
            Arc::new(config.clone()),
        );
        ServiceRouter::new(Arc::new(runner))
    }

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let registry = ServiceRegistry::new();
        registry.register(
            None,
            ServiceDefinition::new("hello", |b| {
                b.define_logic(|ctx| Box::pin(async move { Ok(ctx.success(json!({"hi": 1}), None)) }));
            }),
            Vec::new(),
        );
        let config = RunnerConfig::default();

        let svc = build_service_pipeline(router(registry, &config), &config);
        let stat = svc
            .oneshot(ServiceCall::new("hello", InvocationArgs::default()))
            .await
            .unwrap();
        assert_eq!(stat.response_code, Some(200));
    }

    #[tokio::test]
    async fn slow_logic_times_out() {
        let registry = ServiceRegistry::new();
        registry.register(
            None,
            ServiceDefinition::new("slow", |b| {
                b.define_logic(|ctx| {
                    Box::pin(async move {
                        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                        Ok(ctx.success(json!({}), None))
                    })
                });
            }),
            Vec::new(),
        );
        let config = RunnerConfig {
            default_call_timeout_ms: 20,
            ..RunnerConfig::default()
        };

        let svc = build_service_pipeline(router(registry, &config), &config);
        let err = svc
            .oneshot(ServiceCall::new("slow", InvocationArgs::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { timeout_ms: 20 }));
    }
}
