//! Service routing: resolves a [`ServiceCall`] to its definition and runs it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::debug;
use waymark_core::RunnerStat;

use super::operation::{RunnerError, ServiceCall};
use super::runner::{RunOptions, Runner};

/// Boxed future returned by every service in the pipeline.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<RunnerStat, RunnerError>> + Send>>;

// ---------------------------------------------------------------------------
// ServiceRouter
// ---------------------------------------------------------------------------

/// Routes [`ServiceCall`] values to registered definitions by `(name, module)`.
///
/// Calls naming an unregistered definition return `RunnerError::UnknownService`.
/// Cloning is cheap; every clone shares the same [`Runner`].
#[derive(Debug, Clone)]
pub struct ServiceRouter {
    runner: Arc<Runner>,
}

impl ServiceRouter {
    #[must_use]
    pub fn new(runner: Arc<Runner>) -> Self {
        Self { runner }
    }

    #[must_use]
    pub fn runner(&self) -> &Arc<Runner> {
        &self.runner
    }
}

impl Service<ServiceCall> for ServiceRouter {
    type Response = RunnerStat;
    type Error = RunnerError;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The runner holds no per-call state, so it is always ready.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: ServiceCall) -> Self::Future {
        let runner = Arc::clone(&self.runner);
        Box::pin(async move {
            let ServiceCall {
                call_id,
                name,
                mut scope,
                args,
                flags,
                policy_extractors,
                ..
            } = call;
            if scope.module.is_empty() {
                scope.module.clone_from(&runner.config().default_module);
            }

            let definition = runner
                .registry()
                .definition(&name, &scope.module)
                .ok_or_else(|| RunnerError::UnknownService {
                    name: name.clone(),
                    module: scope.module.clone(),
                })?;
            debug!(%call_id, service = %name, "dispatching service call");

            let options = RunOptions {
                flags,
                policy_extractors,
                scope,
                depth: 0,
            };
            runner.execute(&definition, args, options).await
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tower::ServiceExt;
    use waymark_core::{AliasMode, InvocationArgs, JsonSchemaValidator, ServiceScope, Verb};

    use super::*;
    use crate::service::config::RunnerConfig;
    use crate::service::context::ModuleContext;
    use crate::service::definition::ServiceDefinition;
    use crate::service::registry::{ServiceRegistry, ServiceRoute};

    fn named(name: &'static str) -> ServiceDefinition {
        ServiceDefinition::new(name, move |b| {
            b.define_logic(move |ctx| {
                Box::pin(async move { Ok(ctx.success(json!({ "service": name }), None)) })
            });
        })
    }

    fn router() -> ServiceRouter {
        let registry = ServiceRegistry::new();
        registry.register(None, named("list_orders"), [ServiceRoute::rest(Verb::Get, "/orders")]);
        registry.register(None, named("get_order"), [ServiceRoute::rest(Verb::Get, "/orders/:id")]);
        registry.register(Some("admin"), named("refund_order"), Vec::<ServiceRoute>::new());
        let runner = Runner::new(
            Arc::new(registry),
            Arc::new(ModuleContext::new()),
            Arc::new(JsonSchemaValidator),
            Arc::new(RunnerConfig::default()),
        );
        ServiceRouter::new(Arc::new(runner))
    }

    #[tokio::test]
    async fn routes_to_registered_service() {
        let stat = router()
            .oneshot(ServiceCall::new("list_orders", InvocationArgs::default()))
            .await
            .unwrap();
        assert_eq!(stat.response_code, Some(200));
        assert_eq!(stat.result.meta.unwrap()["service"], "list_orders");
    }

    #[tokio::test]
    async fn unknown_service_returns_error() {
        let err = router()
            .oneshot(ServiceCall::new("nonexistent", InvocationArgs::default()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RunnerError::UnknownService { name, .. } if name == "nonexistent"
        ));
    }

    #[tokio::test]
    async fn routes_to_correct_service_among_multiple() {
        let mut router = router();

        let call = ServiceCall::new("get_order", InvocationArgs::default());
        let stat = ServiceExt::ready(&mut router).await.unwrap().call(call).await.unwrap();
        assert_eq!(stat.result.meta.unwrap()["service"], "get_order");

        let call = ServiceCall::new("refund_order", InvocationArgs::default())
            .in_scope(ServiceScope::new("admin", AliasMode::Service));
        let stat = ServiceExt::ready(&mut router).await.unwrap().call(call).await.unwrap();
        assert_eq!(stat.result.meta.unwrap()["service"], "refund_order");
    }

    #[tokio::test]
    async fn definitions_are_scoped_to_their_module() {
        let call = ServiceCall::new("refund_order", InvocationArgs::default());
        let err = router().oneshot(call).await.unwrap_err();
        assert!(matches!(err, RunnerError::UnknownService { module, .. } if module == "default"));
    }
}
