//! Timeout middleware for service calls.
//!
//! Rejects calls that exceed their timeout with `RunnerError::Timeout`.

use std::task::{Context, Poll};
use std::time::Duration;

use tower::{Layer, Service};

use crate::service::operation::{RunnerError, ServiceCall};
use crate::service::router::ServiceFuture;
use waymark_core::RunnerStat;

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps services with per-call timeout enforcement.
///
/// The timeout is read from each call's `timeout_ms` field, falling back to the
/// layer's default, so different calls can have different timeouts.
#[derive(Debug, Clone)]
pub struct TimeoutLayer {
    default_timeout_ms: u64,
}

impl TimeoutLayer {
    #[must_use]
    pub fn new(default_timeout_ms: u64) -> Self {
        Self { default_timeout_ms }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            default_timeout_ms: self.default_timeout_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

/// Service wrapper that enforces per-call timeouts.
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
    default_timeout_ms: u64,
}

impl<S> Service<ServiceCall> for TimeoutService<S>
where
    S: Service<ServiceCall, Response = RunnerStat, Error = RunnerError> + Send,
    S::Future: Send + 'static,
{
    type Response = RunnerStat;
    type Error = RunnerError;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: ServiceCall) -> Self::Future {
        let timeout_ms = call.timeout_ms.unwrap_or(self.default_timeout_ms);
        let fut = self.inner.call(call);
        Box::pin(async move {
            let duration = Duration::from_millis(timeout_ms);
            match tokio::time::timeout(duration, fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(RunnerError::Timeout { timeout_ms }),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tower::ServiceExt;
    use waymark_core::InvocationArgs;

    use super::*;

    /// Service that takes a configurable delay before responding.
    struct SlowService {
        delay_ms: u64,
    }

    impl Service<ServiceCall> for SlowService {
        type Response = RunnerStat;
        type Error = RunnerError;
        type Future = ServiceFuture;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, call: ServiceCall) -> Self::Future {
            let delay = self.delay_ms;
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(RunnerStat::new(call.args))
            })
        }
    }

    fn make_call(timeout_ms: Option<u64>) -> ServiceCall {
        let call = ServiceCall::new("slow", InvocationArgs::default());
        match timeout_ms {
            Some(ms) => call.with_timeout_ms(ms),
            None => call,
        }
    }

    #[tokio::test]
    async fn completes_within_timeout() {
        let svc = TimeoutLayer::new(1000).layer(SlowService { delay_ms: 10 });
        let stat = svc.oneshot(make_call(None)).await.unwrap();
        assert!(stat.allowed);
    }

    #[tokio::test]
    async fn exceeds_call_timeout_returns_error() {
        let svc = TimeoutLayer::new(10_000).layer(SlowService { delay_ms: 200 });
        let err = svc.oneshot(make_call(Some(50))).await.unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { timeout_ms: 50 }));
    }

    #[tokio::test]
    async fn falls_back_to_layer_default() {
        let svc = TimeoutLayer::new(20).layer(SlowService { delay_ms: 200 });
        let err = svc.oneshot(make_call(None)).await.unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { timeout_ms: 20 }));
    }
}
