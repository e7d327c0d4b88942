//! Metrics middleware for service calls.
//!
//! Records call duration and outcome on a `tracing` span and through the
//! `metrics` facade. No exporter is installed here; the embedding binary
//! decides where the counters go.

use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::{RunnerError, ServiceCall};
use crate::service::router::ServiceFuture;
use waymark_core::RunnerStat;

/// Counter of completed calls, labelled by `service` and `outcome`.
pub const CALLS_TOTAL: &str = "waymark_service_calls_total";
/// Histogram of call durations in milliseconds, labelled by `service`.
pub const CALL_DURATION_MS: &str = "waymark_service_call_duration_ms";

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments service calls with timing and counting.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records call duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

/// Outcome label for a finished call.
fn outcome(result: &Result<RunnerStat, RunnerError>) -> &'static str {
    match result {
        Ok(stat) => match stat.response_code.unwrap_or(200) {
            200..=399 => "ok",
            400..=499 => "rejected",
            _ => "failed",
        },
        Err(RunnerError::Timeout { .. }) => "timeout",
        Err(_) => "error",
    }
}

impl<S> Service<ServiceCall> for MetricsService<S>
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
        let service = call.name.clone();
        let call_id = call.call_id;

        let span = info_span!(
            "service_call",
            service = %service,
            module = %call.scope.module,
            call_id = %call_id,
            duration_ms = tracing::field::Empty,
            response_code = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(call);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = outcome(&result);
                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                let response_code = result
                    .as_ref()
                    .ok()
                    .and_then(|stat| stat.response_code)
                    .unwrap_or_default();

                let span = tracing::Span::current();
                span.record("duration_ms", duration_ms);
                span.record("response_code", response_code);
                span.record("outcome", outcome);

                ::metrics::counter!(CALLS_TOTAL, "service" => service.clone(), "outcome" => outcome)
                    .increment(1);
                ::metrics::histogram!(CALL_DURATION_MS, "service" => service.clone())
                    .record(elapsed.as_secs_f64() * 1000.0);

                tracing::info!(
                    service = %service,
                    call_id = %call_id,
                    duration_ms,
                    response_code,
                    outcome,
                    "service call complete"
                );

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
