//! HTTP layers wrapped around the mounted service routes.
//!
//! Per-call concerns (call timeout, metrics) live in the service pipeline;
//! this module only handles what belongs to the HTTP exchange itself.

use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

const REQUEST_ID: &str = "x-request-id";

/// Wraps every route of `router` in the binding's HTTP layers.
///
/// Each request is tagged with an `x-request-id` before it is traced, and the
/// same id is echoed on the response. A request running past
/// `config.request_timeout` answers 408.
pub fn with_http_layers<S>(router: Router<S>, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let request_id = HeaderName::from_static(REQUEST_ID);

    // Router::layer wraps what is already there, so the last layer added runs first.
    router
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// `"*"` anywhere in `origins` allows every origin; unparsable entries are ignored.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any)
}
